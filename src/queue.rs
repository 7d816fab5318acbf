//! Shared work queue drained by the fetch workers.

use crate::types::RemoteObjectRef;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Fixed-capacity multi-consumer queue of objects to fetch.
///
/// Loaded once per attempt and never refilled. [`claim`](Self::claim) never
/// blocks: an empty queue is seen by every worker as `None`.
#[derive(Debug)]
pub struct WorkQueue {
    items: Mutex<VecDeque<RemoteObjectRef>>,
    capacity: usize,
}

impl WorkQueue {
    /// Loads every object exactly once.
    pub fn load<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = RemoteObjectRef>,
    {
        let items: VecDeque<RemoteObjectRef> = objects.into_iter().collect();
        let capacity = items.len();
        Self {
            items: Mutex::new(items),
            capacity,
        }
    }

    /// Atomically takes one item, or `None` once drained.
    pub fn claim(&self) -> Option<RemoteObjectRef> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Number of items still waiting to be claimed.
    pub fn remaining(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of items the queue was loaded with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
