//! In-memory object store with scripted faults.

#![allow(dead_code)]

use async_trait::async_trait;
use blobsync::{ObjectSink, ObjectStore, RemoteObjectRef, RemotePath, SyncConfig, SyncError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// What to do instead of a normal fetch, for a number of fetches of one key.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Write nothing and report success, as a silently truncated write would.
    Truncate,
    /// Fail mid-copy with a connection reset.
    Reset,
    /// Never finish.
    Hang,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
    faults: Mutex<HashMap<String, (Fault, usize)>>,
    list_error: Option<String>,
    pub lists: AtomicUsize,
    pub fetches: AtomicUsize,
    per_key: Mutex<HashMap<String, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, key: &str, body: &[u8]) -> Self {
        self.objects.insert(key.to_string(), body.to_vec());
        self
    }

    /// Applies `fault` to the next `times` fetches of `key`.
    pub fn with_fault(self, key: &str, fault: Fault, times: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .insert(key.to_string(), (fault, times));
        self
    }

    pub fn with_list_error(mut self, msg: &str) -> Self {
        self.list_error = Some(msg.to_string());
        self
    }

    pub fn fetches_of(&self, key: &str) -> usize {
        self.per_key.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn take_fault(&self, key: &str) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        match faults.get_mut(key) {
            Some((fault, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Some(*fault)
            }
            _ => None,
        }
    }

    fn under<'a>(&'a self, remote: &RemotePath) -> impl Iterator<Item = &'a String> + 'a {
        let prefix = format!("{}/{}/", remote.bucket(), remote.prefix());
        self.objects.keys().filter(move |k| {
            k.strip_prefix(&prefix)
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, remote: &RemotePath) -> Result<bool, SyncError> {
        Ok(self.under(remote).next().is_some())
    }

    async fn list(&self, remote: &RemotePath) -> Result<Vec<RemoteObjectRef>, SyncError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.list_error {
            return Err(SyncError::Connection(msg.clone()));
        }
        let bucket_prefix = format!("{}/", remote.bucket());
        Ok(self
            .under(remote)
            .map(|k| RemoteObjectRef::new(&k[bucket_prefix.len()..]))
            .collect())
    }

    async fn fetch(
        &self,
        bucket: &str,
        object: &RemoteObjectRef,
        sink: &mut ObjectSink,
    ) -> Result<u64, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self
            .per_key
            .lock()
            .unwrap()
            .entry(object.key().to_string())
            .or_default() += 1;

        let full = format!("{}/{}", bucket, object.key());
        let body = self.objects.get(&full).cloned().ok_or_else(|| {
            SyncError::Transfer {
                key: object.key().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such key").into(),
            }
        })?;

        match self.take_fault(object.key()) {
            Some(Fault::Truncate) => return Ok(0),
            Some(Fault::Reset) => {
                sink.write_all(&body[..body.len() / 2]).await.ok();
                return Err(SyncError::Transfer {
                    key: object.key().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset by peer",
                    )
                    .into(),
                });
            }
            Some(Fault::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            None => {}
        }

        // Yield between chunks so workers interleave.
        for chunk in body.chunks(4) {
            sink.write_all(chunk).await.map_err(|e| SyncError::Transfer {
                key: object.key().to_string(),
                source: e.into(),
            })?;
            tokio::task::yield_now().await;
        }
        Ok(body.len() as u64)
    }
}

pub fn quiet_config(workers: usize) -> SyncConfig {
    SyncConfig {
        workers,
        retry_delay: Duration::ZERO,
        show_progress: false,
        ..SyncConfig::default()
    }
}

pub fn dir_listing(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
