//! Object store seam.
//!
//! Everything the pipeline needs from a remote store goes through
//! [`ObjectStore`]: an existence probe, a flat listing of one prefix and a
//! streamed read of one object.

mod http;
mod local;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use crate::error::SyncError;
use crate::types::{RemoteObjectRef, RemotePath};
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Destination of a streamed object read.
pub type ObjectSink = dyn AsyncWrite + Send + Unpin;

/// Remote blob storage addressed by bucket and key.
///
/// Implementations must be safe to share between fetch workers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns whether anything lives under `remote`.
    ///
    /// `Err` means the store itself could not be reached.
    async fn exists(&self, remote: &RemotePath) -> Result<bool, SyncError>;

    /// Lists every object directly under `remote`, markers included.
    ///
    /// Nested "directories" are not descended into.
    async fn list(&self, remote: &RemotePath) -> Result<Vec<RemoteObjectRef>, SyncError>;

    /// Streams one object into `sink`, returning the number of bytes written.
    ///
    /// Every failure is reported as [`SyncError::Transfer`].
    async fn fetch(
        &self,
        bucket: &str,
        object: &RemoteObjectRef,
        sink: &mut ObjectSink,
    ) -> Result<u64, SyncError>;
}
