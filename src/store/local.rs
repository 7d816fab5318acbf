//! Directory-backed object store.
//!
//! `root/<bucket>/<key>` maps one-to-one onto objects. Useful for mirrored
//! buckets and for exercising the pipeline without a network.

use super::{ObjectSink, ObjectStore};
use crate::error::SyncError;
use crate::types::{RemoteObjectRef, RemotePath};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn prefix_dir(&self, remote: &RemotePath) -> PathBuf {
        self.root.join(remote.bucket()).join(remote.prefix())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, remote: &RemotePath) -> Result<bool, SyncError> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(SyncError::Connection(format!(
                "store root {} is not reachable",
                self.root.display()
            )));
        }
        Ok(tokio::fs::metadata(self.prefix_dir(remote))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn list(&self, remote: &RemotePath) -> Result<Vec<RemoteObjectRef>, SyncError> {
        let dir = self.prefix_dir(remote);
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            SyncError::Connection(format!("unable to list {}: {}", remote.store_uri(), e))
        })?;

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            SyncError::Connection(format!("unable to list {}: {}", remote.store_uri(), e))
        })? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            objects.push(RemoteObjectRef::new(format!(
                "{}/{}",
                remote.prefix(),
                name.to_string_lossy()
            )));
        }
        Ok(objects)
    }

    async fn fetch(
        &self,
        bucket: &str,
        object: &RemoteObjectRef,
        sink: &mut ObjectSink,
    ) -> Result<u64, SyncError> {
        let path = self.root.join(bucket).join(object.key());
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| SyncError::transfer(object.key(), e))?;
        let copied = tokio::io::copy(&mut file, sink)
            .await
            .map_err(|e| SyncError::transfer(object.key(), e))?;
        sink.flush()
            .await
            .map_err(|e| SyncError::transfer(object.key(), e))?;
        Ok(copied)
    }
}
