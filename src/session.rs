//! A configured connection to one remote prefix.

use crate::config::{SessionConfig, StoreLocation};
use crate::convert::{Converter, NoopConverter};
use crate::error::SyncError;
use crate::orchestrator::BatchDownloader;
use crate::store::{HttpObjectStore, LocalObjectStore, ObjectStore};
use crate::types::{BatchReport, RemotePath};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Format of generated destination directory names.
const TIMESTAMP_FORMAT: &str = "%m-%d-%Y_%H-%M-%S";

/// Owns the store, the destination and the downloader for one remote prefix.
///
/// Everything is resolved in [`Session::new`]; nothing is read from the
/// environment afterwards.
pub struct Session {
    config: SessionConfig,
    store: Arc<dyn ObjectStore>,
    destination_root: PathBuf,
    downloader: BatchDownloader,
}

impl Session {
    /// Builds the store described by `config` and prepares the destination root.
    pub fn new(config: SessionConfig) -> Result<Self, SyncError> {
        let store: Arc<dyn ObjectStore> = match &config.store {
            StoreLocation::Http { endpoint } => Arc::new(HttpObjectStore::new(
                endpoint,
                Some(config.credentials.clone()),
            )?),
            StoreLocation::Local { root } => Arc::new(LocalObjectStore::new(root)),
        };
        Self::with_store(config, store)
    }

    /// Like [`Session::new`] but with a caller-provided store.
    pub fn with_store(config: SessionConfig, store: Arc<dyn ObjectStore>) -> Result<Self, SyncError> {
        let destination_root = match &config.destination_root {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => {
                let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
                // Kept on disk: the batch outlives the session.
                tempfile::Builder::new()
                    .prefix("blobsync_")
                    .suffix(&stamp)
                    .tempdir()?
                    .keep()
            }
        };
        info!("Destination root: {}", destination_root.display());

        let downloader = BatchDownloader::new(Arc::clone(&store), config.sync.clone());
        Ok(Self {
            config,
            store,
            destination_root,
            downloader,
        })
    }

    pub fn remote(&self) -> &RemotePath {
        &self.config.remote
    }

    /// Directory holding the batch directory and any converted output.
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// `<destination root>/<last segment of the prefix>`.
    pub fn batch_destination(&self) -> PathBuf {
        self.destination_root.join(self.config.remote.leaf())
    }

    /// Probes whether the remote prefix is reachable without downloading.
    pub async fn test_connection(&self) -> Result<bool, SyncError> {
        self.store.exists(&self.config.remote).await
    }

    /// Downloads the prefix as one all-or-nothing batch.
    pub async fn download(&self) -> Result<BatchReport, SyncError> {
        self.download_and_convert(&NoopConverter).await
    }

    /// Downloads the prefix, then runs `converter` over the validated batch.
    pub async fn download_and_convert(
        &self,
        converter: &dyn Converter,
    ) -> Result<BatchReport, SyncError> {
        self.downloader
            .run(
                &self.config.remote,
                &self.batch_destination(),
                converter,
                &self.destination_root,
            )
            .await
    }
}
