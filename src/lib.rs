//! blobsync - parallel fetch-and-validate of object-store prefixes
//!
//! This library downloads every object under a remote prefix into a local
//! directory as one all-or-nothing batch, with bounded whole-batch retry.
//!
//! # Features
//!
//! - **Parallel Fetch**: a pool of workers drains a shared queue of objects
//! - **Marker Filtering**: store bookkeeping objects (`_SUCCESS`, ...) are skipped
//! - **Completeness Check**: every expected file must exist and exceed a size threshold
//! - **Batch Retry**: a failed attempt is re-run from a fresh listing, up to a budget
//! - **Conversion Hook**: validated batches can be handed to an external converter
//!
//! # Example
//!
//! ```no_run
//! use blobsync::{Session, SessionConfig, SessionOverrides, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::from_env(
//!     "agg_files/historical/DocObject7.parquet",
//!     SessionOverrides::default(),
//!     SyncConfig::default(),
//! )?;
//! let session = Session::new(config)?;
//! let report = session.download().await?;
//! println!("{} files in {}", report.files, report.destination.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod lister;
pub mod orchestrator;
pub mod queue;
pub mod session;
pub mod store;
pub mod types;
pub mod verify;
pub mod worker;

pub use config::{Credentials, EnvSettings, SessionConfig, SessionOverrides, StoreLocation};
pub use convert::{CommandConverter, Converter, NoopConverter};
pub use error::{FailureKind, SyncError, TransferFault};
pub use orchestrator::BatchDownloader;
pub use queue::WorkQueue;
pub use session::Session;
pub use store::{HttpObjectStore, LocalObjectStore, ObjectSink, ObjectStore};
pub use types::{
    BatchAttempt, BatchReport, BatchState, DownloadBatch, ExpectedFile, InvalidReason,
    RemoteObjectRef, RemotePath, SyncConfig, ValidationResult,
};
pub use worker::{FetchSummary, WorkerPool};
