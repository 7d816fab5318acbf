//! Data structures for batch download operations.

use crate::error::SyncError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base names starting with this character are store-internal markers
/// (`_SUCCESS`, `_spark_metadata`, ...) and are never fetched.
pub const MARKER_PREFIX: char = '_';

/// Default number of attempts per batch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default minimum-viability threshold: files must be strictly larger.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 1;

/// Returns true if `base_name` names a marker object.
pub fn is_marker(base_name: &str) -> bool {
    base_name.starts_with(MARKER_PREFIX)
}

/// Remote location of a batch: a bucket plus an object prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    bucket: String,
    prefix: String,
}

impl RemotePath {
    /// Builds a remote path, trimming surrounding slashes.
    ///
    /// Fails with [`SyncError::Configuration`] if either part is empty.
    pub fn new(bucket: impl AsRef<str>, prefix: impl AsRef<str>) -> Result<Self, SyncError> {
        let bucket = bucket.as_ref().trim_matches('/');
        let prefix = prefix.as_ref().trim_matches('/');
        if bucket.is_empty() {
            return Err(SyncError::Configuration("bucket name is empty".to_string()));
        }
        if prefix.is_empty() {
            return Err(SyncError::Configuration("object prefix is empty".to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Last path segment of the prefix; names the local batch directory.
    pub fn leaf(&self) -> &str {
        self.prefix.rsplit('/').next().unwrap_or(&self.prefix)
    }

    /// `store://bucket/prefix`, the scope every listing runs in.
    pub fn store_uri(&self) -> String {
        format!("store://{}", self)
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.prefix)
    }
}

/// An object listed under a [`RemotePath`]. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectRef {
    key: String,
}

impl RemoteObjectRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Full object key inside the bucket.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Final segment of the key.
    pub fn base_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    pub fn is_marker(&self) -> bool {
        is_marker(self.base_name())
    }
}

/// A local file an attempt must materialize, named after the object's base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpectedFile {
    name: String,
}

impl ExpectedFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_path(&self, destination: &Path) -> PathBuf {
        destination.join(&self.name)
    }
}

impl From<&RemoteObjectRef> for ExpectedFile {
    fn from(object: &RemoteObjectRef) -> Self {
        ExpectedFile::new(object.base_name())
    }
}

/// Everything one attempt fetches. Owned by that attempt only.
#[derive(Debug, Clone)]
pub struct DownloadBatch {
    pub remote: RemotePath,
    pub destination: PathBuf,
    pub objects: Vec<RemoteObjectRef>,
}

impl DownloadBatch {
    pub fn expected_files(&self) -> Vec<ExpectedFile> {
        self.objects.iter().map(ExpectedFile::from).collect()
    }
}

/// Why an expected file did not count as materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Missing,
    Undersized { size: u64, threshold: u64 },
}

/// Outcome of the completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Complete,
    /// The first offending file.
    Incomplete {
        file: ExpectedFile,
        reason: InvalidReason,
    },
}

impl ValidationResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, ValidationResult::Complete)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResult::Complete => write!(f, "all files present"),
            ValidationResult::Incomplete {
                file,
                reason: InvalidReason::Missing,
            } => write!(f, "{} is missing", file.name()),
            ValidationResult::Incomplete {
                file,
                reason: InvalidReason::Undersized { size, threshold },
            } => write!(
                f,
                "{} is {} bytes, must exceed {} bytes",
                file.name(),
                size,
                threshold
            ),
        }
    }
}

/// Lifecycle of a batch inside the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Attempting(u32),
    Succeeded,
    Exhausted,
}

/// One list/queue/fetch/validate pass and what it produced.
#[derive(Debug)]
pub struct BatchAttempt {
    pub number: u32,
    pub batch: DownloadBatch,
    pub outcome: ValidationResult,
}

/// Tuning for the fetch-and-validate pipeline.
///
/// # Example
///
/// ```
/// use blobsync::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig {
///     workers: 8,
///     retry_delay: Duration::ZERO,
///     ..SyncConfig::default()
/// };
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of fetch workers per attempt (default: host parallelism).
    pub workers: usize,
    /// Attempts per batch, including the first (default: 3).
    pub max_attempts: u32,
    /// Pause between attempts (default: 1s).
    pub retry_delay: Duration,
    /// Local files must be strictly larger than this many bytes (default: 1).
    pub min_file_size: u64,
    /// Per-object deadline. `None` lets a hung read stall the attempt.
    pub object_timeout: Option<Duration>,
    /// Draw a progress bar on stderr when it is a terminal.
    pub show_progress: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            object_timeout: None,
            show_progress: true,
        }
    }
}

/// Summary of a successful batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub remote: String,
    pub destination: PathBuf,
    pub attempts: u32,
    pub files: usize,
    pub bytes: u64,
    pub elapsed_ms: u64,
    /// Output of the conversion step, if it produced one.
    pub converted: Option<PathBuf>,
}
