//! Error types for batch download operations.

use crate::types::{RemotePath, ValidationResult};
use std::io;
use thiserror::Error;

/// Whether a failure can change outcome on another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying cannot help (bad config, unreachable prefix, local setup).
    Fatal,
    /// Consumes one attempt of the retry budget.
    Retryable,
}

/// Errors that can occur while syncing a remote prefix.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Required credentials, bucket or prefix are missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote prefix is unreachable or listing it failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A worker's read or write failed mid-copy for one object.
    #[error("transfer of {key} failed: {source}")]
    Transfer {
        key: String,
        #[source]
        source: TransferFault,
    },

    /// An expected file is missing or undersized after an attempt.
    #[error("validation failed: {0}")]
    Validation(ValidationResult),

    /// The retry budget was exhausted without a complete batch.
    #[error("unable to download {remote} after {attempts} attempt(s): {last}")]
    BatchDownload {
        remote: RemotePath,
        attempts: u32,
        #[source]
        last: Box<SyncError>,
    },

    /// The post-download conversion step failed.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// I/O error during local setup outside a transfer.
    #[error(transparent)]
    IoError(#[from] io::Error),
}

/// Underlying cause of a [`SyncError::Transfer`].
#[derive(Error, Debug)]
pub enum TransferFault {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("MD5 mismatch: expected {expected}, computed {computed}")]
    Checksum { expected: String, computed: String },

    #[error("no data within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    pub(crate) fn transfer(key: impl Into<String>, source: impl Into<TransferFault>) -> Self {
        SyncError::Transfer {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Classifies the error for the batch retry decision.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Transfer { .. } | SyncError::Validation(_) => FailureKind::Retryable,
            SyncError::Configuration(_)
            | SyncError::Connection(_)
            | SyncError::BatchDownload { .. }
            | SyncError::Conversion(_)
            | SyncError::IoError(_) => FailureKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }
}
