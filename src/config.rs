//! Session configuration and its environment adapter.
//!
//! This is the only module that reads the process environment. Everything
//! below [`SessionConfig`] receives explicit values.

use crate::error::SyncError;
use crate::types::{RemotePath, SyncConfig};
use std::fmt;
use std::path::PathBuf;

pub const ENV_ACCESS_KEY: &str = "S3_ACCESS";
pub const ENV_SECRET_KEY: &str = "S3_SECRET";
pub const ENV_BUCKET: &str = "S3_BUCKET";
pub const ENV_ENDPOINT: &str = "S3_ENDPOINT";
pub const ENV_RUNTIME_HOME: &str = "JAVA_HOME";

pub const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

/// Access credential pair for the object store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, SyncError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        if access_key.trim().is_empty() {
            return Err(SyncError::Configuration(format!("{} is empty", ENV_ACCESS_KEY)));
        }
        if secret_key.trim().is_empty() {
            return Err(SyncError::Configuration(format!("{} is empty", ENV_SECRET_KEY)));
        }
        Ok(Self {
            access_key,
            secret_key,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// S3-compatible HTTP endpoint, path-style addressing.
    Http { endpoint: String },
    /// Directory whose subdirectories are buckets.
    Local { root: PathBuf },
}

/// Everything a [`Session`](crate::Session) needs. Immutable once built.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub remote: RemotePath,
    pub credentials: Credentials,
    pub store: StoreLocation,
    /// Parent of the batch directory. `None` generates a timestamped temp dir.
    pub destination_root: Option<PathBuf>,
    /// Runtime location handed to the conversion collaborator.
    pub runtime_home: Option<PathBuf>,
    pub sync: SyncConfig,
}

/// Values resolved from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub runtime_home: Option<PathBuf>,
}

impl EnvSettings {
    /// Reads the process environment. Empty values count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            access_key: get(ENV_ACCESS_KEY),
            secret_key: get(ENV_SECRET_KEY),
            bucket: get(ENV_BUCKET),
            endpoint: get(ENV_ENDPOINT),
            runtime_home: get(ENV_RUNTIME_HOME).map(PathBuf::from),
        }
    }
}

/// Caller-supplied overrides; each one wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub local_root: Option<PathBuf>,
    pub destination_root: Option<PathBuf>,
}

impl SessionConfig {
    /// Resolves a session for `prefix` from the process environment.
    pub fn from_env(
        prefix: &str,
        overrides: SessionOverrides,
        sync: SyncConfig,
    ) -> Result<Self, SyncError> {
        Self::resolve(prefix, overrides, EnvSettings::from_env(), sync)
    }

    /// Resolves a session from already-read environment values.
    ///
    /// Missing credentials or bucket fail here, never at fetch time.
    pub fn resolve(
        prefix: &str,
        overrides: SessionOverrides,
        env: EnvSettings,
        sync: SyncConfig,
    ) -> Result<Self, SyncError> {
        let bucket = overrides.bucket.or(env.bucket).ok_or_else(|| {
            SyncError::Configuration(format!(
                "no bucket given and {} is not set",
                ENV_BUCKET
            ))
        })?;
        let access_key = overrides.access_key.or(env.access_key).ok_or_else(|| {
            SyncError::Configuration(format!("{} is not set", ENV_ACCESS_KEY))
        })?;
        let secret_key = overrides.secret_key.or(env.secret_key).ok_or_else(|| {
            SyncError::Configuration(format!("{} is not set", ENV_SECRET_KEY))
        })?;

        let store = match overrides.local_root {
            Some(root) => StoreLocation::Local { root },
            None => StoreLocation::Http {
                endpoint: overrides
                    .endpoint
                    .or(env.endpoint)
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            },
        };

        if sync.workers == 0 {
            return Err(SyncError::Configuration("worker count must be at least 1".to_string()));
        }
        if sync.max_attempts == 0 {
            return Err(SyncError::Configuration("retry budget must be at least 1".to_string()));
        }

        Ok(Self {
            remote: RemotePath::new(bucket, prefix)?,
            credentials: Credentials::new(access_key, secret_key)?,
            store,
            destination_root: overrides.destination_root,
            runtime_home: env.runtime_home,
            sync,
        })
    }
}
