//! Post-download conversion step.
//!
//! The fetch pipeline treats conversion as a black box that runs only after a
//! batch validated. [`CommandConverter`] hands the directory to an external
//! program (typically a Spark job writing JSON).

use crate::config::ENV_RUNTIME_HOME;
use crate::error::SyncError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the directory conversions write into, under the destination root.
pub const CONVERTED_DIR: &str = "JSON_DATA";

/// Engine bookkeeping directory removed from the input before conversion.
pub const ENGINE_METADATA_DIR: &str = "_spark_metadata";

/// Consumes a validated batch directory.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Converts `input`, writing under `output_root`. Returns the output
    /// directory if one was produced.
    async fn convert(&self, input: &Path, output_root: &Path) -> Result<Option<PathBuf>, SyncError>;
}

/// Leaves the downloaded files as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConverter;

#[async_trait]
impl Converter for NoopConverter {
    async fn convert(&self, _input: &Path, _output_root: &Path) -> Result<Option<PathBuf>, SyncError> {
        Ok(None)
    }
}

/// Runs `program [args..] <input> <output_root>/JSON_DATA`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
    runtime_home: PathBuf,
}

impl CommandConverter {
    /// Fails with [`SyncError::Configuration`] when no runtime location is known.
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<String>,
        runtime_home: Option<PathBuf>,
    ) -> Result<Self, SyncError> {
        let runtime_home = runtime_home.ok_or_else(|| {
            SyncError::Configuration(format!(
                "{} is not set; the conversion step cannot run",
                ENV_RUNTIME_HOME
            ))
        })?;
        Ok(Self {
            program: program.into(),
            args,
            runtime_home,
        })
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, input: &Path, output_root: &Path) -> Result<Option<PathBuf>, SyncError> {
        let output = output_root.join(CONVERTED_DIR);
        if tokio::fs::try_exists(&output).await? {
            tokio::fs::remove_dir_all(&output).await?;
        }
        let engine_metadata = input.join(ENGINE_METADATA_DIR);
        if tokio::fs::try_exists(&engine_metadata).await? {
            tokio::fs::remove_dir_all(&engine_metadata).await?;
        }

        info!(
            "🔄 Converting {} with {}",
            input.display(),
            self.program.display()
        );
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(&output)
            .env(ENV_RUNTIME_HOME, &self.runtime_home)
            .status()
            .await
            .map_err(|e| {
                SyncError::Conversion(format!("unable to start {}: {}", self.program.display(), e))
            })?;

        if !status.success() {
            return Err(SyncError::Conversion(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }
        info!("✅ Converted output in {}", output.display());
        Ok(Some(output))
    }
}
