//! Batch retry orchestration: list, queue, fetch and validate as one attempt,
//! repeated until the batch is complete or the retry budget runs out.

use crate::convert::{Converter, NoopConverter};
use crate::error::SyncError;
use crate::lister::list_objects;
use crate::queue::WorkQueue;
use crate::store::ObjectStore;
use crate::types::{BatchAttempt, BatchReport, BatchState, DownloadBatch, RemotePath, SyncConfig};
use crate::verify::validate;
use crate::worker::{progress_bar, FetchSummary, WorkerPool};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, info, warn};

/// Fetches whole prefixes as all-or-nothing batches.
///
/// # Example
///
/// ```no_run
/// use blobsync::{BatchDownloader, LocalObjectStore, RemotePath, SyncConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(LocalObjectStore::new("/mnt/mirror"));
/// let downloader = BatchDownloader::new(store, SyncConfig::default());
/// let remote = RemotePath::new("analytics", "agg/doc.parquet")?;
/// let report = downloader.download(&remote, "/tmp/out/doc.parquet".as_ref()).await?;
/// println!("{} files in {} attempt(s)", report.files, report.attempts);
/// # Ok(())
/// # }
/// ```
pub struct BatchDownloader {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
    pool: WorkerPool,
}

/// A finished attempt and what its fetch phase moved.
struct AttemptOutput {
    attempt: BatchAttempt,
    summary: FetchSummary,
}

impl BatchDownloader {
    pub fn new(store: Arc<dyn ObjectStore>, config: SyncConfig) -> Self {
        let pool = WorkerPool::new(config.workers, config.object_timeout);
        Self {
            store,
            config,
            pool,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Downloads `remote` into `destination` without a conversion step.
    pub async fn download(
        &self,
        remote: &RemotePath,
        destination: &Path,
    ) -> Result<BatchReport, SyncError> {
        self.run(remote, destination, &NoopConverter, destination)
            .await
    }

    /// Downloads `remote` into `destination`, then hands it to `converter`.
    ///
    /// The remote prefix is probed first; an unreachable prefix fails with
    /// [`SyncError::Connection`] before any attempt is made. Each attempt
    /// starts from an emptied `destination` and a fresh listing. Transfer and
    /// validation failures are retried up to `max_attempts` in total, then
    /// reported as [`SyncError::BatchDownload`].
    pub async fn run(
        &self,
        remote: &RemotePath,
        destination: &Path,
        converter: &dyn Converter,
        output_root: &Path,
    ) -> Result<BatchReport, SyncError> {
        let started = Instant::now();
        let mut state = BatchState::Pending;
        debug!("Batch {} is {:?}", remote, state);

        if !self.store.exists(remote).await? {
            return Err(SyncError::Connection(format!(
                "{} does not exist or is not reachable",
                remote.store_uri()
            )));
        }

        let budget = self.config.max_attempts.max(1);
        let delay_ms = u64::try_from(self.config.retry_delay.as_millis()).unwrap_or(u64::MAX);
        let strategy = FixedInterval::from_millis(delay_ms).take((budget - 1) as usize);
        let attempts = AtomicU32::new(0);

        let result = Retry::spawn(strategy, || {
            let number = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match self.attempt(number, remote, destination).await {
                    Ok(output) => Ok(output),
                    Err(e) if e.is_retryable() => {
                        warn!("Attempt {}/{} for {} failed: {}", number, budget, remote, e);
                        RetryError::to_transient(e)
                    }
                    Err(e) => {
                        error!("Attempt {}/{} for {} failed fatally: {}", number, budget, remote, e);
                        RetryError::to_permanent(e)
                    }
                }
            }
        })
        .await;

        let used = attempts.load(Ordering::SeqCst);
        let output = match result {
            Ok(output) => output,
            Err(e) if e.is_retryable() => {
                state = BatchState::Exhausted;
                debug!("Batch {} is {:?}", remote, state);
                error!("❌ Giving up on {} after {} attempt(s)", remote, used);
                return Err(SyncError::BatchDownload {
                    remote: remote.clone(),
                    attempts: used,
                    last: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        };

        state = BatchState::Succeeded;
        debug!("Batch {} is {:?}: {}", remote, state, output.attempt.outcome);

        let converted = converter.convert(destination, output_root).await?;
        let elapsed = started.elapsed();
        info!(
            "✅ {} complete: {} file(s), {} bytes, {} attempt(s), {}",
            remote,
            output.summary.files,
            output.summary.bytes,
            output.attempt.number,
            humantime::format_duration(std::time::Duration::from_millis(
                elapsed.as_millis() as u64
            ))
        );

        Ok(BatchReport {
            remote: remote.to_string(),
            destination: output.attempt.batch.destination,
            attempts: output.attempt.number,
            files: output.summary.files,
            bytes: output.summary.bytes,
            elapsed_ms: elapsed.as_millis() as u64,
            converted,
        })
    }

    /// One full pass: reset, list, queue, fetch, validate.
    async fn attempt(
        &self,
        number: u32,
        remote: &RemotePath,
        destination: &Path,
    ) -> Result<AttemptOutput, SyncError> {
        debug!("Batch {} is {:?}", remote, BatchState::Attempting(number));
        info!(
            "📦 Attempt {}/{} for {}",
            number, self.config.max_attempts, remote
        );

        reset_destination(destination).await?;

        let batch = DownloadBatch {
            remote: remote.clone(),
            destination: destination.to_path_buf(),
            objects: list_objects(self.store.as_ref(), remote).await?,
        };
        let queue = Arc::new(WorkQueue::load(batch.objects.iter().cloned()));

        let pb = progress_bar(queue.capacity(), self.config.show_progress);
        pb.set_message(format!(
            "📦 Downloading {} object(s) with {} worker(s)",
            queue.capacity(),
            self.pool.workers()
        ));

        let summary = match self
            .pool
            .run(
                Arc::clone(&self.store),
                remote.bucket(),
                queue,
                destination,
                &pb,
            )
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                pb.abandon_with_message("❌ Download failed!");
                return Err(e);
            }
        };
        pb.finish_with_message(format!("✅ Downloaded {} object(s)", summary.files));

        let outcome = validate(
            destination,
            &batch.expected_files(),
            self.config.min_file_size,
        );
        if !outcome.is_complete() {
            return Err(SyncError::Validation(outcome));
        }

        Ok(AttemptOutput {
            attempt: BatchAttempt {
                number,
                batch,
                outcome,
            },
            summary,
        })
    }
}

/// Empties `destination` (creating it if needed) so no stale file survives
/// into the next attempt.
async fn reset_destination(destination: &Path) -> Result<(), SyncError> {
    if tokio::fs::try_exists(destination).await? {
        tokio::fs::remove_dir_all(destination).await?;
    }
    tokio::fs::create_dir_all(destination).await?;
    Ok(())
}
