//! Fetch worker pool: parallel read-then-write of every queued object.

use crate::error::{SyncError, TransferFault};
use crate::queue::WorkQueue;
use crate::store::ObjectStore;
use crate::types::RemoteObjectRef;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, warn};

/// What one fetch phase transferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub files: usize,
    pub bytes: u64,
}

impl FetchSummary {
    fn absorb(&mut self, other: FetchSummary) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Fixed-size pool of independently scheduled fetch tasks.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    object_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(workers: usize, object_timeout: Option<Duration>) -> Self {
        Self {
            workers: workers.max(1),
            object_timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Drains `queue` into `destination` with every worker, then waits for all
    /// of them to stop.
    ///
    /// A failing worker aborts without draining further, and the others stop
    /// claiming once they see the failure.
    ///
    /// # Arguments
    ///
    /// * `store` - Store every worker fetches from
    /// * `bucket` - Bucket the queued keys live in
    /// * `queue` - Objects of this attempt, claimed exactly once each
    /// * `destination` - Directory receiving one file per object
    /// * `pb` - Progress bar advanced per finished object
    ///
    /// # Returns
    ///
    /// Files and bytes moved, or the first [`SyncError::Transfer`] if any
    /// worker failed.
    pub async fn run(
        &self,
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        queue: Arc<WorkQueue>,
        destination: &Path,
        pb: &ProgressBar,
    ) -> Result<FetchSummary, SyncError> {
        let aborted = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::with_capacity(self.workers);

        for worker_id in 0..self.workers {
            let ctx = WorkerContext {
                worker_id,
                store: Arc::clone(&store),
                bucket: bucket.to_string(),
                queue: Arc::clone(&queue),
                destination: destination.to_path_buf(),
                object_timeout: self.object_timeout,
                aborted: Arc::clone(&aborted),
                pb: pb.clone(),
            };
            tasks.push(tokio::spawn(drain(ctx)));
        }

        // Wait for every worker before reporting; validation must not race writes.
        let mut summary = FetchSummary::default();
        let mut first_error: Option<SyncError> = None;
        for task in tasks {
            match task.await {
                Ok(Ok(done)) => summary.absorb(done),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!("Worker task join error: {}", e);
                    first_error.get_or_insert(SyncError::transfer(
                        "<worker>",
                        TransferFault::Other(format!("worker task failed: {}", e)),
                    ));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Everything one worker task owns.
struct WorkerContext {
    worker_id: usize,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    queue: Arc<WorkQueue>,
    destination: PathBuf,
    object_timeout: Option<Duration>,
    aborted: Arc<AtomicBool>,
    pb: ProgressBar,
}

async fn drain(ctx: WorkerContext) -> Result<FetchSummary, SyncError> {
    let mut summary = FetchSummary::default();

    while !ctx.aborted.load(Ordering::Acquire) {
        let Some(object) = ctx.queue.claim() else {
            break;
        };

        ctx.pb
            .set_message(format!("| ⬇️  Downloading: {}", object.base_name()));

        match fetch_object(
            ctx.store.as_ref(),
            &ctx.bucket,
            &object,
            &ctx.destination,
            ctx.object_timeout,
        )
        .await
        {
            Ok(bytes) => {
                debug!(
                    "Worker {} fetched {} ({} bytes)",
                    ctx.worker_id,
                    object.key(),
                    bytes
                );
                summary.files += 1;
                summary.bytes += bytes;
                ctx.pb.inc(1);
            }
            Err(e) => {
                warn!("Worker {} aborting: {}", ctx.worker_id, e);
                ctx.aborted.store(true, Ordering::Release);
                return Err(e);
            }
        }
    }

    Ok(summary)
}

/// Copies one object in full to `destination/<base name>`.
pub async fn fetch_object(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &RemoteObjectRef,
    destination: &Path,
    deadline: Option<Duration>,
) -> Result<u64, SyncError> {
    let target = destination.join(object.base_name());
    let file = tokio::fs::File::create(&target)
        .await
        .map_err(|e| SyncError::transfer(object.key(), e))?;
    let mut file = BufWriter::new(file);

    let copy = store.fetch(bucket, object, &mut file);
    let bytes = match deadline {
        Some(limit) => tokio::time::timeout(limit, copy)
            .await
            .map_err(|_| SyncError::transfer(object.key(), TransferFault::TimedOut(limit)))??,
        None => copy.await?,
    };

    file.flush()
        .await
        .map_err(|e| SyncError::transfer(object.key(), e))?;
    Ok(bytes)
}

/// Progress bar for one fetch phase; hidden unless wanted and stderr is a terminal.
pub fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible || !atty::is(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}
