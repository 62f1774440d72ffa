//! Bounded-concurrency upload worker pool.
//!
//! A fixed number of tokio tasks consume one shared FIFO queue. Retries are
//! re-queued after their backoff delay from a detached timer task, so a
//! waiting job never occupies a worker slot.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::client::ApiClient;
use super::post::PostProcess;
use super::retry::{RetryDecision, RetryPolicy};
use crate::error::UploadError;
use crate::observability::spans;
use crate::watcher::{JobLedger, JobState, PipelineStats};

/// A file admitted for upload.
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Absolute source path.
    pub path: PathBuf,
    /// Size observed when the file stabilized.
    pub size: u64,
    /// When the file was first detected.
    pub first_seen: Instant,
    /// Attempts made so far.
    pub attempt: u32,
}

impl UploadJob {
    /// Create a fresh job with no attempts made.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, first_seen: Instant) -> Self {
        Self {
            path,
            size,
            first_seen,
            attempt: 0,
        }
    }
}

/// Shared state for all workers in a pool.
struct WorkerContext {
    client: ApiClient,
    policy: RetryPolicy,
    post: PostProcess,
    ledger: Arc<JobLedger>,
    stats: Arc<PipelineStats>,
    job_tx: mpsc::UnboundedSender<UploadJob>,
    cancel: CancellationToken,
}

/// Fixed-size pool of upload workers sharing one FIFO queue.
pub struct UploadWorkerPool {
    job_tx: mpsc::UnboundedSender<UploadJob>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl UploadWorkerPool {
    /// Spawn `size` workers.
    #[must_use]
    pub fn new(
        size: usize,
        client: ApiClient,
        policy: RetryPolicy,
        post: PostProcess,
        ledger: Arc<JobLedger>,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let ctx = Arc::new(WorkerContext {
            client,
            policy,
            post,
            ledger,
            stats,
            job_tx: job_tx.clone(),
            cancel,
        });

        let handles = (0..size)
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                let rx = Arc::clone(&job_rx);
                tokio::spawn(worker_loop(id, ctx, rx))
            })
            .collect();

        tracing::info!(size, "Upload worker pool started");

        Self { job_tx, handles }
    }

    /// Handle for queueing jobs into the pool.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<UploadJob> {
        self.job_tx.clone()
    }

    /// Queue a job. Returns false if the pool has shut down.
    pub fn submit(&self, job: UploadJob) -> bool {
        self.job_tx.send(job).is_ok()
    }

    /// Wait for all workers to finish, aborting any still running at the
    /// deadline.
    pub async fn join(mut self, deadline: Duration) {
        drop(self.job_tx);

        let all = futures::future::join_all(self.handles.iter_mut());
        if tokio::time::timeout(deadline, all).await.is_err() {
            tracing::warn!("Shutdown deadline reached, aborting in-flight uploads");
            for handle in &self.handles {
                handle.abort();
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    ctx: Arc<WorkerContext>,
    job_rx: Arc<Mutex<mpsc::UnboundedReceiver<UploadJob>>>,
) {
    loop {
        // Cancellation is only observed between jobs, so an in-flight
        // attempt always runs to completion.
        let job = {
            let mut rx = job_rx.lock().await;
            tokio::select! {
                () = ctx.cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(mut job) = job else {
            tracing::debug!(worker = id, "Upload worker shutting down");
            return;
        };

        process_job(&ctx, &mut job).await;
    }
}

async fn process_job(ctx: &WorkerContext, job: &mut UploadJob) {
    ctx.ledger.mark_in_flight(&job.path);
    job.attempt += 1;

    let span = spans::upload_span(&job.path, job.attempt);
    let result = ctx.client.upload(&job.path).instrument(span).await;

    match result {
        Ok(response) => {
            tracing::info!(
                path = %job.path.display(),
                attempt = job.attempt,
                status = response.status,
                elapsed = ?job.first_seen.elapsed(),
                "Upload succeeded"
            );
            tracing::debug!(body = %response.body, "Upload response");

            let post_span = spans::post_process_span(&job.path);
            if let Err(e) = ctx.post.apply(&job.path).instrument(post_span).await {
                tracing::warn!(
                    path = %job.path.display(),
                    error = %e,
                    "Post-processing failed after successful upload"
                );
            }

            ctx.ledger.mark_result(&job.path, JobState::Completed);
            ctx.stats.uploaded.fetch_add(1, Ordering::Relaxed);
        }
        Err(error) => handle_failure(ctx, job, &error),
    }
}

fn handle_failure(ctx: &WorkerContext, job: &UploadJob, error: &UploadError) {
    match ctx.policy.decide(job.attempt, error) {
        RetryDecision::Retry(delay) => {
            tracing::warn!(
                path = %job.path.display(),
                attempt = job.attempt,
                error = %error,
                delay = ?delay,
                "Upload attempt failed, retry scheduled"
            );
            let tx = ctx.job_tx.clone();
            let requeued = job.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Pool may be gone after shutdown; the job is abandoned.
                let _ = tx.send(requeued);
            });
        }
        RetryDecision::Stop => {
            log_terminal_failure(job, error, ctx.client.endpoint());
            ctx.ledger.mark_result(&job.path, JobState::Failed);
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn log_terminal_failure(job: &UploadJob, error: &UploadError, endpoint: &str) {
    match error {
        UploadError::Vanished { .. } => {
            // Expected when monitoring a live directory.
            tracing::warn!(
                path = %job.path.display(),
                attempt = job.attempt,
                "Source file vanished before upload"
            );
        }
        UploadError::Rejected { status, .. } => {
            tracing::error!(
                path = %job.path.display(),
                attempt = job.attempt,
                status,
                endpoint,
                elapsed = ?job.first_seen.elapsed(),
                error = %error,
                "Upload rejected, not retrying"
            );
        }
        UploadError::Transient { .. } => {
            tracing::error!(
                path = %job.path.display(),
                attempt = job.attempt,
                endpoint,
                elapsed = ?job.first_seen.elapsed(),
                error = %error,
                "Upload failed after exhausting retries"
            );
        }
    }
}
