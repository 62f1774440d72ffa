//! The end-to-end delivery pipeline.
//!
//! Event source -> stability gate -> ledger admission -> worker pool ->
//! post-processing. All handoffs are channels; the job ledger is the only
//! shared-mutable structure.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::WatcherError;
use crate::upload::{ApiClient, PostProcess, RetryPolicy, UploadJob, UploadWorkerPool};
use crate::watcher::{
    scan_existing_async, wait_for_stable, FileEventSource, FileMatcher, JobLedger, PipelineStats,
    SourceMessage, Stability, WatchEvent,
};
use crate::Result;

/// Grace period for in-flight uploads during shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Handle to the delivery pipeline.
///
/// Construct once, then `run` until cancelled or the watch root is lost. No
/// job state survives a restart; `process_existing` is the only recovery
/// path for files that were queued but never attempted.
pub struct Pipeline {
    config: Arc<Config>,
    client: ApiClient,
    ledger: Arc<JobLedger>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ApiClient::from_config(&config)?;
        let ledger = Arc::new(JobLedger::new(config.ledger_retention()));

        Ok(Self {
            config: Arc::new(config),
            client,
            ledger,
            stats: PipelineStats::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Shared pipeline counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Token that stops the pipeline when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline until cancellation or loss of the watch root.
    ///
    /// In-flight uploads are allowed to finish during shutdown (up to a hard
    /// deadline); queued jobs are abandoned without being marked failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot start, or if the watch root is
    /// lost while monitoring.
    pub async fn run(&self) -> Result<()> {
        let matcher = FileMatcher::new(&self.config.processing.patterns)?;
        let mut source = FileEventSource::new(
            &self.config.watch_folder,
            self.config.service.recursive,
            matcher.clone(),
        )?;

        if self.client.test_connection().await {
            tracing::info!(endpoint = %self.config.api.endpoint, "API connection successful");
        } else {
            tracing::warn!(
                endpoint = %self.config.api.endpoint,
                "API connection test failed, uploads will be retried individually"
            );
        }

        let pool = UploadWorkerPool::new(
            self.config.service.max_concurrent_uploads,
            self.client.clone(),
            RetryPolicy::new(
                self.config.api.retry_attempts,
                self.config.retry_base_delay(),
            ),
            PostProcess::from_config(&self.config.processing),
            Arc::clone(&self.ledger),
            Arc::clone(&self.stats),
            self.cancel.clone(),
        );
        let job_tx = pool.sender();

        // Synthetic events for files already present at startup share the
        // candidate channel with nothing else; live events arrive directly
        // from the source.
        let (candidate_tx, mut candidate_rx) = mpsc::channel::<WatchEvent>(256);
        if self.config.processing.process_existing {
            let root = self.config.watch_folder.clone();
            let recursive = self.config.service.recursive;
            let scan_matcher = matcher.clone();
            let scan_tx = candidate_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = scan_existing_async(root, recursive, scan_matcher, scan_tx).await {
                    tracing::error!(error = %e, "Startup scan failed");
                }
            });
        }

        let lost_root = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break None,
                msg = source.recv() => match msg {
                    Some(SourceMessage::Candidate(event)) => self.spawn_gate(event, &job_tx),
                    Some(SourceMessage::RootLost(path)) => break Some(path),
                    None => break None,
                },
                Some(event) = candidate_rx.recv() => self.spawn_gate(event, &job_tx),
            }
        };

        tracing::info!("Shutting down pipeline");
        self.cancel.cancel();
        drop(job_tx);
        pool.join(SHUTDOWN_DEADLINE).await;

        let snapshot = self.stats.snapshot();
        tracing::info!(
            detected = snapshot.detected,
            uploaded = snapshot.uploaded,
            failed = snapshot.failed,
            abandoned = snapshot.abandoned,
            "Pipeline stopped"
        );

        match lost_root {
            Some(path) => Err(WatcherError::RootLost {
                path: path.display().to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Gate a candidate without blocking the event loop: wait for the file
    /// to stabilize, then try to admit it.
    fn spawn_gate(&self, event: WatchEvent, job_tx: &mpsc::UnboundedSender<UploadJob>) {
        self.stats.detected.fetch_add(1, Ordering::Relaxed);

        let ledger = Arc::clone(&self.ledger);
        let stats = Arc::clone(&self.stats);
        let poll = self.config.stability_poll_interval();
        let max_wait = self.config.stability_max_wait();
        let cancel = self.cancel.clone();
        let job_tx = job_tx.clone();

        tokio::spawn(async move {
            let verdict = tokio::select! {
                () = cancel.cancelled() => return,
                verdict = wait_for_stable(&event.path, poll, max_wait) => verdict,
            };

            match verdict {
                Stability::Ready { size } => {
                    if ledger.try_admit(&event.path) {
                        stats.admitted.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(path = %event.path.display(), size, "Job admitted");
                        let job = UploadJob::new(event.path, size, event.detected_at);
                        if let Err(returned) = job_tx.send(job) {
                            // Never reached a worker; undo the admission so
                            // no Pending entry outlives the job.
                            ledger.release(&returned.0.path);
                            tracing::debug!("Upload queue closed, dropping job");
                        }
                    } else {
                        stats.denied.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            path = %event.path.display(),
                            "Duplicate event ignored, job already tracked"
                        );
                    }
                }
                Stability::Abandoned { reason } => {
                    stats.abandoned.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        path = %event.path.display(),
                        ?reason,
                        "Candidate abandoned before upload"
                    );
                }
            }
        });
    }
}
