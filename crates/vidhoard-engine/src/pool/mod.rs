//! Acquisition worker pools.
//!
//! A fixed pool of download workers plus a smaller pool of discovery
//! workers, all claiming from the shared durable queue by capability.
//! Workers park on a `Notify` when the queue is empty (with a poll-interval
//! fallback) and consult the backoff governor before touching the source.

mod paths;
mod worker;

pub use paths::{DownloadDestination, sanitize_component};
pub use worker::WorkerDeps;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use vidhoard_core::{
    BackoffGovernor, CancelFlag, Job, JobId, JobKind, JobPayload, JobQueuePort, Settings,
};

use crate::discovery::DiscoveryRunner;

/// Result of executing one claimed job.
///
/// Workers translate every outcome into exactly one queue transition; errors
/// from the source never propagate past this boundary.
#[derive(Debug)]
pub enum ExecOutcome {
    /// The job finished; `complete` with this result payload.
    Completed(serde_json::Value),
    /// The job failed; `release` back to queued when `requeue` is set
    /// (transient error with attempt budget left), `fail` otherwise.
    Failed { message: String, requeue: bool },
    /// A pause request was acknowledged mid-fetch; the job is already
    /// `paused` and must not be transitioned again.
    PauseAcknowledged,
}

impl ExecOutcome {
    /// A permanent failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            requeue: false,
        }
    }

    /// A transient failure that should be retried later.
    pub fn requeue(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            requeue: true,
        }
    }
}

/// Pool sizing and execution knobs, derived from [`Settings`].
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of concurrent download workers.
    pub download_workers: usize,
    /// Number of discovery/metadata workers.
    pub discovery_workers: usize,
    /// Idle poll fallback when no notify pulse arrives.
    pub poll_interval: Duration,
    /// Claim attempts before a transient failure becomes terminal.
    pub max_job_attempts: i64,
}

impl PoolConfig {
    /// Derive the pool configuration from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            download_workers: settings.download_workers,
            discovery_workers: settings.discovery_workers,
            poll_interval: settings.worker_poll_interval(),
            max_job_attempts: i64::from(settings.max_job_attempts),
        }
    }
}

const DOWNLOAD_KINDS: &[JobKind] = &[JobKind::Download];
const DISCOVERY_KINDS: &[JobKind] = &[JobKind::Discovery, JobKind::ExtractMetadata];

/// The worker pool.
///
/// Construction wires dependencies; [`AcquisitionPool::ensure_workers`]
/// spawns the worker tasks exactly once for the lifetime of the pool.
pub struct AcquisitionPool {
    jobs: Arc<dyn JobQueuePort>,
    backoff: Arc<BackoffGovernor>,
    discovery: Arc<DiscoveryRunner>,
    worker_deps: WorkerDeps,
    config: PoolConfig,
    /// Cancel flags of currently executing download jobs.
    active: Mutex<HashMap<JobId, CancelFlag>>,
    notify: Arc<Notify>,
    shutdown: CancellationToken,
    workers_started: AtomicBool,
}

impl AcquisitionPool {
    /// Create a pool. Workers are not started until
    /// [`AcquisitionPool::ensure_workers`] is called.
    pub fn new(
        jobs: Arc<dyn JobQueuePort>,
        backoff: Arc<BackoffGovernor>,
        discovery: Arc<DiscoveryRunner>,
        worker_deps: WorkerDeps,
        notify: Arc<Notify>,
        config: PoolConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            jobs,
            backoff,
            discovery,
            worker_deps,
            config,
            active: Mutex::new(HashMap::new()),
            notify,
            shutdown: CancellationToken::new(),
            workers_started: AtomicBool::new(false),
        })
    }

    /// The notify handle; pulse it after enqueuing work so idle workers wake
    /// immediately instead of at the next poll tick.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Spawn the worker tasks. Idempotent: calling it again after the first
    /// call has no effect.
    pub fn ensure_workers(self: &Arc<Self>) {
        if self
            .workers_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        for worker in 0..self.config.download_workers {
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.worker_loop(DOWNLOAD_KINDS, worker).await;
            });
        }
        for worker in 0..self.config.discovery_workers {
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.worker_loop(DISCOVERY_KINDS, worker).await;
            });
        }

        tracing::info!(
            download_workers = self.config.download_workers,
            discovery_workers = self.config.discovery_workers,
            "worker pools started"
        );
    }

    /// Request cooperative cancellation of an active download.
    ///
    /// Returns false when the job is not currently executing here (already
    /// finished, or only queued).
    pub fn cancel_active(&self, id: JobId) -> bool {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match active.get(&id) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop claiming new work and cancel all active downloads.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for flag in active.values() {
            flag.cancel();
        }
        tracing::info!("worker pools stopping");
    }

    /// One worker: wait out backoff windows, claim by capability, execute,
    /// finalize, park when idle.
    async fn worker_loop(self: Arc<Self>, kinds: &'static [JobKind], worker: usize) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            // Sleep out an open backoff window without holding a job
            let wait = self.backoff.next_available_in();
            if !wait.is_zero() {
                let nap = wait.min(self.config.poll_interval);
                tracing::debug!(worker, kinds = ?kinds, nap_ms = nap.as_millis() as u64, "backing off");
                tokio::select! {
                    () = tokio::time::sleep(nap) => {}
                    () = self.shutdown.cancelled() => break,
                }
                continue;
            }

            match self.jobs.claim_next(kinds).await {
                Ok(Some(job)) => {
                    self.execute(job).await;
                    // Keep draining while work remains
                }
                Ok(None) => {
                    tokio::select! {
                        () = self.notify.notified() => {}
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = self.shutdown.cancelled() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(worker, error = %e, "claim failed");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = self.shutdown.cancelled() => break,
                    }
                }
            }
        }
    }

    /// Execute one claimed job and apply its single queue transition.
    async fn execute(&self, job: Job) {
        // The window may have opened between the pre-claim check and now;
        // defer the job rather than hammering the source
        if !self.backoff.is_available() {
            if let Err(e) = self.jobs.release(job.id).await {
                tracing::error!(job = %job.id, error = %e, "failed to defer job");
            } else {
                tracing::debug!(job = %job.id, "deferred claimed job, source backing off");
            }
            return;
        }

        let cancel = CancelFlag::new();
        if matches!(job.payload, JobPayload::Download { .. }) {
            self.active
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(job.id, cancel.clone());
        }

        let attempts_left = job.attempts < self.config.max_job_attempts;
        let outcome = match &job.payload {
            JobPayload::Download { video_id, quality } => {
                worker::run_download(
                    &self.worker_deps,
                    &job,
                    *video_id,
                    *quality,
                    attempts_left,
                    &cancel,
                )
                .await
            }
            JobPayload::Discovery { subscription_id } => {
                self.discovery.run_discovery(*subscription_id).await
            }
            JobPayload::ExtractMetadata {
                url,
                quality,
                auto_download,
            } => {
                self.discovery
                    .run_extract(url, *quality, *auto_download)
                    .await
            }
        };

        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&job.id);

        // Apply the single queue transition for this outcome. A transition
        // rejection here means a data-consistency problem; it is logged
        // loudly and the job is left as-is rather than silently retried.
        match outcome {
            ExecOutcome::Completed(result) => {
                if let Err(e) = self.jobs.complete(job.id, result).await {
                    tracing::error!(job = %job.id, error = %e, "failed to complete job");
                }
            }
            ExecOutcome::Failed { message, requeue } => {
                if requeue {
                    tracing::warn!(job = %job.id, error = %message, "transient failure, re-queueing");
                    if let Err(e) = self.jobs.release(job.id).await {
                        tracing::error!(job = %job.id, error = %e, "failed to re-queue job");
                    }
                } else {
                    tracing::warn!(job = %job.id, error = %message, "job failed");
                    if let Err(e) = self.jobs.fail(job.id, &message).await {
                        tracing::error!(job = %job.id, error = %e, "failed to fail job");
                    }
                }
            }
            ExecOutcome::PauseAcknowledged => {
                tracing::info!(job = %job.id, "download pause acknowledged");
            }
        }
    }
}
