//! Acquisition job queue port definition.
//!
//! The queue owns job lifecycle. All transitions are guarded twice: by the
//! state machine in [`JobStatus::can_transition`] and by conditional SQL in
//! the implementation, so an illegal call can never corrupt queue state.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Enqueued, Job, JobFilter, JobId, JobKind, JobStatus, NewJob, QueueCounts};

/// Errors for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The job does not exist.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The requested transition is not a legal state-machine edge. This is a
    /// programming-contract failure and callers must treat it as fatal for
    /// the affected job.
    #[error("Job {job}: illegal transition {from} -> {to}")]
    InvalidTransition {
        job: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// Progress outside [0, 100].
    #[error("Progress {0} outside [0, 100]")]
    InvalidProgress(f64),

    /// The operation only applies to download jobs.
    #[error("Job {0} is not pausable (download jobs only)")]
    NotPausable(JobId),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable, priority-ordered job queue.
///
/// # Ordering
///
/// `claim_next` services strictly higher priorities first and is FIFO by
/// creation time within a band. The claim is a single atomic conditional
/// update; two workers can never claim the same job.
#[async_trait]
pub trait JobQueuePort: Send + Sync {
    /// Enqueue a job in `queued` state, stamping its creation time.
    ///
    /// Download enqueues are coalesced: when a queued or active download job
    /// already targets the same video, no new row is created and the
    /// existing job id is returned with `coalesced = true`. Discovery
    /// enqueues coalesce the same way per subscription, which is how missed
    /// timer fires collapse into one run.
    async fn enqueue(&self, job: &NewJob) -> Result<Enqueued, QueueError>;

    /// Atomically claim the highest-priority queued job matching one of the
    /// given kinds, transitioning it to `active` and stamping `started_at`.
    /// Each claim counts one attempt.
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>, QueueError>;

    /// Transition an active job to `completed` with its result payload.
    async fn complete(&self, id: JobId, result: serde_json::Value) -> Result<(), QueueError>;

    /// Transition an active job to `failed` with an error message.
    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), QueueError>;

    /// Reset a failed job to `queued`, preserving its priority. Clears the
    /// error, progress and timestamps of the failed attempt.
    async fn retry(&self, id: JobId) -> Result<(), QueueError>;

    /// Return an active job to `queued` without completing it (deferral
    /// path: the backoff window closed, or a transient source error left
    /// retry budget). The consumed attempt is kept.
    async fn release(&self, id: JobId) -> Result<(), QueueError>;

    /// Transition an active download job to `paused`.
    async fn pause(&self, id: JobId) -> Result<(), QueueError>;

    /// Transition a paused job back to `queued`.
    async fn resume(&self, id: JobId) -> Result<(), QueueError>;

    /// Update an active job's progress percentage. Values outside [0, 100]
    /// are rejected with [`QueueError::InvalidProgress`].
    async fn update_progress(&self, id: JobId, percent: f64) -> Result<(), QueueError>;

    /// Fetch one job.
    async fn get(&self, id: JobId) -> Result<Job, QueueError>;

    /// List jobs, newest first.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, QueueError>;

    /// Aggregate counters for status surfaces.
    async fn counts(&self) -> Result<QueueCounts, QueueError>;

    /// Return all `active` jobs to `queued`. Called once at startup to
    /// recover jobs orphaned by a previous process that died mid-claim.
    /// Returns how many jobs were re-queued.
    async fn requeue_orphaned(&self) -> Result<u64, QueueError>;
}
