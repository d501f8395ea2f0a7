//! Engine error type.
//!
//! The facade surfaces one error enum to outer layers; workers never let
//! these escape to the scheduler or queue.

use thiserror::Error;

use vidhoard_core::{QueueError, RepositoryError, SourceError};

use crate::scheduler::ScheduleError;

/// Errors surfaced by the [`crate::ArchiveService`] facade.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Storage operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Content source operation failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Scheduling failed (bad cron expression).
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(String),
}
