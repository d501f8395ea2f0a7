//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No process/filesystem implementation details
//! - Intent-based methods, not generic CRUD
//! - Cancellation crosses the source port as a plain [`CancelFlag`], never
//!   as a runtime-specific token type

pub mod catalog;
pub mod discovery_log;
pub mod job_queue;
pub mod source;
pub mod subscription;

use std::sync::Arc;
use thiserror::Error;

pub use catalog::CatalogStorePort;
pub use discovery_log::DiscoveryLogPort;
pub use job_queue::{JobQueuePort, QueueError};
pub use source::{
    CancelFlag, ContentSourcePort, FetchRequest, FetchedMedia, ProgressCallback, SourceError,
    SourceInfo, SourceItem, VideoProbe,
};
pub use subscription::SubscriptionStorePort;

/// Container for all repository trait objects.
///
/// Adapters receive one of these from the database factory and never touch
/// concrete repository types.
#[derive(Clone)]
pub struct Stores {
    /// Channel/video catalog.
    pub catalog: Arc<dyn CatalogStorePort>,
    /// Subscription records.
    pub subscriptions: Arc<dyn SubscriptionStorePort>,
    /// Durable acquisition job queue.
    pub jobs: Arc<dyn JobQueuePort>,
    /// Append-only discovery run log.
    pub discovery_log: Arc<dyn DiscoveryLogPort>,
}

impl Stores {
    /// Create a new store container.
    pub fn new(
        catalog: Arc<dyn CatalogStorePort>,
        subscriptions: Arc<dyn SubscriptionStorePort>,
        jobs: Arc<dyn JobQueuePort>,
        discovery_log: Arc<dyn DiscoveryLogPort>,
    ) -> Self {
        Self {
            catalog,
            subscriptions,
            jobs,
            discovery_log,
        }
    }
}

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details (e.g., sqlx
/// errors) and provides a clean interface for callers to handle storage
/// failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists. For video inserts
    /// this is the duplicate-external-id contract failure.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., foreign key).
    #[error("Constraint violation: {0}")]
    Constraint(String),
}
