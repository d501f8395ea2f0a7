//! Core domain types and port definitions for vidhoard.
//!
//! This crate contains the pure domain model of the archiver (channels,
//! videos, subscriptions, jobs, discovery events), the port traits that
//! infrastructure crates implement, the process-wide backoff governor, and
//! application settings. It performs no I/O and has no adapter dependencies.

pub mod backoff;
pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use backoff::{BackoffConfig, BackoffGovernor, BackoffStatus};
pub use domain::{
    Channel, ChannelId, ContentType, DiscoveryEvent, DiscoveryOutcome, Enqueued, Job, JobFilter,
    JobId, JobKind, JobPayload, JobStatus, NewChannel, NewDiscoveryEvent, NewJob, NewSubscription,
    NewVideo, PRIORITY_MANUAL, PRIORITY_SUBSCRIPTION, QualityPreference, QueueCounts, StoredFile,
    Subscription, SubscriptionId, SubscriptionKind, SubscriptionUpdate, Video, VideoFilter,
    VideoId, VideoStatus,
};
pub use ports::{
    CancelFlag, CatalogStorePort, ContentSourcePort, DiscoveryLogPort, FetchRequest, FetchedMedia,
    JobQueuePort, ProgressCallback, QueueError, RepositoryError, SourceError, SourceInfo,
    SourceItem, Stores, SubscriptionStorePort, VideoProbe,
};
pub use settings::{Settings, SettingsError, validate_settings};

// Silence unused dev-dependency warnings until we add mock-based tests
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
