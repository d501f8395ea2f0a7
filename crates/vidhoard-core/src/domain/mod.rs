//! Domain model for the archiver.
//!
//! Pure data types with no I/O dependencies.

mod channel;
mod discovery;
mod job;
mod quality;
mod subscription;
mod video;

pub use channel::{Channel, ChannelId, NewChannel};
pub use discovery::{DiscoveryEvent, DiscoveryOutcome, NewDiscoveryEvent};
pub use job::{
    Enqueued, Job, JobFilter, JobId, JobKind, JobPayload, JobStatus, NewJob, PRIORITY_MANUAL,
    PRIORITY_SUBSCRIPTION, QueueCounts,
};
pub use quality::QualityPreference;
pub use subscription::{
    NewSubscription, Subscription, SubscriptionId, SubscriptionKind, SubscriptionUpdate,
};
pub use video::{ContentType, NewVideo, StoredFile, Video, VideoFilter, VideoId, VideoStatus};
