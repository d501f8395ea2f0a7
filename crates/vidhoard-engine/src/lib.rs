//! Acquisition engine for vidhoard.
//!
//! Owns everything between the persisted stores and the content source: the
//! cron-driven [`SubscriptionScheduler`], the [`DiscoveryRunner`] that diffs
//! upstream listings against the catalog, the [`AcquisitionPool`] of bounded
//! download/discovery workers, the yt-dlp source adapter, and the
//! [`ArchiveService`] facade that outer layers (CLI, HTTP) talk to.

pub mod discovery;
pub mod error;
pub mod pool;
pub mod progress;
pub mod scheduler;
pub mod service;
pub mod source;

pub use discovery::DiscoveryRunner;
pub use error::ArchiveError;
pub use pool::{AcquisitionPool, PoolConfig};
pub use progress::ProgressThrottle;
pub use scheduler::{
    NextFire, ScheduleError, SchedulerStatus, SubscriptionScheduler, parse_check_frequency,
};
pub use service::{ArchiveService, NewSubscriptionRequest, SchedulerOverview};
pub use source::YtDlpSource;
