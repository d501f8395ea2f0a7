//! Content source port definition.
//!
//! This is the boundary to the external video platform. The core only needs
//! listings, probes, and a cancellable fetch with progress; the mechanics
//! behind them (subprocess, HTTP, rate limiting) stay on the adapter side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::domain::{ContentType, QualityPreference, SubscriptionKind};

/// Cooperative cancellation flag.
///
/// Clones share the same flag. Adapters must poll this between progress
/// checkpoints of a long-running fetch; there are no forced-kill semantics
/// at this boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, uncancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors from the content source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached (timeout, transient network error).
    #[error("Source unavailable: {message}")]
    Unavailable { message: String },

    /// The source is rate-limiting us.
    #[error("Source rate limited")]
    RateLimited,

    /// The channel/playlist/video does not exist or was removed.
    #[error("Source not found: {message}")]
    NotFound { message: String },

    /// A media fetch failed for a reason other than the above.
    #[error("Fetch failed: {reason}")]
    Fetch { reason: String },

    /// The operation observed its cancel flag and stopped.
    #[error("Operation cancelled")]
    Cancelled,

    /// Local I/O failed (destination directory, file handling).
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl SourceError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch {
            reason: reason.into(),
        }
    }

    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Whether this error should feed the backoff governor and leave the
    /// work retryable, as opposed to failing permanently.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RateLimited | Self::Io { .. }
        )
    }
}

/// One item of a source listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceItem {
    /// The platform's permanent identifier for the item.
    pub external_id: String,
    /// Title.
    pub title: String,
    /// Item category.
    pub content_type: ContentType,
    /// Publish time, when the listing exposes one.
    pub published_at: Option<DateTime<Utc>>,
}

/// Channel/playlist identity resolved from a source URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    /// The owning channel's external id.
    pub channel_external_id: String,
    /// The owning channel's display name.
    pub channel_name: String,
    /// Channel description, when exposed.
    pub description: Option<String>,
    /// Subscriber count, when exposed.
    pub subscriber_count: Option<i64>,
    /// Whether the URL resolved to a channel feed or a playlist.
    pub kind: SubscriptionKind,
}

/// Full metadata for a single video URL.
#[derive(Clone, Debug)]
pub struct VideoProbe {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub upload_date: Option<DateTime<Utc>>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub content_type: ContentType,
    /// The owning channel's identity.
    pub channel: SourceInfo,
}

/// Parameters for fetching one item's media.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// The platform's identifier of the item to fetch.
    pub external_id: String,
    /// Target quality.
    pub quality: QualityPreference,
    /// Subtitle languages to fetch alongside the media.
    pub subtitle_languages: Vec<String>,
    /// Directory the media lands in (created by the caller).
    pub destination: PathBuf,
}

/// Result of a successful fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedMedia {
    /// Path of the primary media file.
    pub file_path: PathBuf,
    /// Size of the primary media file in bytes.
    pub file_size: u64,
}

/// Progress callback, invoked with a percentage in [0, 100].
pub type ProgressCallback<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Port for the external content source.
#[async_trait]
pub trait ContentSourcePort: Send + Sync {
    /// List up to `max_items` most-recent items of a channel or playlist.
    async fn list_recent_items(
        &self,
        source_url: &str,
        max_items: u32,
    ) -> Result<Vec<SourceItem>, SourceError>;

    /// Resolve a source URL to its channel/playlist identity.
    async fn probe_source(&self, url: &str) -> Result<SourceInfo, SourceError>;

    /// Resolve a single video URL to its full metadata.
    async fn probe_video(&self, url: &str) -> Result<VideoProbe, SourceError>;

    /// Fetch one item's media into the request's destination directory,
    /// reporting progress and polling `cancel` between checkpoints.
    async fn fetch_item(
        &self,
        request: &FetchRequest,
        on_progress: ProgressCallback<'_>,
        cancel: &CancelFlag,
    ) -> Result<FetchedMedia, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());

        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::unavailable("timeout").is_transient());
        assert!(SourceError::RateLimited.is_transient());
        assert!(SourceError::io("disk").is_transient());
        assert!(!SourceError::not_found("gone").is_transient());
        assert!(!SourceError::fetch("drm").is_transient());
        assert!(!SourceError::Cancelled.is_transient());
    }
}
