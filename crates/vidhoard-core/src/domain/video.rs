//! Video records and their download lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::channel::ChannelId;
use super::quality::QualityPreference;

/// Internal identifier for a video row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub i64);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download lifecycle state of a video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Known but not downloaded yet.
    Pending,
    /// A download job is currently fetching it.
    Downloading,
    /// Downloaded successfully; `file_path`/`file_size` are set.
    Completed,
    /// Last download attempt failed.
    Failed,
    /// Soft-deleted; history is kept.
    Deleted,
}

impl VideoStatus {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "deleted" => Self::Deleted,
            // "pending" or unknown values default to Pending
            _ => Self::Pending,
        }
    }
}

/// Category of a discovered item.
///
/// Subscriptions carry an allow-list of these; discovery drops items whose
/// category is not in the list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// An ordinary video.
    #[default]
    Video,
    /// A short-form video.
    Short,
    /// A live stream or its recording.
    Live,
}

impl ContentType {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Short => "short",
            Self::Live => "live",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "short" => Self::Short,
            "live" => Self::Live,
            _ => Self::Video,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A downloaded media file reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Path of the media file, relative to the storage root.
    pub path: String,
    /// Size in bytes.
    pub size: i64,
}

/// A video as stored in the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Video {
    /// Internal row id.
    pub id: VideoId,
    /// The source platform's permanent identifier (globally unique).
    pub external_id: String,
    /// Owning channel.
    pub channel_id: ChannelId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Duration in seconds.
    pub duration_secs: Option<i64>,
    /// Original upload time.
    pub upload_date: Option<DateTime<Utc>>,
    /// View count at catalog time.
    pub view_count: Option<i64>,
    /// Like count at catalog time.
    pub like_count: Option<i64>,
    /// Item category.
    pub content_type: ContentType,
    /// Quality the video was (or will be) downloaded at.
    pub quality: Option<QualityPreference>,
    /// Media file path once downloaded.
    pub file_path: Option<String>,
    /// Media file size once downloaded.
    pub file_size: Option<i64>,
    /// Download lifecycle state.
    pub status: VideoStatus,
    /// Whether a thumbnail was generated locally.
    pub thumbnail_generated: bool,
    /// Free-form extension metadata.
    pub extra_metadata: Option<serde_json::Value>,
    /// When this row was created.
    pub created_at: DateTime<Utc>,
    /// When this row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Attributes for inserting a new video in `pending` state.
#[derive(Clone, Debug)]
pub struct NewVideo {
    pub external_id: String,
    pub channel_id: ChannelId,
    pub title: String,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub upload_date: Option<DateTime<Utc>>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub content_type: ContentType,
    pub quality: Option<QualityPreference>,
    pub extra_metadata: Option<serde_json::Value>,
}

impl NewVideo {
    /// Create a new video record with the required fields.
    pub fn new(
        external_id: impl Into<String>,
        channel_id: ChannelId,
        title: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            channel_id,
            title: title.into(),
            description: None,
            duration_secs: None,
            upload_date: None,
            view_count: None,
            like_count: None,
            content_type: ContentType::Video,
            quality: None,
            extra_metadata: None,
        }
    }

    /// Set the content type.
    #[must_use]
    pub const fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set the quality preference.
    #[must_use]
    pub const fn with_quality(mut self, quality: Option<QualityPreference>) -> Self {
        self.quality = quality;
        self
    }

    /// Set the upload date.
    #[must_use]
    pub const fn with_upload_date(mut self, upload_date: Option<DateTime<Utc>>) -> Self {
        self.upload_date = upload_date;
        self
    }
}

/// Filter for catalog video listings.
#[derive(Clone, Debug, Default)]
pub struct VideoFilter {
    /// Restrict to one channel.
    pub channel_id: Option<ChannelId>,
    /// Restrict to one status.
    pub status: Option<VideoStatus>,
    /// Maximum rows to return (0 means the store's default).
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            VideoStatus::Pending,
            VideoStatus::Downloading,
            VideoStatus::Completed,
            VideoStatus::Failed,
            VideoStatus::Deleted,
        ] {
            assert_eq!(VideoStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_pending() {
        assert_eq!(VideoStatus::parse("garbage"), VideoStatus::Pending);
    }

    #[test]
    fn test_content_type_roundtrip() {
        for c in [ContentType::Video, ContentType::Short, ContentType::Live] {
            assert_eq!(ContentType::parse(c.as_str()), c);
        }
    }
}
