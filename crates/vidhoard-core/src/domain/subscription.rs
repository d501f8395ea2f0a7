//! Subscription records.
//!
//! A subscription ties a channel or playlist URL to a recurring check
//! schedule. The scheduler owns the derived timers; this module only holds
//! the persistent shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::channel::ChannelId;
use super::quality::QualityPreference;
use super::video::ContentType;

/// Internal identifier for a subscription row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of source a subscription polls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// A channel's upload feed.
    #[default]
    Channel,
    /// A playlist.
    Playlist,
}

impl SubscriptionKind {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Playlist => "playlist",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "playlist" => Self::Playlist,
            _ => Self::Channel,
        }
    }
}

/// A subscription as stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    /// Internal row id.
    pub id: SubscriptionId,
    /// Target channel (owner of discovered videos).
    pub channel_id: ChannelId,
    /// Channel feed or playlist.
    pub kind: SubscriptionKind,
    /// URL polled for the item listing.
    pub source_url: String,
    /// Whether the subscription currently has a timer.
    pub enabled: bool,
    /// Whether newly discovered items are queued for download.
    pub auto_download: bool,
    /// Quality newly discovered items are downloaded at.
    pub quality: QualityPreference,
    /// Subtitle languages to fetch alongside the media.
    pub subtitle_languages: Vec<String>,
    /// Allow-list of item categories that become video rows.
    pub content_types: Vec<ContentType>,
    /// Check schedule as a 5-field cron expression.
    pub check_frequency: String,
    /// Maximum recent items inspected per check.
    pub latest_n_videos: u32,
    /// When the last check ran (updated even on failed checks).
    pub last_check: Option<DateTime<Utc>>,
    /// How many new items the last check found.
    pub new_videos_count: i64,
    /// Free-form extension metadata.
    pub extra_metadata: Option<serde_json::Value>,
    /// When this row was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the content-type filter admits the given category.
    #[must_use]
    pub fn wants(&self, content_type: ContentType) -> bool {
        self.content_types.contains(&content_type)
    }
}

/// Attributes for creating a subscription.
#[derive(Clone, Debug)]
pub struct NewSubscription {
    pub channel_id: ChannelId,
    pub kind: SubscriptionKind,
    pub source_url: String,
    pub enabled: bool,
    pub auto_download: bool,
    pub quality: QualityPreference,
    pub subtitle_languages: Vec<String>,
    pub content_types: Vec<ContentType>,
    pub check_frequency: String,
    pub latest_n_videos: u32,
    pub extra_metadata: Option<serde_json::Value>,
}

impl NewSubscription {
    /// Create a subscription with the given identity and the usual defaults:
    /// enabled, auto-download, all content types, hourly checks.
    pub fn new(
        channel_id: ChannelId,
        kind: SubscriptionKind,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            channel_id,
            kind,
            source_url: source_url.into(),
            enabled: true,
            auto_download: true,
            quality: QualityPreference::default(),
            subtitle_languages: Vec::new(),
            content_types: vec![ContentType::Video, ContentType::Short, ContentType::Live],
            check_frequency: "0 * * * *".to_string(),
            latest_n_videos: 20,
            extra_metadata: None,
        }
    }

    /// Set the check schedule.
    #[must_use]
    pub fn with_check_frequency(mut self, cron: impl Into<String>) -> Self {
        self.check_frequency = cron.into();
        self
    }

    /// Set the content-type allow-list.
    #[must_use]
    pub fn with_content_types(mut self, types: Vec<ContentType>) -> Self {
        self.content_types = types;
        self
    }

    /// Set the quality preference.
    #[must_use]
    pub const fn with_quality(mut self, quality: QualityPreference) -> Self {
        self.quality = quality;
        self
    }

    /// Set auto-download behaviour.
    #[must_use]
    pub const fn with_auto_download(mut self, auto_download: bool) -> Self {
        self.auto_download = auto_download;
        self
    }
}

/// Partial update for a subscription; `None` fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionUpdate {
    pub enabled: Option<bool>,
    pub auto_download: Option<bool>,
    pub quality: Option<QualityPreference>,
    pub subtitle_languages: Option<Vec<String>>,
    pub content_types: Option<Vec<ContentType>>,
    pub check_frequency: Option<String>,
    pub latest_n_videos: Option<u32>,
    pub extra_metadata: Option<serde_json::Value>,
}

impl SubscriptionUpdate {
    /// Whether this update touches fields the scheduler cares about.
    #[must_use]
    pub const fn affects_schedule(&self) -> bool {
        self.enabled.is_some() || self.check_frequency.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(
            SubscriptionKind::parse(SubscriptionKind::Playlist.as_str()),
            SubscriptionKind::Playlist
        );
        assert_eq!(SubscriptionKind::parse("channel"), SubscriptionKind::Channel);
    }

    #[test]
    fn test_defaults_admit_everything() {
        let sub = NewSubscription::new(ChannelId(1), SubscriptionKind::Channel, "url");
        assert!(sub.content_types.contains(&ContentType::Video));
        assert!(sub.content_types.contains(&ContentType::Short));
        assert!(sub.content_types.contains(&ContentType::Live));
        assert!(sub.enabled);
        assert_eq!(sub.latest_n_videos, 20);
    }

    #[test]
    fn test_affects_schedule() {
        let mut update = SubscriptionUpdate::default();
        assert!(!update.affects_schedule());
        update.check_frequency = Some("*/5 * * * *".into());
        assert!(update.affects_schedule());
    }
}
