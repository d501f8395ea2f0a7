//! Channel records.
//!
//! A channel is the owning identity for videos and subscriptions. Channels
//! are created on first reference and never hard-deleted, because video rows
//! keep pointing at them for as long as the archive exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal identifier for a channel row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel as stored in the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    /// Internal row id.
    pub id: ChannelId,
    /// The source platform's permanent identifier (dedup key).
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Channel description, if known.
    pub description: Option<String>,
    /// Subscriber count at last refresh.
    pub subscriber_count: Option<i64>,
    /// Stored thumbnail reference.
    pub thumbnail_path: Option<String>,
    /// Free-form extension metadata.
    pub extra_metadata: Option<serde_json::Value>,
    /// When this row was created.
    pub created_at: DateTime<Utc>,
    /// When this row was last refreshed.
    pub updated_at: DateTime<Utc>,
}

/// Attributes for creating or refreshing a channel.
#[derive(Clone, Debug)]
pub struct NewChannel {
    /// The source platform's permanent identifier.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Channel description.
    pub description: Option<String>,
    /// Subscriber count.
    pub subscriber_count: Option<i64>,
    /// Thumbnail reference.
    pub thumbnail_path: Option<String>,
    /// Free-form extension metadata.
    pub extra_metadata: Option<serde_json::Value>,
}

impl NewChannel {
    /// Create a new channel record with the required identity fields.
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            description: None,
            subscriber_count: None,
            thumbnail_path: None,
            extra_metadata: None,
        }
    }

    /// Set the channel description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the subscriber count.
    #[must_use]
    pub const fn with_subscriber_count(mut self, count: Option<i64>) -> Self {
        self.subscriber_count = count;
        self
    }
}
