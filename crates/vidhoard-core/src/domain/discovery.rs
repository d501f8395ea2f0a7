//! Discovery run audit records.
//!
//! One row per discovery run, appended after the run regardless of outcome.
//! These rows are observability data; nothing reads them for control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subscription::SubscriptionId;

/// Outcome classification of a discovery run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryOutcome {
    /// The listing was fetched and every new item was handled.
    Success,
    /// The listing was fetched but some items could not be inserted/queued.
    Partial,
    /// The source could not be reached at all.
    Failed,
}

impl DiscoveryOutcome {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "partial" => Self::Partial,
            "failed" => Self::Failed,
            _ => Self::Success,
        }
    }
}

/// A completed discovery run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub id: i64,
    pub subscription_id: SubscriptionId,
    pub outcome: DiscoveryOutcome,
    /// Items returned by the source listing.
    pub videos_found: i64,
    /// New video rows created.
    pub videos_added: i64,
    /// Download jobs enqueued.
    pub videos_queued: i64,
    /// Items dropped by the content-type filter.
    pub videos_filtered: i64,
    /// Wall-clock duration of the run.
    pub duration_ms: i64,
    /// Error detail for failed/partial runs.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A discovery event about to be appended.
#[derive(Clone, Debug)]
pub struct NewDiscoveryEvent {
    pub subscription_id: SubscriptionId,
    pub outcome: DiscoveryOutcome,
    pub videos_found: i64,
    pub videos_added: i64,
    pub videos_queued: i64,
    pub videos_filtered: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
}

impl NewDiscoveryEvent {
    /// A failed run: nothing was found or added.
    pub fn failed(
        subscription_id: SubscriptionId,
        duration_ms: i64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id,
            outcome: DiscoveryOutcome::Failed,
            videos_found: 0,
            videos_added: 0,
            videos_queued: 0,
            videos_filtered: 0,
            duration_ms,
            error: Some(error.into()),
        }
    }
}
