//! Acquisition jobs.
//!
//! A job is a common envelope (id, priority, status, progress, timestamps)
//! around a tagged payload variant, so a download job cannot carry discovery
//! fields and vice versa. The queue persists the envelope columns plus the
//! serialized payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::quality::QualityPreference;
use super::subscription::SubscriptionId;
use super::video::VideoId;

/// Priority assigned to manually added downloads.
pub const PRIORITY_MANUAL: i64 = 0;

/// Priority assigned to subscription-discovered downloads. Above the manual
/// default so subscription content does not starve behind a backlog, below
/// explicitly elevated user requests.
pub const PRIORITY_SUBSCRIPTION: i64 = 1;

/// Internal identifier for a job row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker.
    Queued,
    /// Claimed by exactly one worker.
    Active,
    /// Finished successfully; terminal.
    Completed,
    /// Finished with an error; terminal except for explicit retry.
    Failed,
    /// Cooperatively paused; returns to queued on resume.
    Paused,
}

impl JobStatus {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "paused" => Self::Paused,
            // "queued" or unknown values default to Queued
            _ => Self::Queued,
        }
    }

    /// Whether moving from `self` to `to` is a legal state-machine edge.
    ///
    /// Legal paths: queued → active → {completed, failed, paused, queued};
    /// failed → queued (retry); paused → queued (resume). The active →
    /// queued edge is the deferral path used when the backoff window closes
    /// between claim and execution.
    #[must_use]
    pub const fn can_transition(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Failed)
                | (Self::Active, Self::Paused)
                | (Self::Active, Self::Queued)
                | (Self::Failed, Self::Queued)
                | (Self::Paused, Self::Queued)
        )
    }

    /// Whether this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discriminant of a job payload; workers claim by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Fetch one video's media.
    Download,
    /// Poll a subscription's listing and diff it against the catalog.
    Discovery,
    /// Resolve metadata for a bare URL and create catalog rows.
    ExtractMetadata,
}

impl JobKind {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Discovery => "discovery",
            Self::ExtractMetadata => "extract_metadata",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "discovery" => Self::Discovery,
            "extract_metadata" => Self::ExtractMetadata,
            _ => Self::Download,
        }
    }
}

/// Type-specific job data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// Download one video's media at the given quality.
    Download {
        video_id: VideoId,
        quality: QualityPreference,
    },
    /// Run a discovery pass for one subscription.
    Discovery { subscription_id: SubscriptionId },
    /// Resolve a bare URL into catalog rows, optionally queueing a download.
    ExtractMetadata {
        url: String,
        quality: QualityPreference,
        auto_download: bool,
    },
}

impl JobPayload {
    /// The payload's discriminant.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::Download { .. } => JobKind::Download,
            Self::Discovery { .. } => JobKind::Discovery,
            Self::ExtractMetadata { .. } => JobKind::ExtractMetadata,
        }
    }

    /// The referenced video, if any.
    #[must_use]
    pub const fn video_id(&self) -> Option<VideoId> {
        match self {
            Self::Download { video_id, .. } => Some(*video_id),
            _ => None,
        }
    }

    /// The referenced subscription, if any.
    #[must_use]
    pub const fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Discovery { subscription_id } => Some(*subscription_id),
            _ => None,
        }
    }
}

/// A job as stored in the queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    /// Internal row id.
    pub id: JobId,
    /// Type-specific data.
    pub payload: JobPayload,
    /// Higher priorities are serviced first; FIFO within a band.
    pub priority: i64,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Progress percentage in [0, 100]; meaningful while active.
    pub progress: f64,
    /// How many times a worker has claimed this job.
    pub attempts: i64,
    /// Error message from the last failure.
    pub error_message: Option<String>,
    /// Result payload from successful completion.
    pub result: Option<serde_json::Value>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the current attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A job about to be enqueued.
#[derive(Clone, Debug)]
pub struct NewJob {
    pub payload: JobPayload,
    pub priority: i64,
}

impl NewJob {
    /// A download job at the manual-add priority.
    #[must_use]
    pub const fn download(video_id: VideoId, quality: QualityPreference) -> Self {
        Self {
            payload: JobPayload::Download { video_id, quality },
            priority: PRIORITY_MANUAL,
        }
    }

    /// A discovery job for one subscription.
    #[must_use]
    pub const fn discovery(subscription_id: SubscriptionId) -> Self {
        Self {
            payload: JobPayload::Discovery { subscription_id },
            priority: PRIORITY_MANUAL,
        }
    }

    /// A metadata-extraction job for a bare URL.
    #[must_use]
    pub fn extract_metadata(
        url: impl Into<String>,
        quality: QualityPreference,
        auto_download: bool,
    ) -> Self {
        Self {
            payload: JobPayload::ExtractMetadata {
                url: url.into(),
                quality,
                auto_download,
            },
            priority: PRIORITY_MANUAL,
        }
    }

    /// Override the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Result of an enqueue call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enqueued {
    /// The job's id (existing job when coalesced).
    pub id: JobId,
    /// True when the enqueue was a no-op against an existing queued or
    /// active job for the same target.
    pub coalesced: bool,
}

/// Aggregate queue counters for status surfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub total: i64,
    pub queued: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub paused: i64,
}

/// Filter for queue listings.
#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    /// Maximum rows to return (0 means the store's default).
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            JobStatus::Queued,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Paused,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_legal_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition(Active));
        assert!(Active.can_transition(Completed));
        assert!(Active.can_transition(Failed));
        assert!(Active.can_transition(Paused));
        assert!(Active.can_transition(Queued));
        assert!(Failed.can_transition(Queued));
        assert!(Paused.can_transition(Queued));
    }

    #[test]
    fn test_illegal_transitions() {
        use JobStatus::*;
        assert!(!Queued.can_transition(Completed));
        assert!(!Queued.can_transition(Failed));
        assert!(!Completed.can_transition(Queued));
        assert!(!Completed.can_transition(Active));
        assert!(!Failed.can_transition(Active));
        assert!(!Paused.can_transition(Active));
        assert!(!Paused.can_transition(Failed));
    }

    #[test]
    fn test_payload_kind_and_refs() {
        let download = JobPayload::Download {
            video_id: VideoId(7),
            quality: QualityPreference::P720,
        };
        assert_eq!(download.kind(), JobKind::Download);
        assert_eq!(download.video_id(), Some(VideoId(7)));
        assert_eq!(download.subscription_id(), None);

        let discovery = JobPayload::Discovery {
            subscription_id: SubscriptionId(3),
        };
        assert_eq!(discovery.kind(), JobKind::Discovery);
        assert_eq!(discovery.subscription_id(), Some(SubscriptionId(3)));
        assert_eq!(discovery.video_id(), None);
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let payload = JobPayload::Download {
            video_id: VideoId(1),
            quality: QualityPreference::P1080,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"download\""));

        let parsed: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_subscription_priority_above_manual() {
        assert!(PRIORITY_SUBSCRIPTION > PRIORITY_MANUAL);
    }
}
