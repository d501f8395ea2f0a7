//! Subscription store port definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::domain::{ChannelId, NewSubscription, Subscription, SubscriptionId, SubscriptionUpdate};

/// Port for persisting subscriptions.
///
/// The scheduler rebuilds its timers from `list_enabled` at startup; the
/// rows here are the source of truth, timers are derived state.
#[async_trait]
pub trait SubscriptionStorePort: Send + Sync {
    /// Insert a new subscription.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] when a subscription for
    /// the same channel and source URL exists.
    async fn insert(&self, subscription: &NewSubscription)
    -> Result<Subscription, RepositoryError>;

    /// Apply a partial update and return the updated row.
    async fn update(
        &self,
        id: SubscriptionId,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, RepositoryError>;

    /// Fetch one subscription.
    async fn get(&self, id: SubscriptionId) -> Result<Subscription, RepositoryError>;

    /// Look up a subscription by its channel and source URL.
    async fn find_by_source(
        &self,
        channel_id: ChannelId,
        source_url: &str,
    ) -> Result<Option<Subscription>, RepositoryError>;

    /// All subscriptions, newest first.
    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError>;

    /// All currently enabled subscriptions.
    async fn list_enabled(&self) -> Result<Vec<Subscription>, RepositoryError>;

    /// Flip the enabled flag. Idempotent.
    async fn set_enabled(&self, id: SubscriptionId, enabled: bool) -> Result<(), RepositoryError>;

    /// Record the outcome of a check: last-check timestamp and how many new
    /// items it found. Updated even for failed checks so the next timer tick
    /// does not hot-loop on a struggling source.
    async fn record_check(
        &self,
        id: SubscriptionId,
        at: DateTime<Utc>,
        new_videos: i64,
    ) -> Result<(), RepositoryError>;

    /// Delete a subscription.
    async fn delete(&self, id: SubscriptionId) -> Result<(), RepositoryError>;
}
