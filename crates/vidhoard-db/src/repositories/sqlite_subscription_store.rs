//! SQLite implementation of the `SubscriptionStorePort` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use vidhoard_core::{
    ChannelId, ContentType, NewSubscription, QualityPreference, RepositoryError, Subscription,
    SubscriptionId, SubscriptionKind, SubscriptionStorePort, SubscriptionUpdate,
};

use super::{map_column_error, map_sqlx_error};

/// SQLite implementation of the `SubscriptionStorePort` trait.
pub struct SqliteSubscriptionStore {
    pool: SqlitePool,
}

impl SqliteSubscriptionStore {
    /// Create a new SQLite subscription store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStorePort for SqliteSubscriptionStore {
    async fn insert(
        &self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, RepositoryError> {
        let subtitle_langs = encode_string_list(&subscription.subtitle_languages)?;
        let content_types = encode_content_types(&subscription.content_types)?;
        let extra = subscription
            .extra_metadata
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                channel_id, kind, source_url, enabled, auto_download, quality,
                subtitle_languages, content_types, check_frequency,
                latest_n_videos, extra_metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription.channel_id.0)
        .bind(subscription.kind.as_str())
        .bind(&subscription.source_url)
        .bind(subscription.enabled)
        .bind(subscription.auto_download)
        .bind(subscription.quality.as_str())
        .bind(&subtitle_langs)
        .bind(&content_types)
        .bind(&subscription.check_frequency)
        .bind(i64::from(subscription.latest_n_videos))
        .bind(&extra)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &format!("subscription for {}", subscription.source_url)))?;

        row_to_subscription(&row)
    }

    async fn update(
        &self,
        id: SubscriptionId,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, RepositoryError> {
        // Read-merge-write; concurrent updates to subscriptions are a
        // user-driven rarity, not a worker path
        let current = self.get(id).await?;

        let enabled = update.enabled.unwrap_or(current.enabled);
        let auto_download = update.auto_download.unwrap_or(current.auto_download);
        let quality = update.quality.unwrap_or(current.quality);
        let subtitle_languages = update
            .subtitle_languages
            .clone()
            .unwrap_or(current.subtitle_languages);
        let content_types = update.content_types.clone().unwrap_or(current.content_types);
        let check_frequency = update
            .check_frequency
            .clone()
            .unwrap_or(current.check_frequency);
        let latest_n = update.latest_n_videos.unwrap_or(current.latest_n_videos);
        let extra = update
            .extra_metadata
            .clone()
            .or(current.extra_metadata)
            .map(|v| serde_json::to_string(&v))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET enabled = ?, auto_download = ?, quality = ?,
                subtitle_languages = ?, content_types = ?, check_frequency = ?,
                latest_n_videos = ?, extra_metadata = ?
            WHERE id = ?
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(enabled)
        .bind(auto_download)
        .bind(quality.as_str())
        .bind(encode_string_list(&subtitle_languages)?)
        .bind(encode_content_types(&content_types)?)
        .bind(&check_frequency)
        .bind(i64::from(latest_n))
        .bind(&extra)
        .bind(id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "subscription"))?;

        row_to_subscription(&row)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Subscription, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "subscription"))?
        .ok_or_else(|| RepositoryError::NotFound(format!("subscription {id}")))?;

        row_to_subscription(&row)
    }

    async fn find_by_source(
        &self,
        channel_id: ChannelId,
        source_url: &str,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE channel_id = ? AND source_url = ?"
        ))
        .bind(channel_id.0)
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "subscription"))?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "subscription"))?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn list_enabled(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE enabled = 1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "subscription"))?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn set_enabled(&self, id: SubscriptionId, enabled: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE subscriptions SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "subscription"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("subscription {id}")));
        }
        Ok(())
    }

    async fn record_check(
        &self,
        id: SubscriptionId,
        at: DateTime<Utc>,
        new_videos: i64,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE subscriptions SET last_check = ?, new_videos_count = ? WHERE id = ?")
                .bind(at)
                .bind(new_videos)
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "subscription"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("subscription {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: SubscriptionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "subscription"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("subscription {id}")));
        }
        Ok(())
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, channel_id, kind, source_url, enabled, auto_download, quality, \
     subtitle_languages, content_types, check_frequency, latest_n_videos, \
     last_check, new_videos_count, extra_metadata, created_at";

fn encode_string_list(list: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(list).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn encode_content_types(types: &[ContentType]) -> Result<String, RepositoryError> {
    let strings: Vec<&str> = types.iter().map(ContentType::as_str).collect();
    serde_json::to_string(&strings).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn row_to_subscription(row: &SqliteRow) -> Result<Subscription, RepositoryError> {
    let kind: String = row.try_get("kind").map_err(map_column_error)?;
    let quality: String = row.try_get("quality").map_err(map_column_error)?;
    let subtitle_json: String = row.try_get("subtitle_languages").map_err(map_column_error)?;
    let content_types_json: String = row.try_get("content_types").map_err(map_column_error)?;
    let last_check: Option<DateTime<Utc>> = row.try_get("last_check").map_err(map_column_error)?;
    let extra_json: Option<String> = row.try_get("extra_metadata").map_err(map_column_error)?;
    let latest_n: i64 = row.try_get("latest_n_videos").map_err(map_column_error)?;

    let subtitle_languages: Vec<String> = serde_json::from_str(&subtitle_json).unwrap_or_default();
    let content_types: Vec<ContentType> = serde_json::from_str::<Vec<String>>(&content_types_json)
        .unwrap_or_default()
        .iter()
        .map(|s| ContentType::parse(s))
        .collect();

    Ok(Subscription {
        id: SubscriptionId(row.try_get("id").map_err(map_column_error)?),
        channel_id: ChannelId(row.try_get("channel_id").map_err(map_column_error)?),
        kind: SubscriptionKind::parse(&kind),
        source_url: row.try_get("source_url").map_err(map_column_error)?,
        enabled: row.try_get("enabled").map_err(map_column_error)?,
        auto_download: row.try_get("auto_download").map_err(map_column_error)?,
        quality: QualityPreference::parse(&quality),
        subtitle_languages,
        content_types,
        check_frequency: row.try_get("check_frequency").map_err(map_column_error)?,
        latest_n_videos: u32::try_from(latest_n).unwrap_or(20),
        last_check,
        new_videos_count: row.try_get("new_videos_count").map_err(map_column_error)?,
        extra_metadata: extra_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.try_get("created_at").map_err(map_column_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::SqliteCatalogStore;
    use crate::setup::setup_test_database;
    use vidhoard_core::{CatalogStorePort, NewChannel};

    async fn stores() -> (SqliteSubscriptionStore, ChannelId) {
        let pool = setup_test_database().await.unwrap();
        let catalog = SqliteCatalogStore::new(pool.clone());
        let channel = catalog
            .upsert_channel(&NewChannel::new("UC123", "Channel"))
            .await
            .unwrap();
        (SqliteSubscriptionStore::new(pool), channel.id)
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let (store, channel_id) = stores().await;

        let sub = store
            .insert(
                &NewSubscription::new(channel_id, SubscriptionKind::Channel, "https://c/1")
                    .with_content_types(vec![ContentType::Video])
                    .with_check_frequency("*/30 * * * *"),
            )
            .await
            .unwrap();

        let fetched = store.get(sub.id).await.unwrap();
        assert_eq!(fetched.source_url, "https://c/1");
        assert_eq!(fetched.content_types, vec![ContentType::Video]);
        assert_eq!(fetched.check_frequency, "*/30 * * * *");
        assert!(fetched.enabled);
        assert!(fetched.last_check.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_source_rejected() {
        let (store, channel_id) = stores().await;
        let sub = NewSubscription::new(channel_id, SubscriptionKind::Channel, "https://c/1");

        store.insert(&sub).await.unwrap();
        let err = store.insert(&sub).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_partial_update_preserves_other_fields() {
        let (store, channel_id) = stores().await;
        let sub = store
            .insert(
                &NewSubscription::new(channel_id, SubscriptionKind::Channel, "https://c/1")
                    .with_quality(QualityPreference::P480),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                sub.id,
                &SubscriptionUpdate {
                    check_frequency: Some("0 */6 * * *".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.check_frequency, "0 */6 * * *");
        assert_eq!(updated.quality, QualityPreference::P480);
        assert!(updated.auto_download);
    }

    #[tokio::test]
    async fn test_enabled_filtering_and_toggle() {
        let (store, channel_id) = stores().await;
        let a = store
            .insert(&NewSubscription::new(
                channel_id,
                SubscriptionKind::Channel,
                "https://c/1",
            ))
            .await
            .unwrap();
        store
            .insert(&NewSubscription::new(
                channel_id,
                SubscriptionKind::Playlist,
                "https://c/2",
            ))
            .await
            .unwrap();

        store.set_enabled(a.id, false).await.unwrap();

        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].source_url, "https://c/2");
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_record_check() {
        let (store, channel_id) = stores().await;
        let sub = store
            .insert(&NewSubscription::new(
                channel_id,
                SubscriptionKind::Channel,
                "https://c/1",
            ))
            .await
            .unwrap();

        let at = Utc::now();
        store.record_check(sub.id, at, 4).await.unwrap();

        let fetched = store.get(sub.id).await.unwrap();
        assert_eq!(fetched.new_videos_count, 4);
        assert!(fetched.last_check.is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, channel_id) = stores().await;
        let sub = store
            .insert(&NewSubscription::new(
                channel_id,
                SubscriptionKind::Channel,
                "https://c/1",
            ))
            .await
            .unwrap();

        store.delete(sub.id).await.unwrap();
        assert!(matches!(
            store.get(sub.id).await.unwrap_err(),
            RepositoryError::NotFound(_)
        ));
    }
}
