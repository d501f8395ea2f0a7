//! SQLite implementation of the `CatalogStorePort` trait.
//!
//! Channel and video identity live here. The unique index on
//! `videos.external_id` is what makes discovery dedup atomic: overlapping
//! discovery runs can both attempt the insert and exactly one succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use vidhoard_core::{
    CatalogStorePort, Channel, ChannelId, ContentType, NewChannel, NewVideo, QualityPreference,
    RepositoryError, StoredFile, Video, VideoFilter, VideoId, VideoStatus,
};

use super::{map_column_error, map_sqlx_error};

const DEFAULT_LIST_LIMIT: u32 = 50;

/// SQLite implementation of the `CatalogStorePort` trait.
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    /// Create a new SQLite catalog store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStorePort for SqliteCatalogStore {
    async fn upsert_channel(&self, channel: &NewChannel) -> Result<Channel, RepositoryError> {
        let now = Utc::now();
        let extra = encode_json(channel.extra_metadata.as_ref())?;

        let row = sqlx::query(
            r#"
            INSERT INTO channels (
                external_id, name, description, subscriber_count,
                thumbnail_path, extra_metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                description = COALESCE(excluded.description, channels.description),
                subscriber_count = COALESCE(excluded.subscriber_count, channels.subscriber_count),
                thumbnail_path = COALESCE(excluded.thumbnail_path, channels.thumbnail_path),
                updated_at = excluded.updated_at
            RETURNING id, external_id, name, description, subscriber_count,
                      thumbnail_path, extra_metadata, created_at, updated_at
            "#,
        )
        .bind(&channel.external_id)
        .bind(&channel.name)
        .bind(&channel.description)
        .bind(channel.subscriber_count)
        .bind(&channel.thumbnail_path)
        .bind(&extra)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "channel"))?;

        row_to_channel(&row)
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Channel, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, external_id, name, description, subscriber_count,
                   thumbnail_path, extra_metadata, created_at, updated_at
            FROM channels WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "channel"))?
        .ok_or_else(|| RepositoryError::NotFound(format!("channel {id}")))?;

        row_to_channel(&row)
    }

    async fn find_video_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Video>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "video"))?;

        row.as_ref().map(row_to_video).transpose()
    }

    async fn insert_video(&self, video: &NewVideo) -> Result<Video, RepositoryError> {
        let now = Utc::now();
        let extra = encode_json(video.extra_metadata.as_ref())?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO videos (
                external_id, channel_id, title, description, duration_secs,
                upload_date, view_count, like_count, content_type, quality,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(&video.external_id)
        .bind(video.channel_id.0)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration_secs)
        .bind(video.upload_date)
        .bind(video.view_count)
        .bind(video.like_count)
        .bind(video.content_type.as_str())
        .bind(video.quality.map(|q| q.as_str()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &format!("video {}", video.external_id)))?;

        row_to_video(&row)
    }

    async fn get_video(&self, id: VideoId) -> Result<Video, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "video"))?
            .ok_or_else(|| RepositoryError::NotFound(format!("video {id}")))?;

        row_to_video(&row)
    }

    async fn update_video_status(
        &self,
        id: VideoId,
        status: VideoStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE videos SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "video"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("video {id}")));
        }

        Ok(())
    }

    async fn set_video_file(
        &self,
        id: VideoId,
        file: Option<&StoredFile>,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE videos SET file_path = ?, file_size = ?, updated_at = ? WHERE id = ?")
                .bind(file.map(|f| f.path.as_str()))
                .bind(file.map(|f| f.size))
                .bind(Utc::now())
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "video"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("video {id}")));
        }

        Ok(())
    }

    async fn list_videos(&self, filter: &VideoFilter) -> Result<Vec<Video>, RepositoryError> {
        let mut sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE 1=1");
        if filter.channel_id.is_some() {
            sql.push_str(" AND channel_id = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

        let limit = if filter.limit == 0 {
            DEFAULT_LIST_LIMIT
        } else {
            filter.limit
        };

        let mut query = sqlx::query(&sql);
        if let Some(channel_id) = filter.channel_id {
            query = query.bind(channel_id.0);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        query = query.bind(i64::from(limit));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "video"))?;

        rows.iter().map(row_to_video).collect()
    }
}

const VIDEO_COLUMNS: &str = "id, external_id, channel_id, title, description, duration_secs, \
     upload_date, view_count, like_count, content_type, quality, file_path, \
     file_size, status, thumbnail_generated, extra_metadata, created_at, updated_at";

fn encode_json(value: Option<&serde_json::Value>) -> Result<Option<String>, RepositoryError> {
    value
        .map(|v| serde_json::to_string(v).map_err(|e| RepositoryError::Serialization(e.to_string())))
        .transpose()
}

fn decode_json(value: Option<String>) -> Option<serde_json::Value> {
    value.and_then(|s| serde_json::from_str(&s).ok())
}

fn row_to_channel(row: &SqliteRow) -> Result<Channel, RepositoryError> {
    Ok(Channel {
        id: ChannelId(row.try_get("id").map_err(map_column_error)?),
        external_id: row.try_get("external_id").map_err(map_column_error)?,
        name: row.try_get("name").map_err(map_column_error)?,
        description: row.try_get("description").map_err(map_column_error)?,
        subscriber_count: row.try_get("subscriber_count").map_err(map_column_error)?,
        thumbnail_path: row.try_get("thumbnail_path").map_err(map_column_error)?,
        extra_metadata: decode_json(row.try_get("extra_metadata").map_err(map_column_error)?),
        created_at: row.try_get("created_at").map_err(map_column_error)?,
        updated_at: row.try_get("updated_at").map_err(map_column_error)?,
    })
}

fn row_to_video(row: &SqliteRow) -> Result<Video, RepositoryError> {
    let content_type: String = row.try_get("content_type").map_err(map_column_error)?;
    let quality: Option<String> = row.try_get("quality").map_err(map_column_error)?;
    let status: String = row.try_get("status").map_err(map_column_error)?;
    let upload_date: Option<DateTime<Utc>> = row.try_get("upload_date").map_err(map_column_error)?;

    Ok(Video {
        id: VideoId(row.try_get("id").map_err(map_column_error)?),
        external_id: row.try_get("external_id").map_err(map_column_error)?,
        channel_id: ChannelId(row.try_get("channel_id").map_err(map_column_error)?),
        title: row.try_get("title").map_err(map_column_error)?,
        description: row.try_get("description").map_err(map_column_error)?,
        duration_secs: row.try_get("duration_secs").map_err(map_column_error)?,
        upload_date,
        view_count: row.try_get("view_count").map_err(map_column_error)?,
        like_count: row.try_get("like_count").map_err(map_column_error)?,
        content_type: ContentType::parse(&content_type),
        quality: quality.as_deref().map(QualityPreference::parse),
        file_path: row.try_get("file_path").map_err(map_column_error)?,
        file_size: row.try_get("file_size").map_err(map_column_error)?,
        status: VideoStatus::parse(&status),
        thumbnail_generated: row
            .try_get::<i64, _>("thumbnail_generated")
            .map_err(map_column_error)?
            != 0,
        extra_metadata: decode_json(row.try_get("extra_metadata").map_err(map_column_error)?),
        created_at: row.try_get("created_at").map_err(map_column_error)?,
        updated_at: row.try_get("updated_at").map_err(map_column_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    async fn store() -> SqliteCatalogStore {
        SqliteCatalogStore::new(setup_test_database().await.unwrap())
    }

    async fn seed_channel(store: &SqliteCatalogStore) -> Channel {
        store
            .upsert_channel(&NewChannel::new("UC123", "Test Channel"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_channel_creates_then_refreshes() {
        let store = store().await;

        let first = seed_channel(&store).await;
        assert_eq!(first.name, "Test Channel");
        assert!(first.description.is_none());

        let second = store
            .upsert_channel(
                &NewChannel::new("UC123", "Renamed")
                    .with_description(Some("about".into()))
                    .with_subscriber_count(Some(42)),
            )
            .await
            .unwrap();

        // Same row, refreshed attributes
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Renamed");
        assert_eq!(second.description.as_deref(), Some("about"));
        assert_eq!(second.subscriber_count, Some(42));
    }

    #[tokio::test]
    async fn test_upsert_does_not_blank_existing_attributes() {
        let store = store().await;
        store
            .upsert_channel(
                &NewChannel::new("UC123", "Name").with_description(Some("original".into())),
            )
            .await
            .unwrap();

        let refreshed = store
            .upsert_channel(&NewChannel::new("UC123", "Name"))
            .await
            .unwrap();
        assert_eq!(refreshed.description.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_insert_video_and_lookup() {
        let store = store().await;
        let channel = seed_channel(&store).await;

        let video = store
            .insert_video(
                &NewVideo::new("vid00000001", channel.id, "First")
                    .with_quality(Some(QualityPreference::P720)),
            )
            .await
            .unwrap();

        assert_eq!(video.status, VideoStatus::Pending);
        assert_eq!(video.quality, Some(QualityPreference::P720));

        let found = store
            .find_video_by_external_id("vid00000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, video.id);

        assert!(
            store
                .find_video_by_external_id("missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_external_id_rejected_without_second_row() {
        let store = store().await;
        let channel = seed_channel(&store).await;

        store
            .insert_video(&NewVideo::new("vid00000001", channel.id, "First"))
            .await
            .unwrap();

        let err = store
            .insert_video(&NewVideo::new("vid00000001", channel.id, "Again"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));

        let videos = store.list_videos(&VideoFilter::default()).await.unwrap();
        assert_eq!(videos.len(), 1);
    }

    #[tokio::test]
    async fn test_status_update_is_idempotent() {
        let store = store().await;
        let channel = seed_channel(&store).await;
        let video = store
            .insert_video(&NewVideo::new("vid00000001", channel.id, "First"))
            .await
            .unwrap();

        store
            .update_video_status(video.id, VideoStatus::Downloading)
            .await
            .unwrap();
        store
            .update_video_status(video.id, VideoStatus::Downloading)
            .await
            .unwrap();

        let updated = store.get_video(video.id).await.unwrap();
        assert_eq!(updated.status, VideoStatus::Downloading);
    }

    #[tokio::test]
    async fn test_file_reference_set_and_cleared() {
        let store = store().await;
        let channel = seed_channel(&store).await;
        let video = store
            .insert_video(&NewVideo::new("vid00000001", channel.id, "First"))
            .await
            .unwrap();

        let file = StoredFile {
            path: "channels/UC123/vid00000001/media.mp4".into(),
            size: 1024,
        };
        store.set_video_file(video.id, Some(&file)).await.unwrap();

        let with_file = store.get_video(video.id).await.unwrap();
        assert_eq!(with_file.file_path.as_deref(), Some(file.path.as_str()));
        assert_eq!(with_file.file_size, Some(1024));

        store.set_video_file(video.id, None).await.unwrap();
        let cleared = store.get_video(video.id).await.unwrap();
        assert!(cleared.file_path.is_none());
        assert!(cleared.file_size.is_none());
    }

    #[tokio::test]
    async fn test_list_videos_filters_by_status() {
        let store = store().await;
        let channel = seed_channel(&store).await;

        let a = store
            .insert_video(&NewVideo::new("vidA", channel.id, "A"))
            .await
            .unwrap();
        store
            .insert_video(&NewVideo::new("vidB", channel.id, "B"))
            .await
            .unwrap();
        store
            .update_video_status(a.id, VideoStatus::Completed)
            .await
            .unwrap();

        let completed = store
            .list_videos(&VideoFilter {
                status: Some(VideoStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a.id);
    }
}
