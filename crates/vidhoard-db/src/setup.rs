//! Database setup and initialization.
//!
//! This module provides [`setup_database`] for initializing the SQLite
//! database with the full schema. Entry points call this with the resolved
//! database path.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::Path;

/// Sets up the SQLite database connection and ensures the schema exists.
///
/// Creates the database file (and its parent directory) if missing, then
/// creates all tables and indexes. Safe to call on an existing database.
///
/// # Errors
///
/// Returns an error if the database file cannot be opened or created, or if
/// schema creation fails.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Sets up an in-memory SQLite database for testing.
///
/// Uses a single pooled connection so every query sees the same in-memory
/// database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// Safe to call multiple times as all operations use IF NOT EXISTS.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Channels: identity is the platform's channel id; never hard-deleted
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id INTEGER PRIMARY KEY,
            external_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            subscriber_count INTEGER,
            thumbnail_path TEXT,
            extra_metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_external_id ON channels(external_id)",
    )
    .execute(pool)
    .await?;

    // Videos: the unique index on external_id is what makes discovery dedup
    // atomic under concurrent runs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id INTEGER PRIMARY KEY,
            external_id TEXT NOT NULL,
            channel_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            duration_secs INTEGER,
            upload_date TEXT,
            view_count INTEGER,
            like_count INTEGER,
            content_type TEXT NOT NULL DEFAULT 'video',
            quality TEXT,
            file_path TEXT,
            file_size INTEGER,
            status TEXT NOT NULL DEFAULT 'pending',
            thumbnail_generated INTEGER NOT NULL DEFAULT 0,
            extra_metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (channel_id) REFERENCES channels(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_videos_external_id ON videos(external_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status)")
        .execute(pool)
        .await?;

    // Subscriptions
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY,
            channel_id INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('channel', 'playlist')),
            source_url TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            auto_download INTEGER NOT NULL DEFAULT 1,
            quality TEXT NOT NULL DEFAULT '1080p',
            subtitle_languages TEXT NOT NULL DEFAULT '[]',
            content_types TEXT NOT NULL DEFAULT '["video","short","live"]',
            check_frequency TEXT NOT NULL,
            latest_n_videos INTEGER NOT NULL DEFAULT 20,
            last_check TEXT,
            new_videos_count INTEGER NOT NULL DEFAULT 0,
            extra_metadata TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (channel_id) REFERENCES channels(id),
            UNIQUE (channel_id, source_url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Jobs: envelope columns plus the serialized payload variant; video_id
    // and subscription_id are denormalized for the coalescing predicates
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY,
            job_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            video_id INTEGER,
            subscription_id INTEGER,
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'queued',
            progress REAL NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            result TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            FOREIGN KEY (video_id) REFERENCES videos(id),
            FOREIGN KEY (subscription_id) REFERENCES subscriptions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(status, priority DESC, created_at ASC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_video ON jobs(video_id)")
        .execute(pool)
        .await?;

    // Discovery events: append-only audit log
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discovery_events (
            id INTEGER PRIMARY KEY,
            subscription_id INTEGER NOT NULL,
            outcome TEXT NOT NULL,
            videos_found INTEGER NOT NULL DEFAULT 0,
            videos_added INTEGER NOT NULL DEFAULT 0,
            videos_queued INTEGER NOT NULL DEFAULT 0,
            videos_filtered INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (subscription_id) REFERENCES subscriptions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discovery_events_sub ON discovery_events(subscription_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_test_database() {
        let pool = setup_test_database().await.unwrap();

        // Verify tables exist by querying them
        for table in [
            "channels",
            "videos",
            "subscriptions",
            "jobs",
            "discovery_events",
        ] {
            let _: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = setup_test_database().await.unwrap();
        create_schema(&pool).await.unwrap();
    }
}
