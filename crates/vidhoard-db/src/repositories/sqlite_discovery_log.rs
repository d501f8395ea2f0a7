//! SQLite implementation of the `DiscoveryLogPort` trait.
//!
//! Append-only: rows are inserted once and never updated.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use vidhoard_core::{
    DiscoveryEvent, DiscoveryLogPort, DiscoveryOutcome, NewDiscoveryEvent, RepositoryError,
    SubscriptionId,
};

use super::{map_column_error, map_sqlx_error};

/// SQLite implementation of the `DiscoveryLogPort` trait.
pub struct SqliteDiscoveryLog {
    pool: SqlitePool,
}

impl SqliteDiscoveryLog {
    /// Create a new SQLite discovery log.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscoveryLogPort for SqliteDiscoveryLog {
    async fn append(&self, event: &NewDiscoveryEvent) -> Result<DiscoveryEvent, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO discovery_events (
                subscription_id, outcome, videos_found, videos_added,
                videos_queued, videos_filtered, duration_ms, error, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, subscription_id, outcome, videos_found, videos_added,
                      videos_queued, videos_filtered, duration_ms, error, created_at
            "#,
        )
        .bind(event.subscription_id.0)
        .bind(event.outcome.as_str())
        .bind(event.videos_found)
        .bind(event.videos_added)
        .bind(event.videos_queued)
        .bind(event.videos_filtered)
        .bind(event.duration_ms)
        .bind(&event.error)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "discovery event"))?;

        row_to_event(&row)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<DiscoveryEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, subscription_id, outcome, videos_found, videos_added,
                   videos_queued, videos_filtered, duration_ms, error, created_at
            FROM discovery_events
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "discovery event"))?;

        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &SqliteRow) -> Result<DiscoveryEvent, RepositoryError> {
    let outcome: String = row.try_get("outcome").map_err(map_column_error)?;

    Ok(DiscoveryEvent {
        id: row.try_get("id").map_err(map_column_error)?,
        subscription_id: SubscriptionId(row.try_get("subscription_id").map_err(map_column_error)?),
        outcome: DiscoveryOutcome::parse(&outcome),
        videos_found: row.try_get("videos_found").map_err(map_column_error)?,
        videos_added: row.try_get("videos_added").map_err(map_column_error)?,
        videos_queued: row.try_get("videos_queued").map_err(map_column_error)?,
        videos_filtered: row.try_get("videos_filtered").map_err(map_column_error)?,
        duration_ms: row.try_get("duration_ms").map_err(map_column_error)?,
        error: row.try_get("error").map_err(map_column_error)?,
        created_at: row.try_get("created_at").map_err(map_column_error)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn test_append_and_recent() {
        let log = SqliteDiscoveryLog::new(setup_test_database().await.unwrap());

        let first = log
            .append(&NewDiscoveryEvent {
                subscription_id: SubscriptionId(1),
                outcome: DiscoveryOutcome::Success,
                videos_found: 5,
                videos_added: 2,
                videos_queued: 2,
                videos_filtered: 1,
                duration_ms: 340,
                error: None,
            })
            .await
            .unwrap();
        assert_eq!(first.outcome, DiscoveryOutcome::Success);
        assert_eq!(first.videos_added, 2);

        log.append(&NewDiscoveryEvent::failed(
            SubscriptionId(1),
            50,
            "unreachable",
        ))
        .await
        .unwrap();

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].outcome, DiscoveryOutcome::Failed);
        assert_eq!(recent[0].error.as_deref(), Some("unreachable"));
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let log = SqliteDiscoveryLog::new(setup_test_database().await.unwrap());
        for _ in 0..5 {
            log.append(&NewDiscoveryEvent::failed(SubscriptionId(1), 1, "x"))
                .await
                .unwrap();
        }
        assert_eq!(log.recent(3).await.unwrap().len(), 3);
    }
}
