//! SQLite implementation of the `JobQueuePort` trait.
//!
//! Every state transition is a conditional UPDATE guarded on the current
//! status, and claims are a single UPDATE-of-subselect statement, so the
//! state machine cannot be corrupted by concurrent workers: a lost race
//! shows up as zero affected rows and is reported as `InvalidTransition`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use vidhoard_core::{
    Enqueued, Job, JobFilter, JobId, JobKind, JobPayload, JobStatus, NewJob, QueueCounts,
    QueueError, JobQueuePort,
};

const DEFAULT_LIST_LIMIT: u32 = 50;

/// SQLite implementation of the `JobQueuePort` trait.
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    /// Create a new SQLite job queue.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a job's current status, for diagnosing failed transitions.
    async fn current_status(&self, id: JobId) -> Result<Option<JobStatus>, QueueError> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_storage)?;

        Ok(row.map(|r| {
            let status: String = r.get("status");
            JobStatus::parse(&status)
        }))
    }

    /// Turn a zero-rows-affected transition into the right error.
    async fn transition_error(&self, id: JobId, to: JobStatus) -> QueueError {
        match self.current_status(id).await {
            Ok(Some(from)) => QueueError::InvalidTransition { job: id, from, to },
            Ok(None) => QueueError::NotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobQueuePort for SqliteJobQueue {
    async fn enqueue(&self, job: &NewJob) -> Result<Enqueued, QueueError> {
        let payload_json = serde_json::to_string(&job.payload)
            .map_err(|e| QueueError::Serialization(e.to_string()))?;
        let kind = job.payload.kind();
        let video_id = job.payload.video_id().map(|v| v.0);
        let subscription_id = job.payload.subscription_id().map(|s| s.0);
        let now = Utc::now();

        // Download and discovery enqueues coalesce against an existing
        // queued/active job for the same target. The predicate and the
        // insert run in one transaction so concurrent enqueues cannot both
        // pass the NOT EXISTS check.
        let mut tx = self.pool.begin().await.map_err(map_storage)?;

        let inserted = match kind {
            JobKind::Download => {
                sqlx::query(
                    r#"
                    INSERT INTO jobs (job_type, payload, video_id, subscription_id,
                                      priority, status, created_at)
                    SELECT ?, ?, ?, ?, ?, 'queued', ?
                    WHERE NOT EXISTS (
                        SELECT 1 FROM jobs
                        WHERE job_type = 'download' AND video_id = ?
                          AND status IN ('queued', 'active')
                    )
                    "#,
                )
                .bind(kind.as_str())
                .bind(&payload_json)
                .bind(video_id)
                .bind(subscription_id)
                .bind(job.priority)
                .bind(now)
                .bind(video_id)
                .execute(&mut *tx)
                .await
                .map_err(map_storage)?
            }
            JobKind::Discovery => {
                sqlx::query(
                    r#"
                    INSERT INTO jobs (job_type, payload, video_id, subscription_id,
                                      priority, status, created_at)
                    SELECT ?, ?, ?, ?, ?, 'queued', ?
                    WHERE NOT EXISTS (
                        SELECT 1 FROM jobs
                        WHERE job_type = 'discovery' AND subscription_id = ?
                          AND status IN ('queued', 'active')
                    )
                    "#,
                )
                .bind(kind.as_str())
                .bind(&payload_json)
                .bind(video_id)
                .bind(subscription_id)
                .bind(job.priority)
                .bind(now)
                .bind(subscription_id)
                .execute(&mut *tx)
                .await
                .map_err(map_storage)?
            }
            JobKind::ExtractMetadata => sqlx::query(
                r#"
                INSERT INTO jobs (job_type, payload, video_id, subscription_id,
                                  priority, status, created_at)
                VALUES (?, ?, ?, ?, ?, 'queued', ?)
                "#,
            )
            .bind(kind.as_str())
            .bind(&payload_json)
            .bind(video_id)
            .bind(subscription_id)
            .bind(job.priority)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_storage)?,
        };

        if inserted.rows_affected() > 0 {
            let id = JobId(inserted.last_insert_rowid());
            tx.commit().await.map_err(map_storage)?;
            return Ok(Enqueued {
                id,
                coalesced: false,
            });
        }

        // Coalesced: surface the existing job's id
        let existing = match kind {
            JobKind::Download => {
                sqlx::query(
                    "SELECT id FROM jobs WHERE job_type = 'download' AND video_id = ? \
                     AND status IN ('queued', 'active') LIMIT 1",
                )
                .bind(video_id)
                .fetch_optional(&mut *tx)
                .await
            }
            _ => {
                sqlx::query(
                    "SELECT id FROM jobs WHERE job_type = 'discovery' AND subscription_id = ? \
                     AND status IN ('queued', 'active') LIMIT 1",
                )
                .bind(subscription_id)
                .fetch_optional(&mut *tx)
                .await
            }
        }
        .map_err(map_storage)?;

        tx.commit().await.map_err(map_storage)?;

        let row = existing.ok_or_else(|| {
            QueueError::Storage("coalesced enqueue found no existing job".to_string())
        })?;
        Ok(Enqueued {
            id: JobId(row.get("id")),
            coalesced: true,
        })
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>, QueueError> {
        if kinds.is_empty() {
            return Ok(None);
        }

        let placeholders = kinds.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = 'active', started_at = ?, attempts = attempts + 1
            WHERE status = 'queued' AND id = (
                SELECT id FROM jobs
                WHERE status = 'queued' AND job_type IN ({placeholders})
                ORDER BY priority DESC, created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let mut query = sqlx::query(&sql).bind(Utc::now());
        for kind in kinds {
            query = query.bind(kind.as_str());
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(map_storage)?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn complete(&self, id: JobId, result: serde_json::Value) -> Result<(), QueueError> {
        let result_json =
            serde_json::to_string(&result).map_err(|e| QueueError::Serialization(e.to_string()))?;

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', progress = 100.0, result = ?, completed_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(&result_json)
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Completed).await);
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = ?, completed_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(error_message)
        .bind(Utc::now())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Failed).await);
        }
        Ok(())
    }

    async fn retry(&self, id: JobId) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', error_message = NULL, result = NULL,
                progress = 0, started_at = NULL, completed_at = NULL
            WHERE id = ? AND status = 'failed'
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Queued).await);
        }
        Ok(())
    }

    async fn release(&self, id: JobId) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', started_at = NULL, progress = 0
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Queued).await);
        }
        Ok(())
    }

    async fn pause(&self, id: JobId) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'paused'
            WHERE id = ? AND status = 'active' AND job_type = 'download'
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            // Distinguish "wrong kind" from "wrong state"
            let row = sqlx::query("SELECT job_type, status FROM jobs WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_storage)?;

            return Err(match row {
                None => QueueError::NotFound(id),
                Some(r) => {
                    let job_type: String = r.get("job_type");
                    let status: String = r.get("status");
                    if JobKind::parse(&job_type) != JobKind::Download {
                        QueueError::NotPausable(id)
                    } else {
                        QueueError::InvalidTransition {
                            job: id,
                            from: JobStatus::parse(&status),
                            to: JobStatus::Paused,
                        }
                    }
                }
            });
        }
        Ok(())
    }

    async fn resume(&self, id: JobId) -> Result<(), QueueError> {
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', started_at = NULL, progress = 0
            WHERE id = ? AND status = 'paused'
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Queued).await);
        }
        Ok(())
    }

    async fn update_progress(&self, id: JobId, percent: f64) -> Result<(), QueueError> {
        if !(0.0..=100.0).contains(&percent) || percent.is_nan() {
            return Err(QueueError::InvalidProgress(percent));
        }

        let updated = sqlx::query("UPDATE jobs SET progress = ? WHERE id = ? AND status = 'active'")
            .bind(percent)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_storage)?;

        if updated.rows_affected() == 0 {
            return Err(self.transition_error(id, JobStatus::Active).await);
        }
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Job, QueueError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_storage)?
            .ok_or(QueueError::NotFound(id))?;

        row_to_job(&row)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, QueueError> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.kind.is_some() {
            sql.push_str(" AND job_type = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

        let limit = if filter.limit == 0 {
            DEFAULT_LIST_LIMIT
        } else {
            filter.limit
        };

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        query = query.bind(i64::from(limit));

        let rows = query.fetch_all(&self.pool).await.map_err(map_storage)?;
        rows.iter().map(row_to_job).collect()
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'queued' THEN 1 END), 0) AS queued,
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 END), 0) AS active,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN status = 'paused' THEN 1 END), 0) AS paused
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_storage)?;

        Ok(QueueCounts {
            total: row.get("total"),
            queued: row.get("queued"),
            active: row.get("active"),
            completed: row.get("completed"),
            failed: row.get("failed"),
            paused: row.get("paused"),
        })
    }

    async fn requeue_orphaned(&self) -> Result<u64, QueueError> {
        let updated = sqlx::query(
            "UPDATE jobs SET status = 'queued', started_at = NULL, progress = 0 \
             WHERE status = 'active'",
        )
        .execute(&self.pool)
        .await
        .map_err(map_storage)?;

        let requeued = updated.rows_affected();
        if requeued > 0 {
            tracing::info!(requeued, "re-queued jobs orphaned by a previous run");
        }
        Ok(requeued)
    }
}

const JOB_COLUMNS: &str = "id, job_type, payload, video_id, subscription_id, priority, status, \
     progress, attempts, error_message, result, created_at, started_at, completed_at";

fn map_storage(err: sqlx::Error) -> QueueError {
    QueueError::Storage(err.to_string())
}

fn row_to_job(row: &SqliteRow) -> Result<Job, QueueError> {
    let payload_json: String = row
        .try_get("payload")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let payload: JobPayload = serde_json::from_str(&payload_json)
        .map_err(|e| QueueError::Serialization(e.to_string()))?;

    let status: String = row
        .try_get("status")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let result_json: Option<String> = row
        .try_get("result")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let started_at: Option<DateTime<Utc>> = row
        .try_get("started_at")
        .map_err(|e| QueueError::Storage(e.to_string()))?;
    let completed_at: Option<DateTime<Utc>> = row
        .try_get("completed_at")
        .map_err(|e| QueueError::Storage(e.to_string()))?;

    Ok(Job {
        id: JobId(row.try_get("id").map_err(|e| QueueError::Storage(e.to_string()))?),
        payload,
        priority: row
            .try_get("priority")
            .map_err(|e| QueueError::Storage(e.to_string()))?,
        status: JobStatus::parse(&status),
        progress: row
            .try_get("progress")
            .map_err(|e| QueueError::Storage(e.to_string()))?,
        attempts: row
            .try_get("attempts")
            .map_err(|e| QueueError::Storage(e.to_string()))?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| QueueError::Storage(e.to_string()))?,
        result: result_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at,
        started_at,
        completed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use vidhoard_core::{QualityPreference, SubscriptionId, VideoId};

    async fn queue() -> SqliteJobQueue {
        SqliteJobQueue::new(setup_test_database().await.unwrap())
    }

    fn download(video: i64) -> NewJob {
        NewJob::download(VideoId(video), QualityPreference::P1080)
    }

    const ALL_KINDS: &[JobKind] = &[JobKind::Download, JobKind::Discovery, JobKind::ExtractMetadata];

    #[tokio::test]
    async fn test_enqueue_and_claim() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();
        assert!(!enqueued.coalesced);

        let job = queue.claim_next(ALL_KINDS).await.unwrap().unwrap();
        assert_eq!(job.id, enqueued.id);
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.attempts, 1);
        assert!(job.started_at.is_some());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let queue = queue().await;
        queue.enqueue(&download(1)).await.unwrap();

        assert!(queue.claim_next(ALL_KINDS).await.unwrap().is_some());
        // Job is active now, nothing left to claim
        assert!(queue.claim_next(ALL_KINDS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_respects_capability() {
        let queue = queue().await;
        queue.enqueue(&download(1)).await.unwrap();

        assert!(
            queue
                .claim_next(&[JobKind::Discovery])
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            queue
                .claim_next(&[JobKind::Download])
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_priority_bands_fifo_within() {
        let queue = queue().await;
        // Creation order with priorities [0, 1, 0, 1]
        let a = queue.enqueue(&download(1)).await.unwrap();
        let b = queue.enqueue(&download(2).with_priority(1)).await.unwrap();
        let c = queue.enqueue(&download(3)).await.unwrap();
        let d = queue.enqueue(&download(4).with_priority(1)).await.unwrap();

        let order: Vec<JobId> = [
            queue.claim_next(ALL_KINDS).await.unwrap().unwrap().id,
            queue.claim_next(ALL_KINDS).await.unwrap().unwrap().id,
            queue.claim_next(ALL_KINDS).await.unwrap().unwrap().id,
            queue.claim_next(ALL_KINDS).await.unwrap().unwrap().id,
        ]
        .into();

        // Priority 1 first (FIFO within), then priority 0 (FIFO within)
        assert_eq!(order, vec![b.id, d.id, a.id, c.id]);
    }

    #[tokio::test]
    async fn test_download_enqueue_coalesces_per_video() {
        let queue = queue().await;
        let first = queue.enqueue(&download(7)).await.unwrap();
        let second = queue.enqueue(&download(7).with_priority(5)).await.unwrap();

        assert!(second.coalesced);
        assert_eq!(second.id, first.id);
        assert_eq!(queue.counts().await.unwrap().total, 1);

        // Different video still gets its own job
        let third = queue.enqueue(&download(8)).await.unwrap();
        assert!(!third.coalesced);

        // Active jobs still coalesce
        queue.claim_next(&[JobKind::Download]).await.unwrap();
        let fourth = queue.enqueue(&download(7)).await.unwrap();
        assert!(fourth.coalesced);
        assert_eq!(fourth.id, first.id);
    }

    #[tokio::test]
    async fn test_download_enqueue_after_terminal_creates_new_job() {
        let queue = queue().await;
        let first = queue.enqueue(&download(7)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();
        queue
            .complete(first.id, serde_json::json!({}))
            .await
            .unwrap();

        let second = queue.enqueue(&download(7)).await.unwrap();
        assert!(!second.coalesced);
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_discovery_enqueue_coalesces_per_subscription() {
        let queue = queue().await;
        let first = queue
            .enqueue(&NewJob::discovery(SubscriptionId(3)))
            .await
            .unwrap();
        let second = queue
            .enqueue(&NewJob::discovery(SubscriptionId(3)))
            .await
            .unwrap();
        assert!(second.coalesced);
        assert_eq!(second.id, first.id);

        let other = queue
            .enqueue(&NewJob::discovery(SubscriptionId(4)))
            .await
            .unwrap();
        assert!(!other.coalesced);
    }

    #[tokio::test]
    async fn test_complete_requires_active() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();

        let err = queue
            .complete(enqueued.id, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidTransition {
                from: JobStatus::Queued,
                to: JobStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_terminal_states_are_immutable_except_retry() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();
        queue.fail(enqueued.id, "boom").await.unwrap();

        // fail again / complete are both illegal now
        assert!(queue.fail(enqueued.id, "boom2").await.is_err());
        assert!(
            queue
                .complete(enqueued.id, serde_json::json!({}))
                .await
                .is_err()
        );

        // retry is the one legal exit, and it preserves priority
        queue.retry(enqueued.id).await.unwrap();
        let job = queue.get(enqueued.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.error_message.is_none());
        assert_eq!(job.progress, 0.0);
    }

    #[tokio::test]
    async fn test_retry_requires_failed() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();
        assert!(queue.retry(enqueued.id).await.is_err());
    }

    #[tokio::test]
    async fn test_progress_updates_and_range() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();

        // Not active yet
        assert!(queue.update_progress(enqueued.id, 10.0).await.is_err());

        queue.claim_next(ALL_KINDS).await.unwrap();
        queue.update_progress(enqueued.id, 42.5).await.unwrap();
        assert_eq!(queue.get(enqueued.id).await.unwrap().progress, 42.5);

        assert!(matches!(
            queue.update_progress(enqueued.id, -1.0).await.unwrap_err(),
            QueueError::InvalidProgress(_)
        ));
        assert!(matches!(
            queue.update_progress(enqueued.id, 100.1).await.unwrap_err(),
            QueueError::InvalidProgress(_)
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_path() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();

        queue.pause(enqueued.id).await.unwrap();
        assert_eq!(
            queue.get(enqueued.id).await.unwrap().status,
            JobStatus::Paused
        );

        queue.resume(enqueued.id).await.unwrap();
        assert_eq!(
            queue.get(enqueued.id).await.unwrap().status,
            JobStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_pause_rejects_non_download_jobs() {
        let queue = queue().await;
        let enqueued = queue
            .enqueue(&NewJob::discovery(SubscriptionId(1)))
            .await
            .unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();

        assert!(matches!(
            queue.pause(enqueued.id).await.unwrap_err(),
            QueueError::NotPausable(_)
        ));
    }

    #[tokio::test]
    async fn test_release_returns_to_queued_keeping_attempts() {
        let queue = queue().await;
        let enqueued = queue.enqueue(&download(1)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();
        queue.release(enqueued.id).await.unwrap();

        let job = queue.get(enqueued.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 1);
        assert!(job.started_at.is_none());

        // Claimable again, attempts keep counting
        let reclaimed = queue.claim_next(ALL_KINDS).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, enqueued.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn test_requeue_orphaned() {
        let queue = queue().await;
        queue.enqueue(&download(1)).await.unwrap();
        queue.enqueue(&download(2)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();

        let requeued = queue.requeue_orphaned().await.unwrap();
        assert_eq!(requeued, 2);
        assert_eq!(queue.counts().await.unwrap().queued, 2);
    }

    #[tokio::test]
    async fn test_counts() {
        let queue = queue().await;
        let a = queue.enqueue(&download(1)).await.unwrap();
        queue.enqueue(&download(2)).await.unwrap();
        queue.claim_next(ALL_KINDS).await.unwrap();
        queue.fail(a.id, "boom").await.unwrap();

        let counts = queue.counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.active, 0);
    }

    #[tokio::test]
    async fn test_payload_survives_roundtrip() {
        let queue = queue().await;
        let enqueued = queue
            .enqueue(&NewJob::extract_metadata(
                "https://example.com/watch?v=abc",
                QualityPreference::P720,
                true,
            ))
            .await
            .unwrap();

        let job = queue.get(enqueued.id).await.unwrap();
        match job.payload {
            JobPayload::ExtractMetadata {
                url,
                quality,
                auto_download,
            } => {
                assert_eq!(url, "https://example.com/watch?v=abc");
                assert_eq!(quality, QualityPreference::P720);
                assert!(auto_download);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
