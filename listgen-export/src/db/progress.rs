//! Progress record persistence
//!
//! Rows live in `export_jobs` of the service database. WAL mode lets the job's
//! writer and any number of pollers proceed without blocking each other.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use listgen_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{JobState, ProgressState};
use crate::services::progress_reporter::ProgressStore;
use crate::utils::retry_on_lock;

/// Status written onto jobs found running at startup
pub const ABANDONED_STATUS: &str = "Interrupted by service restart";

const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// [`ProgressStore`] over the service SQLite database
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn init(&self, job_id: Uuid) -> Result<()> {
        let initial = ProgressState::initial(job_id);
        let job_id = job_id.to_string();
        let now = timestamp(initial.updated_at);

        retry_on_lock("progress init", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO export_jobs (job_id, state, current, total, status, created_at, updated_at)
                VALUES (?, ?, 0, 0, ?, ?, ?)
                ON CONFLICT(job_id) DO UPDATE SET
                    state = excluded.state,
                    current = 0,
                    total = 0,
                    status = excluded.status,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&job_id)
            .bind(initial.state.as_str())
            .bind(&initial.status)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn update(&self, job_id: Uuid, current: u64, total: u64, status: &str) -> Result<()> {
        let job_id = job_id.to_string();
        let now = timestamp(Utc::now());
        let current = current as i64;
        let total = total as i64;

        retry_on_lock("progress update", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                UPDATE export_jobs
                SET current = MAX(current, ?), total = ?, status = ?, updated_at = ?
                WHERE job_id = ? AND state = 'RUNNING'
                "#,
            )
            .bind(current)
            .bind(total)
            .bind(status)
            .bind(&now)
            .bind(&job_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn finish(&self, job_id: Uuid, state: JobState, status: &str) -> Result<()> {
        if !state.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "{} is not a terminal job state",
                state.as_str()
            )));
        }

        let job_id = job_id.to_string();
        let now = timestamp(Utc::now());

        // A completed job reads as fully done to pollers
        retry_on_lock("progress finish", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                UPDATE export_jobs
                SET state = ?,
                    status = ?,
                    current = CASE WHEN ? = 'COMPLETED' THEN MAX(current, total) ELSE current END,
                    updated_at = ?
                WHERE job_id = ?
                "#,
            )
            .bind(state.as_str())
            .bind(status)
            .bind(state.as_str())
            .bind(&now)
            .bind(&job_id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn read(&self, job_id: Uuid) -> Result<Option<ProgressState>> {
        let row = sqlx::query(
            r#"
            SELECT state, current, total, status, updated_at
            FROM export_jobs
            WHERE job_id = ?
            "#,
        )
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state: String = row.get("state");
        let state = JobState::parse(&state)
            .ok_or_else(|| Error::Internal(format!("Unknown job state in database: {}", state)))?;

        let updated_at: String = row.get("updated_at");
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Some(ProgressState {
            job_id,
            current: row.get::<i64, _>("current").max(0) as u64,
            total: row.get::<i64, _>("total").max(0) as u64,
            status: row.get("status"),
            state,
            updated_at,
        }))
    }

    async fn expire(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let cutoff = timestamp(older_than);

        let removed = retry_on_lock("progress expire", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                "DELETE FROM export_jobs WHERE state != 'RUNNING' AND updated_at < ?",
            )
            .bind(&cutoff)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if removed > 0 {
            tracing::debug!(removed, "Expired finished progress records");
        }
        Ok(removed)
    }

    async fn abandon_running(&self) -> Result<u64> {
        let now = timestamp(Utc::now());

        retry_on_lock("progress abandon", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                "UPDATE export_jobs SET state = 'FAILED', status = ?, updated_at = ? WHERE state = 'RUNNING'",
            )
            .bind(ABANDONED_STATUS)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_store() -> SqliteProgressStore {
        let pool = listgen_common::db::open_in_memory().await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        SqliteProgressStore::new(pool)
    }

    #[tokio::test]
    async fn test_init_and_read() {
        let store = setup_store().await;
        let job_id = Uuid::new_v4();

        store.init(job_id).await.unwrap();
        let state = store.read(job_id).await.unwrap().unwrap();

        assert_eq!(state.current, 0);
        assert_eq!(state.total, 0);
        assert_eq!(state.status, "Initializing...");
        assert_eq!(state.state, JobState::Running);
    }

    #[tokio::test]
    async fn test_read_unknown_job() {
        let store = setup_store().await;
        assert!(store.read(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_never_decreases() {
        let store = setup_store().await;
        let job_id = Uuid::new_v4();
        store.init(job_id).await.unwrap();

        store.update(job_id, 7, 10, "Formatting").await.unwrap();
        store.update(job_id, 3, 10, "Late update").await.unwrap();

        let state = store.read(job_id).await.unwrap().unwrap();
        assert_eq!(state.current, 7);
        assert_eq!(state.status, "Late update");
    }

    #[tokio::test]
    async fn test_finish_completed_marks_done() {
        let store = setup_store().await;
        let job_id = Uuid::new_v4();
        store.init(job_id).await.unwrap();
        store.update(job_id, 4, 10, "Formatting").await.unwrap();

        store.finish(job_id, JobState::Completed, "Done").await.unwrap();

        let state = store.read(job_id).await.unwrap().unwrap();
        assert_eq!(state.current, 10);
        assert!(state.is_done());

        // Updates after completion are ignored
        store.update(job_id, 11, 20, "stray").await.unwrap();
        let state = store.read(job_id).await.unwrap().unwrap();
        assert_eq!(state.total, 10);
    }

    #[tokio::test]
    async fn test_reporter_counters_survive_finish() {
        use crate::services::ProgressReporter;
        use std::sync::Arc;

        let store: Arc<dyn ProgressStore> = Arc::new(setup_store().await);

        let completed = Uuid::new_v4();
        let (reporter, forwarder) = ProgressReporter::start(store.clone(), completed).await;
        reporter.set_total(3, "Found 3 items");
        for i in 0..3 {
            reporter.tick(format!("row {}", i));
        }
        reporter.finish(JobState::Completed, "Completed: SM03052024.zip");
        forwarder.join().await;

        let state = store.read(completed).await.unwrap().unwrap();
        assert_eq!((state.current, state.total), (3, 3));
        assert_eq!(state.state, JobState::Completed);
        assert_eq!(state.status, "Completed: SM03052024.zip");

        let failed = Uuid::new_v4();
        let (reporter, forwarder) = ProgressReporter::start(store.clone(), failed).await;
        reporter.set_total(3, "Found 3 items");
        reporter.tick("row 0");
        reporter.tick("row 1");
        reporter.finish(JobState::Failed, "No sheets produced");
        forwarder.join().await;

        let state = store.read(failed).await.unwrap().unwrap();
        assert_eq!((state.current, state.total), (2, 3));
        assert_eq!(state.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_finish_rejects_running_state() {
        let store = setup_store().await;
        let result = store.finish(Uuid::new_v4(), JobState::Running, "x").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_expire_only_removes_finished_records() {
        let store = setup_store().await;
        let running = Uuid::new_v4();
        let finished = Uuid::new_v4();
        store.init(running).await.unwrap();
        store.init(finished).await.unwrap();
        store.finish(finished, JobState::Failed, "boom").await.unwrap();

        let removed = store.expire(Utc::now() + Duration::seconds(1)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.read(running).await.unwrap().is_some());
        assert!(store.read(finished).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandon_running() {
        let store = setup_store().await;
        let job_id = Uuid::new_v4();
        store.init(job_id).await.unwrap();

        assert_eq!(store.abandon_running().await.unwrap(), 1);

        let state = store.read(job_id).await.unwrap().unwrap();
        assert_eq!(state.state, JobState::Failed);
        assert_eq!(state.status, ABANDONED_STATUS);
    }
}
