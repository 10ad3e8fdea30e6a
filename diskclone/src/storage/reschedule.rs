use std::time::Duration;

use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;

use super::StateError;

/// At most one pending continuation per job.
pub struct RescheduleStore {
    pool: SqlitePool,
}

impl RescheduleStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers the next execution `delay` from now, replacing any earlier
    /// registration for the job.
    pub async fn schedule_after(
        &self,
        job: &str,
        delay: Duration,
    ) -> Result<OffsetDateTime, StateError> {
        let run_at = time::Duration::try_from(delay)
            .ok()
            .and_then(|delay| OffsetDateTime::now_utc().checked_add(delay))
            .ok_or(StateError::DelayOutOfRange(delay))?;
        sqlx::query(
            "INSERT INTO reschedule (job, run_at) VALUES (?1, ?2)
             ON CONFLICT(job) DO UPDATE SET run_at = excluded.run_at",
        )
        .bind(job)
        .bind(run_at.unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(run_at)
    }

    pub async fn pending(&self, job: &str) -> Result<Option<OffsetDateTime>, StateError> {
        let row = sqlx::query("SELECT run_at FROM reschedule WHERE job = ?1")
            .bind(job)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let run_at: i64 = row.try_get("run_at")?;
                Ok(Some(OffsetDateTime::from_unix_timestamp(run_at)?))
            }
            None => Ok(None),
        }
    }

    pub async fn clear(&self, job: &str) -> Result<(), StateError> {
        sqlx::query("DELETE FROM reschedule WHERE job = ?1")
            .bind(job)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
