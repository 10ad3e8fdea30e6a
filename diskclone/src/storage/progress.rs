use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;

use super::StateError;
use crate::copy::tree::FolderNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub tree: FolderNode,
    pub updated_at: OffsetDateTime,
}

/// Durable progress tree per job name. Absence means "start fresh".
pub struct ProgressStore {
    pool: SqlitePool,
}

impl ProgressStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load(&self, job: &str) -> Result<Option<ProgressRecord>, StateError> {
        let row = sqlx::query("SELECT tree, updated_at FROM progress WHERE job = ?1")
            .bind(job)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let tree: String = row.try_get("tree")?;
        let updated_at: i64 = row.try_get("updated_at")?;
        Ok(Some(ProgressRecord {
            tree: serde_json::from_str(&tree)?,
            updated_at: OffsetDateTime::from_unix_timestamp(updated_at)?,
        }))
    }

    /// Replaces the stored tree in one statement so a crash leaves either
    /// the old or the new tree.
    pub async fn save(&self, job: &str, tree: &FolderNode) -> Result<(), StateError> {
        let encoded = serde_json::to_string(tree)?;
        sqlx::query(
            "INSERT INTO progress (job, tree, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(job) DO UPDATE SET tree = excluded.tree, updated_at = excluded.updated_at",
        )
        .bind(job)
        .bind(encoded)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear(&self, job: &str) -> Result<bool, StateError> {
        let result = sqlx::query("DELETE FROM progress WHERE job = ?1")
            .bind(job)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
