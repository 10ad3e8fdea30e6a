pub mod progress;
pub mod reschedule;

use std::{fs, path::Path, path::PathBuf};

use sqlx::{SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions};
use thiserror::Error;

pub use progress::{ProgressRecord, ProgressStore};
pub use reschedule::RescheduleStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StateError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored progress tree is unreadable: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] time::error::ComponentRange),
    #[error("reschedule delay {0:?} is out of range")]
    DelayOutOfRange(std::time::Duration),
}

/// SQLite database holding the progress tree and the pending reschedule of
/// every job.
#[derive(Clone)]
pub struct StateDb {
    pool: SqlitePool,
}

impl StateDb {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, StateError> {
        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn open(path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    pub async fn new_default() -> Result<Self, StateError> {
        Self::open(&default_db_path()?).await
    }

    pub async fn init(&self) -> Result<(), StateError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn progress(&self) -> ProgressStore {
        ProgressStore::from_pool(self.pool.clone())
    }

    pub fn reschedule(&self) -> RescheduleStore {
        RescheduleStore::from_pool(self.pool.clone())
    }
}

pub fn default_db_path() -> Result<PathBuf, StateError> {
    let mut path = dirs::data_dir().ok_or(StateError::MissingDataDir)?;
    path.push("diskclone");
    path.push("state.db");
    Ok(path)
}

#[cfg(test)]
pub(crate) async fn memory_db() -> StateDb {
    // A single connection keeps every query on the same in-memory database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = StateDb::from_pool(pool);
    db.init().await.unwrap();
    db
}
