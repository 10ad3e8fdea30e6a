use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use diskclone_core::YadiskClient;
use time::OffsetDateTime;
use tracing::{Instrument, info, info_span};

use crate::copy::backoff::{Backoff, RetryPolicy};
use crate::copy::deadline::Deadline;
use crate::copy::driver::{JobSpec, ResumeDriver, RunOutcome};
use crate::logging::LogFormat;
use crate::remote::YadiskStorage;
use crate::storage::{ProgressRecord, StateDb, default_db_path};

const DEFAULT_DEST_PARENT: &str = "disk:/";
const DEFAULT_JOB_NAME: &str = "diskclone";
const DEFAULT_BUDGET_SECS: u64 = 270;
const DEFAULT_RESCHEDULE_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u64 = 5;
const DEFAULT_MAX_BACKOFF_MS: u64 = 32_000;

#[derive(Clone, Debug)]
pub struct JobConfig {
    pub job_name: String,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub source: Option<String>,
    pub dest_parent: String,
    pub dest_name: Option<String>,
    pub convert: bool,
    pub budget: Duration,
    pub reschedule_after: Duration,
    pub retry: RetryPolicy,
    pub state_db: PathBuf,
    pub log_format: LogFormat,
}

impl JobConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let state_db = match std::env::var("DISKCLONE_STATE_DB") {
            Ok(value) => {
                let home = dirs::home_dir().context("home directory is unavailable")?;
                expand_with_home(&value, &home)
            }
            Err(_) => default_db_path().context("cannot locate the state database")?,
        };
        let log_format = std::env::var("DISKCLONE_LOG_FORMAT")
            .ok()
            .map(|value| value.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            job_name: read_string_env("DISKCLONE_JOB_NAME")
                .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
            token: read_string_env("YADISK_TOKEN"),
            api_url: read_string_env("YADISK_API_URL"),
            source: read_string_env("DISKCLONE_SOURCE"),
            dest_parent: read_string_env("DISKCLONE_DEST_PARENT")
                .unwrap_or_else(|| DEFAULT_DEST_PARENT.to_string()),
            dest_name: read_string_env("DISKCLONE_DEST_NAME"),
            convert: read_bool_env("DISKCLONE_CONVERT", false),
            budget: Duration::from_secs(read_u64_env(
                "DISKCLONE_BUDGET_SECS",
                DEFAULT_BUDGET_SECS,
            )),
            reschedule_after: Duration::from_secs(read_u64_env(
                "DISKCLONE_RESCHEDULE_SECS",
                DEFAULT_RESCHEDULE_SECS,
            )),
            retry: retry_policy(
                read_count_env("DISKCLONE_MAX_RETRIES", DEFAULT_MAX_RETRIES),
                read_u64_env("DISKCLONE_MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS),
            ),
            state_db,
            log_format,
        })
    }

    pub fn job_spec(&self) -> anyhow::Result<JobSpec> {
        let source = self
            .source
            .clone()
            .context("DISKCLONE_SOURCE is not set")?;
        Ok(JobSpec {
            job_name: self.job_name.clone(),
            source_id: source,
            dest_parent_id: self.dest_parent.clone(),
            dest_name: self.dest_name.clone(),
            convert: self.convert,
            reschedule_after: self.reschedule_after,
        })
    }
}

/// Persisted state of one job as shown by `--status`.
#[derive(Debug)]
pub struct JobStatus {
    pub job_name: String,
    pub progress: Option<ProgressRecord>,
    pub pending: Option<OffsetDateTime>,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.progress {
            None => write!(f, "{}: no copy in progress", self.job_name)?,
            Some(record) => {
                let tree = &record.tree;
                write!(
                    f,
                    "{}: {} -> {} ({}; structure {}, content {}; saved {})",
                    self.job_name,
                    tree.source_id,
                    tree.dest_id.as_deref().unwrap_or("<not created>"),
                    tree.stats(),
                    done_label(tree.structure_done),
                    done_label(tree.content_done),
                    record.updated_at
                )?;
            }
        }
        if let Some(run_at) = self.pending {
            write!(f, "; next run at {run_at}")?;
        }
        Ok(())
    }
}

pub struct JobRuntime {
    config: JobConfig,
    db: StateDb,
}

impl JobRuntime {
    pub async fn bootstrap(config: JobConfig) -> anyhow::Result<Self> {
        let db = StateDb::open(&config.state_db)
            .await
            .with_context(|| format!("failed to open state database at {:?}", config.state_db))?;
        Ok(Self { config, db })
    }

    /// One time-budgeted execution.
    pub async fn run_once(&self) -> anyhow::Result<RunOutcome> {
        let spec = self.config.job_spec()?;
        let storage = self.storage()?;
        let progress = self.db.progress();
        let reschedule = self.db.reschedule();
        let driver = ResumeDriver::new(
            &storage,
            &storage,
            &progress,
            &reschedule,
            &self.config.retry,
            &spec,
        );
        let deadline = Deadline::after(self.config.budget);
        let span = info_span!("job", name = %spec.job_name);
        let outcome = driver
            .run(&deadline)
            .instrument(span)
            .await
            .with_context(|| format!("copy job {} failed", spec.job_name))?;
        Ok(outcome)
    }

    /// Runs executions back to back, sleeping until each registered
    /// reschedule time, until the copy completes or fails.
    pub async fn supervise(&self) -> anyhow::Result<RunOutcome> {
        loop {
            match self.run_once().await? {
                RunOutcome::Rescheduled { run_at, .. } => {
                    let wait = delay_until(run_at, OffsetDateTime::now_utc());
                    info!(wait_secs = wait.as_secs(), "waiting for next execution");
                    tokio::time::sleep(wait).await;
                }
                completed @ RunOutcome::Completed(_) => return Ok(completed),
            }
        }
    }

    pub async fn status(&self) -> anyhow::Result<JobStatus> {
        let job = self.config.job_name.as_str();
        Ok(JobStatus {
            job_name: job.to_string(),
            progress: self.db.progress().load(job).await?,
            pending: self.db.reschedule().pending(job).await?,
        })
    }

    /// Forgets the job. The destination folder is left in place, so the
    /// next run will refuse to start until it is removed or renamed.
    pub async fn reset(&self) -> anyhow::Result<bool> {
        let job = self.config.job_name.as_str();
        let removed = self.db.progress().clear(job).await?;
        self.db.reschedule().clear(job).await?;
        Ok(removed)
    }

    fn storage(&self) -> anyhow::Result<YadiskStorage> {
        let token = self
            .config
            .token
            .as_deref()
            .context("YADISK_TOKEN is not set")?;
        let client = build_client(self.config.api_url.as_deref(), token)
            .context("failed to build Yandex Disk client")?;
        Ok(YadiskStorage::new(client))
    }
}

include!("job_helpers.rs");

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
