use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};

use super::backoff::{RetryPolicy, retry};
use super::deadline::Deadline;
use super::explorer::explore;
use super::tree::{FolderNode, TreeStats};
use super::{CopyError, Outcome, Replicator};
use crate::remote::{RemoteStorage, SpreadsheetForms};
use crate::storage::{ProgressStore, RescheduleStore};

/// What to copy where, and how a job is keyed in the state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_name: String,
    pub source_id: String,
    pub dest_parent_id: String,
    /// Defaults to "Copy of <source name>".
    pub dest_name: Option<String>,
    pub convert: bool,
    pub reschedule_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Structure,
    Content,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Structure => "structure",
            Phase::Content => "content",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(TreeStats),
    Rescheduled {
        phase: Phase,
        stats: TreeStats,
        run_at: OffsetDateTime,
    },
}

/// One execution of a copy job: load or seed the progress tree, advance
/// both phases within the deadline, then checkpoint.
pub struct ResumeDriver<'a, S, F> {
    storage: &'a S,
    forms: &'a F,
    progress: &'a ProgressStore,
    reschedule: &'a RescheduleStore,
    retry: &'a RetryPolicy,
    spec: &'a JobSpec,
}

impl<'a, S: RemoteStorage, F: SpreadsheetForms> ResumeDriver<'a, S, F> {
    pub fn new(
        storage: &'a S,
        forms: &'a F,
        progress: &'a ProgressStore,
        reschedule: &'a RescheduleStore,
        retry: &'a RetryPolicy,
        spec: &'a JobSpec,
    ) -> Self {
        Self {
            storage,
            forms,
            progress,
            reschedule,
            retry,
            spec,
        }
    }

    pub async fn run(&self, deadline: &Deadline) -> Result<RunOutcome, CopyError> {
        let job = self.spec.job_name.as_str();
        let mut tree = match self.progress.load(job).await? {
            Some(record) => {
                self.verify_destination(&record.tree).await?;
                info!(
                    job,
                    saved_at = %record.updated_at,
                    progress = %record.tree.stats(),
                    "resuming copy"
                );
                record.tree
            }
            None => self.start_fresh().await?,
        };

        let replicator = Replicator::new(
            self.storage,
            self.forms,
            deadline,
            self.retry,
            self.spec.convert,
        );
        let advanced = advance(&replicator, &mut tree).await;
        let stats = tree.stats();

        match advanced {
            Ok(Some(phase)) => {
                self.progress.save(job, &tree).await?;
                let run_at = self
                    .reschedule
                    .schedule_after(job, self.spec.reschedule_after)
                    .await?;
                info!(job, %phase, progress = %stats, %run_at, "time budget used up; rescheduled");
                Ok(RunOutcome::Rescheduled {
                    phase,
                    stats,
                    run_at,
                })
            }
            Ok(None) => {
                self.progress.clear(job).await?;
                self.reschedule.clear(job).await?;
                info!(job, progress = %stats, "copy complete");
                Ok(RunOutcome::Completed(stats))
            }
            Err(err) => {
                if let Err(save_err) = self.progress.save(job, &tree).await {
                    warn!(job, "failed to save progress after error: {save_err}");
                }
                Err(err)
            }
        }
    }

    /// Explores the source and creates the destination root. Refuses to
    /// touch a destination that already exists without a progress record.
    pub async fn start_fresh(&self) -> Result<FolderNode, CopyError> {
        let storage = self.storage;
        let source = self.spec.source_id.as_str();
        let parent = self.spec.dest_parent_id.as_str();

        let name = match &self.spec.dest_name {
            Some(name) => name.clone(),
            None => {
                let source_name =
                    retry(self.retry, "folder_name", || storage.folder_name(source)).await?;
                format!("Copy of {source_name}")
            }
        };

        let existing = retry(self.retry, "find_child", || {
            storage.find_child(parent, &name)
        })
        .await?;
        if let Some(existing) = existing {
            return Err(CopyError::DestinationExists(existing));
        }

        info!(source, dest = %name, "exploring source tree");
        let mut tree = explore(storage, self.retry, source, &name).await?;
        let root = retry(self.retry, "create_folder", || {
            storage.create_folder(parent, &name)
        })
        .await?;
        info!(dest = %root, progress = %tree.stats(), "created destination root");
        tree.dest_id = Some(root);

        self.progress.save(&self.spec.job_name, &tree).await?;
        Ok(tree)
    }

    pub async fn verify_destination(&self, tree: &FolderNode) -> Result<(), CopyError> {
        let dest = tree
            .dest_id
            .as_deref()
            .ok_or_else(|| CopyError::DestinationMissing(tree.name.clone()))?;
        let storage = self.storage;
        let exists = retry(self.retry, "exists", || storage.exists(dest)).await?;
        if !exists {
            return Err(CopyError::DestinationMissing(dest.to_string()));
        }
        Ok(())
    }
}

/// Runs phase 1 then phase 2; returns the phase that ran out of time.
async fn advance<S: RemoteStorage, F: SpreadsheetForms>(
    replicator: &Replicator<'_, S, F>,
    tree: &mut FolderNode,
) -> Result<Option<Phase>, CopyError> {
    if replicator.copy_structure(tree).await? == Outcome::Interrupted {
        return Ok(Some(Phase::Structure));
    }
    if replicator.copy_content(tree).await? == Outcome::Interrupted {
        return Ok(Some(Phase::Content));
    }
    Ok(None)
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
