use tracing::{Instrument, debug, info_span};

use super::backoff::retry;
use super::policy::CopyPolicy;
use super::tree::{FileNode, FolderNode};
use super::{CopyError, Outcome, Replicator};
use crate::remote::{RemoteStorage, SpreadsheetForms};

impl<S: RemoteStorage, F: SpreadsheetForms> Replicator<'_, S, F> {
    /// Phase 2: copies every file below `node`. Expects phase 1 to have
    /// completed for the subtree.
    pub async fn copy_content(&self, node: &mut FolderNode) -> Result<Outcome, CopyError> {
        if node.content_done {
            return Ok(Outcome::Complete);
        }
        if self.deadline.expired() {
            return Ok(Outcome::Interrupted);
        }
        let dest_folder = node
            .dest_id
            .clone()
            .ok_or_else(|| CopyError::MissingDestination(node.name.clone()))?;

        for file in &mut node.files {
            if file.dest_id.is_some() {
                continue;
            }
            if self.deadline.expired() {
                return Ok(Outcome::Interrupted);
            }
            let id = self.copy_file(file, &dest_folder).await?;
            debug!(file = %file.name, dest = %id, "copied file");
            file.dest_id = Some(id);
        }

        for child in &mut node.children {
            let span = info_span!("folder", name = %child.name);
            let outcome = Box::pin(self.copy_content(child))
                .instrument(span)
                .await?;
            if outcome == Outcome::Interrupted {
                return Ok(Outcome::Interrupted);
            }
        }

        node.content_done = true;
        Ok(Outcome::Complete)
    }

    async fn copy_file(&self, file: &FileNode, dest_folder: &str) -> Result<String, CopyError> {
        let storage = self.storage;
        match CopyPolicy::for_mime(file.mime_type.as_deref(), self.convert) {
            CopyPolicy::Convert { target_mime } => Ok(retry(self.retry, "create_converted", || {
                storage.create_converted(&file.source_id, dest_folder, &file.name, target_mime)
            })
            .await?),
            CopyPolicy::Spreadsheet => self.copy_spreadsheet(file, dest_folder).await,
            CopyPolicy::Duplicate => self.duplicate(file, dest_folder).await,
        }
    }

    pub(super) async fn duplicate(
        &self,
        file: &FileNode,
        dest_folder: &str,
    ) -> Result<String, CopyError> {
        let storage = self.storage;
        Ok(retry(self.retry, "copy_file", || {
            storage.copy_file(&file.source_id, dest_folder, &file.name)
        })
        .await?)
    }
}
