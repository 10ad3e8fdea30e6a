use tracing::{Instrument, info, info_span};

use super::backoff::retry;
use super::tree::FolderNode;
use super::{CopyError, Outcome, Replicator};
use crate::remote::{RemoteStorage, SpreadsheetForms};

impl<S: RemoteStorage, F: SpreadsheetForms> Replicator<'_, S, F> {
    /// Phase 1: creates every destination folder below `node`, whose own
    /// destination must already exist.
    pub async fn copy_structure(&self, node: &mut FolderNode) -> Result<Outcome, CopyError> {
        if node.structure_done {
            return Ok(Outcome::Complete);
        }
        if self.deadline.expired() {
            return Ok(Outcome::Interrupted);
        }
        let parent = node
            .dest_id
            .clone()
            .ok_or_else(|| CopyError::MissingDestination(node.name.clone()))?;

        let storage = self.storage;
        for child in &mut node.children {
            if child.dest_id.is_none() {
                if self.deadline.expired() {
                    return Ok(Outcome::Interrupted);
                }
                let name = child.name.clone();
                let id = retry(self.retry, "create_folder", || {
                    storage.create_folder(&parent, &name)
                })
                .await?;
                info!(folder = %name, dest = %id, "created folder");
                child.dest_id = Some(id);
            }

            // A child created in an earlier execution may still have an
            // unfinished subtree, so recurse regardless.
            let span = info_span!("folder", name = %child.name);
            let outcome = Box::pin(self.copy_structure(child))
                .instrument(span)
                .await?;
            if outcome == Outcome::Interrupted {
                return Ok(Outcome::Interrupted);
            }
        }

        node.structure_done = true;
        Ok(Outcome::Complete)
    }
}
