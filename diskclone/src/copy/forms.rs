use tracing::info;

use super::backoff::retry;
use super::tree::FileNode;
use super::{CopyError, Replicator};
use crate::remote::{RemoteStorage, SpreadsheetForms};

impl<S: RemoteStorage, F: SpreadsheetForms> Replicator<'_, S, F> {
    /// Duplicates a spreadsheet and strips the form links the duplication
    /// drags along.
    ///
    /// Copying a spreadsheet with attached forms makes the service clone
    /// those forms next to the source and link them to the copy. The source
    /// is only scanned; all cleanup happens on the copy.
    pub(super) async fn copy_spreadsheet(
        &self,
        file: &FileNode,
        dest_folder: &str,
    ) -> Result<String, CopyError> {
        let forms = self.forms;
        let source_sheets = retry(self.retry, "open_spreadsheet", || {
            forms.open_spreadsheet(&file.source_id)
        })
        .await?;
        let has_linked_forms = source_sheets
            .iter()
            .any(|sheet| sheet.linked_form_url.is_some());

        let copy_id = self.duplicate(file, dest_folder).await?;
        if has_linked_forms {
            let detached = self.detach_linked_forms(&copy_id).await?;
            info!(file = %file.name, detached, "removed forms linked to spreadsheet copy");
        }
        Ok(copy_id)
    }

    async fn detach_linked_forms(&self, spreadsheet: &str) -> Result<usize, CopyError> {
        let forms = self.forms;
        let sheets = retry(self.retry, "open_spreadsheet", || {
            forms.open_spreadsheet(spreadsheet)
        })
        .await?;

        let mut detached = 0;
        for url in sheets.into_iter().filter_map(|sheet| sheet.linked_form_url) {
            let form = retry(self.retry, "open_form", || forms.open_form(&url)).await?;
            retry(self.retry, "detach_form", || forms.detach_form(&form)).await?;
            retry(self.retry, "delete_form", || forms.delete_form(&form.id)).await?;
            detached += 1;
        }
        Ok(detached)
    }
}
