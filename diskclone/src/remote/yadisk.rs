use std::time::Duration;

use diskclone_core::{OperationStatus, Resource, ResourceType, TransferLink, YadiskClient};
use tracing::debug;

use super::paths::child_path;
use super::transfer::{TransferClient, TransferError};
use super::{
    LinkedForm, RemoteError, RemoteFile, RemoteFolder, RemoteStorage, Sheet, SpreadsheetForms,
};
use crate::copy::backoff::Backoff;

const PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_POLLS: u32 = 30;

/// Yandex Disk backend. Item ids are absolute disk paths.
#[derive(Clone)]
pub struct YadiskStorage {
    client: YadiskClient,
    transfer: TransferClient,
    poll: Backoff,
    max_polls: u32,
}

impl YadiskStorage {
    pub fn new(client: YadiskClient) -> Self {
        Self {
            client,
            transfer: TransferClient::new(),
            poll: Backoff::new(
                Duration::from_millis(250),
                Duration::from_secs(10),
                Duration::from_millis(100),
            ),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_polling(mut self, poll: Backoff, max_polls: u32) -> Self {
        self.poll = poll;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn list(
        &self,
        folder: &str,
        kind: ResourceType,
    ) -> Result<impl Iterator<Item = Resource>, RemoteError> {
        let items = self
            .client
            .list_directory_all(folder, PAGE_SIZE, None)
            .await?;
        Ok(items
            .into_iter()
            .filter(move |item| item.resource_type == kind))
    }

    async fn finish(&self, link: TransferLink) -> Result<(), RemoteError> {
        if link.is_operation() {
            self.wait_for_operation(link.href.as_str()).await?;
        }
        Ok(())
    }

    async fn wait_for_operation(&self, operation_url: &str) -> Result<(), RemoteError> {
        for attempt in 0..self.max_polls {
            match self.client.get_operation_status(operation_url).await? {
                OperationStatus::Success => return Ok(()),
                OperationStatus::Failure => {
                    return Err(RemoteError::OperationFailed(operation_url.to_string()));
                }
                OperationStatus::InProgress => {
                    tokio::time::sleep(self.poll.delay(attempt)).await;
                }
            }
        }
        Err(RemoteError::OperationFailed(format!(
            "{operation_url} still in progress after {} polls",
            self.max_polls
        )))
    }
}

impl RemoteStorage for YadiskStorage {
    async fn folder_name(&self, folder: &str) -> Result<String, RemoteError> {
        Ok(self.client.get_resource(folder).await?.name)
    }

    async fn exists(&self, id: &str) -> Result<bool, RemoteError> {
        Ok(self.client.find_resource(id).await?.is_some())
    }

    async fn find_child(&self, parent: &str, name: &str) -> Result<Option<String>, RemoteError> {
        let path = child_path(parent, name)?;
        Ok(self.client.find_resource(&path).await?.map(|_| path))
    }

    async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        Ok(self
            .list(folder, ResourceType::File)
            .await?
            .map(|item| RemoteFile {
                id: item.path,
                name: item.name,
                mime_type: item.mime_type,
            })
            .collect())
    }

    async fn list_folders(&self, folder: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
        Ok(self
            .list(folder, ResourceType::Dir)
            .await?
            .map(|item| RemoteFolder {
                id: item.path,
                name: item.name,
            })
            .collect())
    }

    async fn create_folder(&self, parent: &str, name: &str) -> Result<String, RemoteError> {
        let path = child_path(parent, name)?;
        match self.client.create_folder(&path).await {
            Ok(_) => Ok(path),
            Err(err) if err.is_existing_directory() => {
                debug!(path = %path, "folder already exists; merging");
                Ok(path)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn copy_file(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
    ) -> Result<String, RemoteError> {
        let path = child_path(dest_folder, name)?;
        // The destination tree is new, so overwriting only ever replaces a
        // copy left behind by an earlier attempt of this same call.
        let link = self.client.copy_resource(file, &path, true).await?;
        self.finish(link).await?;
        Ok(path)
    }

    /// Yandex Disk has no server-side format conversion. The bytes are
    /// re-uploaded unchanged under the original name, and only the declared
    /// `Content-Type` becomes `target_mime`.
    async fn create_converted(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
        target_mime: &str,
    ) -> Result<String, RemoteError> {
        let path = child_path(dest_folder, name)?;
        let source = self.client.get_resource(file).await?;
        let download = self.client.get_download_link(file).await?;
        let staging = tempfile::Builder::new()
            .prefix("diskclone-")
            .tempfile()
            .map_err(TransferError::from)?;
        self.transfer
            .download_to_path_checked(
                download.href.as_str(),
                staging.path(),
                source.md5.as_deref(),
            )
            .await?;
        let upload = self.client.get_upload_link(&path, true).await?;
        self.transfer
            .upload_from_path(upload.href.as_str(), staging.path(), target_mime)
            .await?;
        Ok(path)
    }
}

/// Spreadsheets stored on Yandex Disk are plain files without attached
/// forms, so there is never anything to detach.
impl SpreadsheetForms for YadiskStorage {
    async fn open_spreadsheet(&self, _file: &str) -> Result<Vec<Sheet>, RemoteError> {
        Ok(Vec::new())
    }

    async fn open_form(&self, _url: &str) -> Result<LinkedForm, RemoteError> {
        Err(RemoteError::Unsupported("linked forms"))
    }

    async fn detach_form(&self, _form: &LinkedForm) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported("linked forms"))
    }

    async fn delete_form(&self, form_id: &str) -> Result<(), RemoteError> {
        if let Some(link) = self.client.delete_resource(form_id, false).await? {
            self.finish(link).await?;
        }
        Ok(())
    }
}
