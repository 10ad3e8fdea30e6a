//! Collaborator boundary of the copy job: the storage service holding the
//! source and destination trees, and the spreadsheet/form services touched by
//! the linked-form cleanup.

pub mod paths;
pub mod transfer;
pub mod yadisk;

use thiserror::Error;

use self::paths::PathError;
use self::transfer::TransferError;

pub use self::yadisk::YadiskStorage;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("api error: {0}")]
    Api(#[from] diskclone_core::YadiskError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("remote operation failed: {0}")]
    OperationFailed(String),
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub linked_form_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedForm {
    pub id: String,
    pub url: String,
}

/// Hierarchical storage addressed by opaque ids.
#[allow(async_fn_in_trait)]
pub trait RemoteStorage {
    async fn folder_name(&self, folder: &str) -> Result<String, RemoteError>;

    async fn exists(&self, id: &str) -> Result<bool, RemoteError>;

    /// Id of the item called `name` directly under `parent`, if any.
    async fn find_child(&self, parent: &str, name: &str) -> Result<Option<String>, RemoteError>;

    async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>, RemoteError>;

    async fn list_folders(&self, folder: &str) -> Result<Vec<RemoteFolder>, RemoteError>;

    /// Creates `name` under `parent`. A folder that already exists under that
    /// name is reused, so sibling folders with equal names merge.
    async fn create_folder(&self, parent: &str, name: &str) -> Result<String, RemoteError>;

    async fn copy_file(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
    ) -> Result<String, RemoteError>;

    /// Re-creates the bytes of `file` under `dest_folder`, declaring
    /// `target_mime` so the service stores it in that format.
    async fn create_converted(
        &self,
        file: &str,
        dest_folder: &str,
        name: &str,
        target_mime: &str,
    ) -> Result<String, RemoteError>;
}

/// Spreadsheet and form services.
#[allow(async_fn_in_trait)]
pub trait SpreadsheetForms {
    async fn open_spreadsheet(&self, file: &str) -> Result<Vec<Sheet>, RemoteError>;

    async fn open_form(&self, url: &str) -> Result<LinkedForm, RemoteError>;

    /// Unlinks the form from the spreadsheet it reports responses to.
    async fn detach_form(&self, form: &LinkedForm) -> Result<(), RemoteError>;

    /// Marks the form artifact for deletion.
    async fn delete_form(&self, form_id: &str) -> Result<(), RemoteError>;
}
