use tracing::{Instrument, debug, debug_span};

use super::backoff::{RetryExhausted, RetryPolicy, retry};
use super::tree::{FileNode, FolderNode};
use crate::remote::{RemoteError, RemoteStorage};

/// Lists the whole source hierarchy under `folder_id` into a fresh progress
/// tree whose root is named `name`.
///
/// Read-only and unbounded in time: the listing has to finish within the
/// first execution.
pub async fn explore<S: RemoteStorage>(
    storage: &S,
    policy: &RetryPolicy,
    folder_id: &str,
    name: &str,
) -> Result<FolderNode, RetryExhausted<RemoteError>> {
    let mut node = FolderNode::new(folder_id, name);

    let files = retry(policy, "list_files", || storage.list_files(folder_id)).await?;
    node.files = files
        .into_iter()
        .map(|file| FileNode::new(file.id, file.name, file.mime_type))
        .collect();

    let folders = retry(policy, "list_folders", || storage.list_folders(folder_id)).await?;
    for folder in folders {
        let span = debug_span!("explore", folder = %folder.name);
        let child = Box::pin(explore(storage, policy, &folder.id, &folder.name))
            .instrument(span)
            .await?;
        node.children.push(child);
    }

    debug!(
        folder = %node.name,
        files = node.files.len(),
        folders = node.children.len(),
        "explored folder"
    );
    Ok(node)
}
