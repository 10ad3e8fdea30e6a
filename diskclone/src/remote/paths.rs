use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("remote path is empty")]
    Empty,
    #[error("invalid item name: {0:?}")]
    InvalidName(String),
}

/// Joins a disk path ("disk:/Docs", "disk:/") with a single item name.
pub fn child_path(parent: &str, name: &str) -> Result<String, PathError> {
    if parent.is_empty() {
        return Err(PathError::Empty);
    }
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(PathError::InvalidName(name.to_string()));
    }
    Ok(format!("{}/{}", parent.trim_end_matches('/'), name))
}
