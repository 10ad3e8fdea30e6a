pub mod backoff;
mod content;
pub mod deadline;
pub mod driver;
pub mod explorer;
mod forms;
pub mod policy;
mod structure;
#[cfg(test)]
pub(crate) mod testing;
pub mod tree;

use thiserror::Error;

use self::backoff::{RetryExhausted, RetryPolicy};
use self::deadline::Deadline;
use crate::remote::RemoteError;
use crate::storage::StateError;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("destination {0} already exists but no progress record was found")]
    DestinationExists(String),
    #[error("progress record exists but destination {0} is missing")]
    DestinationMissing(String),
    #[error("folder {0:?} has no destination id")]
    MissingDestination(String),
    #[error(transparent)]
    Remote(#[from] RetryExhausted<RemoteError>),
    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl CopyError {
    /// Errors that need an operator before the job can run again.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CopyError::DestinationExists(_) | CopyError::DestinationMissing(_)
        )
    }
}

/// Result of one phase over a subtree. Running out of time is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Interrupted,
}

/// Walks the progress tree and mutates the destination.
///
/// Phase 1 lives in `structure.rs`, phase 2 in `content.rs`.
pub struct Replicator<'a, S, F> {
    storage: &'a S,
    forms: &'a F,
    deadline: &'a Deadline,
    retry: &'a RetryPolicy,
    convert: bool,
}

impl<'a, S, F> Replicator<'a, S, F> {
    pub fn new(
        storage: &'a S,
        forms: &'a F,
        deadline: &'a Deadline,
        retry: &'a RetryPolicy,
        convert: bool,
    ) -> Self {
        Self {
            storage,
            forms,
            deadline,
            retry,
            convert,
        }
    }
}
