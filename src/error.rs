//! Error types for the navigator and transfer coordinator.

use crate::model::Capability;
use crate::services::remote::BackendError;
use crate::services::transfer::TransferKind;
use crate::view::file_tree::NodeId;
use thiserror::Error;

/// Main error type for navigator and coordinator operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplorerError {
    /// A remote call failed. Never retried here.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A transfer session is already running.
    #[error("a {0} transfer is already running")]
    AlreadyRunning(TransferKind),

    /// The node is already waiting on a listing.
    #[error("{0:?} is already expanding")]
    AlreadyExpanding(String),

    /// Only folders can be expanded or listed.
    #[error("{0:?} is not a folder")]
    NotAFolder(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Destination picker was given a folder the backend does not know.
    #[error("folder does not exist: {0:?}")]
    FolderNotFound(String),

    /// The selection does not allow this action.
    #[error("{0} is not available for the current selection")]
    ActionUnavailable(Capability),

    /// Another navigator-driven operation is outstanding.
    #[error("navigator is busy")]
    Busy,
}

impl ExplorerError {
    /// The backend failure, if this error carries one
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            ExplorerError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for navigator operations.
pub type Result<T> = std::result::Result<T, ExplorerError>;
