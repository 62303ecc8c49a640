//! Engine error types.

use thiserror::Error;

/// Reconciliation errors that abort an operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] depotkeep_storage::StorageError),

    #[error(transparent)]
    Metadata(#[from] depotkeep_metadata::MetadataError),

    #[error(transparent)]
    Core(#[from] depotkeep_core::Error),

    #[error("unlock script names no item id")]
    NoPrimaryItem,

    #[error("selected depot {0} is not part of the package")]
    UnknownSelection(String),
}

impl EngineError {
    /// Whether the slot store refused the operation for lack of room.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::Storage(depotkeep_storage::StorageError::CapacityExceeded { .. })
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
