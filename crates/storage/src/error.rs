//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(
        "cannot add {requested} entries: would exceed the {capacity} slot limit (currently {existing} files)"
    )]
    CapacityExceeded {
        requested: usize,
        existing: usize,
        capacity: usize,
    },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("library {} is not configured in client.libraries", .0.display())]
    UnknownLibrary(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] depotkeep_core::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
