//! Metadata resolution error types.

use thiserror::Error;

/// Cap on response body text carried in errors.
const MAX_BODY_SNIPPET: usize = 200;

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Metadata operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {}", snippet(.body))]
    Status { status: u16, body: String },

    #[error("malformed remote reply: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] depotkeep_storage::StorageError),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
