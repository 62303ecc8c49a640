//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("invalid decryption key for depot {depot}: {reason}")]
    InvalidKey { depot: String, reason: String },

    #[error("unbalanced braces: no closing brace for section \"{section}\" opened at offset {offset}")]
    UnbalancedBraces { section: String, offset: usize },

    #[error("section \"{0}\" has no opening brace")]
    MissingSectionBody(String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
