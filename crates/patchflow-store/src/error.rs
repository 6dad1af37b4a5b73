//! Error types for patchflow-store

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored artifact does not match its companion digest
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// No record stored under the given key
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
