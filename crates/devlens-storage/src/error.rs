//! Error types for storage facet operations.

use thiserror::Error;

/// Errors returned by storage facets.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Solution id is unknown to the store.
    #[error("unknown solution: {0}")]
    UnknownSolution(String),
}
