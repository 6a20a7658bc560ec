//! Error types for the DevLens core pipeline.

use devlens_protocol::{EmbedError, OracleError};
use devlens_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum DevLensCoreError {
    /// The submitted event failed validation.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    /// A storage facet operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The reasoning oracle failed or timed out.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// Embedding generation failed.
    #[error(transparent)]
    Embedding(#[from] EmbedError),
    /// The referenced solution does not exist.
    #[error("unknown solution: {0}")]
    UnknownSolution(String),
}
