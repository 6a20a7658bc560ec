//! Configuration models and loading for the DevLens pipeline.
//!
//! This crate owns the DevLens config schema, validation, and override
//! merging used by embedding hosts and tests.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
