//! Test doubles for the DevLens pipeline: deterministic oracles and
//! embedders to inject at the analysis seams.

pub mod embed;
pub mod oracle;

pub use embed::{FailingEmbedder, FixedEmbedder};
pub use oracle::{FailingOracle, FixedOracle, RecordingOracle, StalledOracle};
