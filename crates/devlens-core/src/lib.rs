//! Core DevLens pipeline: normalization, persistence coordination, error
//! analysis, pattern detection, outcome recording, and session fan-out.

pub mod analyzer;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod monitor;
pub mod normalizer;
pub mod outcomes;
pub mod patterns;
pub mod registry;
pub mod report;
pub mod router;

pub use analyzer::ErrorAnalyzer;
pub use connection::spawn_connection;
pub use coordinator::PersistenceCoordinator;
pub use error::DevLensCoreError;
pub use monitor::spawn_session_monitor;
pub use normalizer::EventNormalizer;
pub use outcomes::OutcomeRecorder;
pub use patterns::PatternDetector;
pub use registry::{ConnectionSender, SessionRegistry};
pub use report::ChangelogReporter;
pub use router::{EventRouter, MONITOR_SOURCE, storage_root};
