//! Storage facets for the DevLens pipeline.
//!
//! Three independent facets hold every accepted event: a JSONL stream for
//! live tailing, a relational store with vector search over error
//! embeddings, and a relationship graph linking events, sessions,
//! solutions, patterns and outcomes.

pub mod error;
pub mod graph;
pub mod model;
pub mod records;
pub mod similarity;
pub mod stream;

pub use error::StorageError;
pub use graph::{GraphStore, SqliteGraphStore};
pub use model::{OutcomeRecord, SimilarCase, SolutionRecord};
pub use records::{RecordStore, SqliteRecordStore};
pub use similarity::cosine_similarity;
pub use stream::{JsonlStreamStore, StreamStore};
