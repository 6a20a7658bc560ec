//! Persisted records shared by the storage facets.

use chrono::{DateTime, Utc};
use devlens_protocol::{EventId, SolutionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted solution record in the relational facet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolutionRecord {
    /// Solution id, derived from the originating event id.
    pub id: SolutionId,
    /// Identified root cause.
    pub root_cause: String,
    /// Suggested fix code.
    pub solution_code: String,
    /// Why the fix should work.
    pub explanation: String,
    /// Oracle confidence at creation time.
    pub confidence: f64,
    /// Derived success rate, recomputed from outcomes.
    pub success_rate: f64,
    /// Times analysis produced or re-used this solution.
    pub usage_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Recorded real-world result of applying a solution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeRecord {
    /// Outcome id.
    pub id: String,
    /// Solution the outcome belongs to.
    pub solution_id: SolutionId,
    /// Whether applying the solution worked.
    pub success: bool,
    /// Arbitrary metrics payload.
    pub metrics: Value,
    /// Recording timestamp.
    pub created_at: DateTime<Utc>,
}

/// One similar historical error returned by the similarity index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarCase {
    /// Id of the similar error event.
    pub event_id: EventId,
    /// Message text of the similar error.
    pub message: String,
    /// Cosine similarity against the query embedding.
    pub similarity: f32,
}
