//! Analysis seam types: the reasoning oracle and the embedding generator.

use crate::event::ChangelogEntry;
use crate::EventId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured request assembled for error analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ErrorContext {
    /// The error message.
    pub error_message: String,
    /// Stack trace if available.
    pub stack_trace: String,
    /// Surrounding code context.
    pub code_context: String,
    /// Framework in use, or "unknown".
    pub framework: String,
    /// Message text of the most recent session events.
    pub recent_actions: Vec<String>,
}

/// Suggested solution returned by the oracle.
///
/// The oracle is non-deterministic; identical inputs may produce different
/// suggestions, and confidence is advisory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolutionSuggestion {
    /// Identified root cause.
    pub root_cause: String,
    /// Suggested fix code.
    pub solution_code: String,
    /// Why the fix should work.
    pub explanation: String,
    /// Confidence score in [0, 1].
    pub confidence: f64,
    /// Ids of similar resolved cases.
    pub similar_cases: Vec<EventId>,
    /// Common pattern name, if one was identified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_name: Option<String>,
}

/// Classification for a detected development pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// An anti-pattern worth flagging.
    Smell,
    /// A recurring fix.
    Solution,
    /// A good practice observed.
    Practice,
}

impl PatternKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Smell => "smell",
            PatternKind::Solution => "solution",
            PatternKind::Practice => "practice",
        }
    }

    /// Parse a kind from a lowercase string, defaulting to smell.
    pub fn parse(value: &str) -> Self {
        match value {
            "solution" => PatternKind::Solution,
            "practice" => PatternKind::Practice,
            _ => PatternKind::Smell,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named pattern classified from a batch of session events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternFinding {
    /// Pattern name; the pattern's graph key.
    pub pattern: String,
    /// Pattern classification.
    #[serde(rename = "type")]
    pub kind: PatternKind,
    /// Human-readable description.
    pub description: String,
}

/// Errors returned by the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle did not answer within the deadline.
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    /// The underlying provider call failed.
    #[error("oracle call failed: {0}")]
    Provider(String),
}

/// Errors returned by embedding generation.
#[derive(Debug, Error)]
#[error("embedding failed: {0}")]
pub struct EmbedError(pub String);

/// External reasoning oracle consumed as a black box.
///
/// Inject a deterministic stub in tests; see `devlens-test-utils`.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Analyze an error context and suggest a solution.
    async fn analyze_error(&self, context: &ErrorContext)
    -> Result<SolutionSuggestion, OracleError>;

    /// Classify the dominant pattern in a batch of recent events.
    async fn classify_pattern(
        &self,
        events: &[ChangelogEntry],
    ) -> Result<PatternFinding, OracleError>;
}

/// Embedding generator for event text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed dimension of produced vectors.
    fn dimension(&self) -> usize;

    /// Embed one text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}
