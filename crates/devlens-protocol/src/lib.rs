//! Wire protocol types for DevLens events, connection messages, and reports.

mod analysis;
mod event;

pub use analysis::{
    EmbedError, Embedder, ErrorContext, Oracle, OracleError, PatternFinding, PatternKind,
    SolutionSuggestion,
};
pub use event::{ChangelogEntry, Event, EventContent, EventKind, RawEvent, fingerprint};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a live connection.
pub type ConnectionId = Uuid;
/// Opaque session identifier supplied by the producer.
pub type SessionId = String;
/// Unique identifier for an event.
pub type EventId = String;
/// Identifier for a solution, derived from the originating event id.
pub type SolutionId = String;

/// Messages a producer or observer sends over a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientMessage {
    /// Bind the connection to a session and record metadata.
    Init {
        #[serde(default)]
        session_id: Option<SessionId>,
        #[serde(default = "default_source")]
        source: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        workspace: Option<String>,
        #[serde(default)]
        user_agent: Option<String>,
    },
    /// Submit a single event.
    Event { event: RawEvent },
    /// Submit a batch of events.
    Bulk { events: Vec<RawEvent> },
    /// Ask a session-scoped question.
    Query { query: QueryKind },
}

/// Queries supported over a connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Detect the dominant pattern in the bound session.
    Patterns,
    /// Build the session changelog report.
    Changelog,
}

/// Messages the server pushes back to connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    /// Acknowledges an init message.
    InitAck {
        connection_id: ConnectionId,
        timestamp: DateTime<Utc>,
    },
    /// Confirms an event was processed.
    EventProcessed {
        event_id: EventId,
        status: ProcessStatus,
    },
    /// Broadcasts a suggested solution for an error event.
    Solution {
        event_id: EventId,
        solution: SolutionSuggestion,
    },
    /// Reply to a query message.
    QueryResult { query: QueryKind, result: Value },
    /// Reports a processing failure to the session.
    Error { message: String },
    /// Initial session snapshot for monitor connections.
    Sessions { data: Vec<SessionSnapshot> },
    /// Periodic session snapshot for monitor connections.
    SessionsUpdate { data: Vec<SessionSnapshot> },
}

/// Processing status carried by event confirmations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// The event was persisted and fanned out.
    Success,
}

/// Status carried by ingestion receipts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// The event reached the primary durable facet.
    Stored,
}

/// Status carried by outcome-recording receipts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The outcome was appended and the success rate recomputed.
    Recorded,
}

/// Response returned for one ingested event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReceipt {
    /// Id assigned to the stored event.
    pub event_id: EventId,
    /// Ingestion status.
    pub status: IngestStatus,
    /// Suggested solution, present only for analyzed error events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionSuggestion>,
    /// Changelog entry for the stored event.
    pub changelog: ChangelogEntry,
}

/// Response returned after recording a solution outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeReceipt {
    /// Recording status.
    pub status: OutcomeStatus,
    /// Recomputed success rate for the solution.
    pub success_rate: f64,
}

/// Metadata bound to a connection via init.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConnectionMeta {
    /// Session the connection observes, once bound.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Producer kind (browser, editor, dashboard, monitor).
    #[serde(default = "default_source")]
    pub source: String,
    /// Origin URL for browser producers.
    #[serde(default)]
    pub url: Option<String>,
    /// Workspace path for editor producers.
    #[serde(default)]
    pub workspace: Option<String>,
    /// User agent string, when reported.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Live view of one connection within a session snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    /// Connection id assigned by the registry.
    pub connection_id: ConnectionId,
    /// Producer kind.
    pub source: String,
    /// Origin URL, when reported.
    #[serde(default)]
    pub url: Option<String>,
    /// Workspace path, when reported.
    #[serde(default)]
    pub workspace: Option<String>,
}

/// Snapshot of one session's live membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    /// Session id.
    pub id: SessionId,
    /// Connections currently bound to the session.
    pub connections: Vec<ConnectionInfo>,
}

/// Aggregated solution metrics for a session report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SolutionMetrics {
    /// Distinct solutions produced for the session.
    pub solution_count: u64,
    /// Mean oracle confidence across those solutions.
    pub avg_confidence: f64,
    /// Outcomes recorded as successful.
    pub successful_solutions: u64,
}

/// Full changelog report for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionReport {
    /// Session id.
    pub session_id: SessionId,
    /// Total events recorded for the session.
    pub event_count: usize,
    /// Occurrence counts keyed by "type:pattern".
    pub patterns: BTreeMap<String, u64>,
    /// Aggregated solution metrics.
    pub metrics: SolutionMetrics,
    /// Ordered changelog entries.
    pub timeline: Vec<ChangelogEntry>,
}

fn default_source() -> String {
    "browser".to_string()
}
