//! Canonical event model, content shaping, and changelog entries.

use crate::{EventId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Kinds of development events accepted for ingestion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Console log line.
    Log,
    /// Console warning.
    Warn,
    /// Captured error or unhandled rejection.
    Error,
    /// Network call record.
    Network,
    /// Performance measurement.
    Performance,
    /// A solution was attempted.
    SolutionAttempt,
    /// The observed result of a solution attempt.
    SolutionOutcome,
}

impl EventKind {
    /// Return the kind as its lowercase wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Warn => "warn",
            EventKind::Error => "error",
            EventKind::Network => "network",
            EventKind::Performance => "performance",
            EventKind::SolutionAttempt => "solution_attempt",
            EventKind::SolutionOutcome => "solution_outcome",
        }
    }

    /// Parse a kind from its wire string, rejecting unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "log" => Some(EventKind::Log),
            "warn" => Some(EventKind::Warn),
            "error" => Some(EventKind::Error),
            "network" => Some(EventKind::Network),
            "performance" => Some(EventKind::Performance),
            "solution_attempt" => Some(EventKind::SolutionAttempt),
            "solution_outcome" => Some(EventKind::SolutionOutcome),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventKind::parse(value).ok_or(())
    }
}

/// Raw producer payload as submitted over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    /// Event type string, validated against [`EventKind`] on ingestion.
    #[serde(rename = "type")]
    pub kind: String,
    /// Producer session id; may instead come from the connection binding.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Open content payload.
    #[serde(default)]
    pub content: Map<String, Value>,
    /// Optional stack trace; browser producers send either key.
    #[serde(default, alias = "stack")]
    pub stack_trace: Option<String>,
    /// Open context payload (originating framework, url, user agent).
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Typed view over an event's content payload.
///
/// Known kinds expose their expected fields; anything else stays in the
/// extension map so unanticipated keys survive a round trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EventContent {
    /// Console output (log and warn kinds).
    Console {
        level: Option<String>,
        message: Option<String>,
        extra: Map<String, Value>,
    },
    /// Captured error with optional surrounding code.
    Error {
        message: Option<String>,
        code_context: Option<String>,
        extra: Map<String, Value>,
    },
    /// Network call record.
    Network {
        url: Option<String>,
        method: Option<String>,
        status: Option<i64>,
        extra: Map<String, Value>,
    },
    /// Performance measurement.
    Performance {
        metric: Option<String>,
        value: Option<f64>,
        extra: Map<String, Value>,
    },
    /// Payloads with no dedicated shape (solution attempts and outcomes).
    Open { fields: Map<String, Value> },
}

impl EventContent {
    /// Shape an open content map into the typed view for the given kind.
    pub fn from_map(kind: EventKind, mut map: Map<String, Value>) -> Self {
        match kind {
            EventKind::Log | EventKind::Warn => {
                let level = take_string(&mut map, "level");
                let message = take_string(&mut map, "message");
                EventContent::Console {
                    level,
                    message,
                    extra: map,
                }
            }
            EventKind::Error => {
                let message = take_string(&mut map, "message");
                let code_context = take_string(&mut map, "code_context");
                EventContent::Error {
                    message,
                    code_context,
                    extra: map,
                }
            }
            EventKind::Network => {
                let url = take_string(&mut map, "url");
                let method = take_string(&mut map, "method");
                let status = take_i64(&mut map, "status");
                EventContent::Network {
                    url,
                    method,
                    status,
                    extra: map,
                }
            }
            EventKind::Performance => {
                let metric = take_string(&mut map, "metric");
                let value = take_f64(&mut map, "value");
                EventContent::Performance {
                    metric,
                    value,
                    extra: map,
                }
            }
            EventKind::SolutionAttempt | EventKind::SolutionOutcome => {
                EventContent::Open { fields: map }
            }
        }
    }

    /// Rebuild the open content map, typed fields included.
    ///
    /// serde_json object maps are BTree-ordered, so the rebuilt map encodes
    /// canonically regardless of the producer's key order.
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            EventContent::Console {
                level,
                message,
                extra,
            } => {
                let mut map = extra.clone();
                insert_string(&mut map, "level", level);
                insert_string(&mut map, "message", message);
                map
            }
            EventContent::Error {
                message,
                code_context,
                extra,
            } => {
                let mut map = extra.clone();
                insert_string(&mut map, "message", message);
                insert_string(&mut map, "code_context", code_context);
                map
            }
            EventContent::Network {
                url,
                method,
                status,
                extra,
            } => {
                let mut map = extra.clone();
                insert_string(&mut map, "url", url);
                insert_string(&mut map, "method", method);
                if let Some(status) = status {
                    map.insert("status".to_string(), Value::from(*status));
                }
                map
            }
            EventContent::Performance {
                metric,
                value,
                extra,
            } => {
                let mut map = extra.clone();
                insert_string(&mut map, "metric", metric);
                if let Some(value) = value {
                    map.insert("value".to_string(), Value::from(*value));
                }
                map
            }
            EventContent::Open { fields } => fields.clone(),
        }
    }

    /// Primary message text, when the payload carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            EventContent::Console { message, .. } | EventContent::Error { message, .. } => {
                message.as_deref()
            }
            EventContent::Open { fields } => fields.get("message").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Surrounding code context for error payloads.
    pub fn code_context(&self) -> Option<&str> {
        match self {
            EventContent::Error { code_context, .. } => code_context.as_deref(),
            _ => None,
        }
    }
}

/// One normalized development event.
///
/// Immutable after construction except for the lazily attached embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Globally unique event id.
    pub id: EventId,
    /// Event kind.
    pub kind: EventKind,
    /// Ingestion timestamp.
    pub timestamp: DateTime<Utc>,
    /// Producer session id.
    pub session_id: SessionId,
    /// Typed content payload.
    pub content: EventContent,
    /// Optional stack trace.
    pub stack_trace: Option<String>,
    /// Open context payload.
    pub context: Map<String, Value>,
    /// Embedding vector attached by the persistence coordinator.
    pub embedding: Option<Vec<f32>>,
}

impl Event {
    /// Deterministic fingerprint of the content payload.
    ///
    /// Equal content yields equal fingerprints regardless of the producer's
    /// field insertion order.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.content.to_map())
    }

    /// Primary message text, when present.
    pub fn message(&self) -> Option<&str> {
        self.content.message()
    }

    /// Framework name from the context payload, when reported.
    pub fn framework(&self) -> Option<&str> {
        self.context
            .get("framework")
            .and_then(|framework| framework.get("name"))
            .and_then(Value::as_str)
    }

    /// Text used for embedding generation: message plus stack trace.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {}",
            self.message().unwrap_or_default(),
            self.stack_trace.as_deref().unwrap_or_default()
        )
    }

    /// Convert to the stable changelog entry shape.
    pub fn to_changelog(&self) -> ChangelogEntry {
        let content = self.content.to_map();
        let hash = fingerprint(&content);
        ChangelogEntry {
            id: self.id.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
            session_id: self.session_id.clone(),
            content,
            context: self.context.clone(),
            hash,
        }
    }
}

/// Persisted changelog entry, used for both storage and reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangelogEntry {
    /// Event id.
    pub id: EventId,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Ingestion timestamp (RFC 3339).
    pub timestamp: DateTime<Utc>,
    /// Producer session id.
    pub session_id: SessionId,
    /// Open content payload.
    pub content: Map<String, Value>,
    /// Open context payload.
    pub context: Map<String, Value>,
    /// Content fingerprint.
    pub hash: String,
}

/// SHA-256 fingerprint of a content payload under canonical encoding.
pub fn fingerprint(content: &Map<String, Value>) -> String {
    let encoded =
        serde_json::to_string(content).unwrap_or_else(|_| String::from("{}"));
    let digest = Sha256::digest(encoded.as_bytes());
    format!("{digest:x}")
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => match map.remove(key) {
            Some(Value::String(value)) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

fn take_i64(map: &mut Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key).and_then(Value::as_i64) {
        Some(value) => {
            map.remove(key);
            Some(value)
        }
        None => None,
    }
}

fn take_f64(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key).and_then(Value::as_f64) {
        Some(value) => {
            map.remove(key);
            Some(value)
        }
        None => None,
    }
}

fn insert_string(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}
