//! Turns raw producer payloads into canonical events.

use crate::error::DevLensCoreError;
use chrono::Utc;
use devlens_protocol::{Event, EventContent, EventKind, RawEvent};
use rand::Rng;
use rand::distr::Alphanumeric;

/// Normalizes heterogeneous producer payloads into [`Event`]s.
///
/// Normalization assigns the event id and timestamp, validates the kind
/// string, resolves the owning session, and shapes the content payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventNormalizer;

impl EventNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one raw event.
    ///
    /// The session id comes from the payload itself, falling back to the
    /// submitting connection's binding. An event with neither is rejected,
    /// as is an unknown kind string.
    pub fn normalize(
        &self,
        raw: RawEvent,
        bound_session: Option<&str>,
    ) -> Result<Event, DevLensCoreError> {
        let kind = EventKind::parse(&raw.kind)
            .ok_or_else(|| DevLensCoreError::InvalidEvent(format!("unknown kind: {}", raw.kind)))?;
        let session_id = raw
            .session_id
            .or_else(|| bound_session.map(str::to_string))
            .ok_or_else(|| {
                DevLensCoreError::InvalidEvent("no session id on event or connection".to_string())
            })?;

        let timestamp = Utc::now();
        let id = format!(
            "evt_{}_{}_{}",
            timestamp.timestamp_millis(),
            kind.as_str(),
            suffix()
        );
        Ok(Event {
            id,
            kind,
            timestamp,
            session_id,
            content: EventContent::from_map(kind, raw.content),
            stack_trace: raw.stack_trace,
            context: raw.context,
            embedding: None,
        })
    }
}

/// Random id suffix; disambiguates events minted in the same millisecond.
fn suffix() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::EventNormalizer;
    use devlens_protocol::{EventContent, EventKind, RawEvent};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    fn raw(kind: &str, session_id: Option<&str>) -> RawEvent {
        let mut content = Map::new();
        content.insert("message".to_string(), json!("boom"));
        RawEvent {
            kind: kind.to_string(),
            session_id: session_id.map(str::to_string),
            content,
            stack_trace: Some("at main.js:1".to_string()),
            context: Map::new(),
        }
    }

    #[test]
    fn normalizes_with_payload_session() {
        let event = EventNormalizer::new()
            .normalize(raw("error", Some("s1")), Some("bound"))
            .expect("normalize");
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.kind, EventKind::Error);
        assert!(event.id.starts_with("evt_"));
        assert!(event.id.contains("_error_"));
        assert_eq!(event.message(), Some("boom"));
        assert_eq!(event.embedding, None);
    }

    #[test]
    fn falls_back_to_connection_binding() {
        let event = EventNormalizer::new()
            .normalize(raw("log", None), Some("bound"))
            .expect("normalize");
        assert_eq!(event.session_id, "bound");
        match event.content {
            EventContent::Console { .. } => {}
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_kind_and_missing_session() {
        let normalizer = EventNormalizer::new();
        let err = normalizer
            .normalize(raw("explosion", Some("s1")), None)
            .expect_err("kind");
        assert!(err.to_string().contains("unknown kind"));

        let err = normalizer
            .normalize(raw("log", None), None)
            .expect_err("session");
        assert!(err.to_string().contains("no session id"));
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let normalizer = EventNormalizer::new();
        let first = normalizer
            .normalize(raw("log", Some("s1")), None)
            .expect("normalize");
        let second = normalizer
            .normalize(raw("log", Some("s1")), None)
            .expect("normalize");
        assert_ne!(first.id, second.id);
    }
}
