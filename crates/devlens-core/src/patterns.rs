//! Pattern detection over recent session activity.

use crate::error::DevLensCoreError;
use chrono::Utc;
use devlens_config::AnalyzerConfig;
use devlens_protocol::{Oracle, OracleError, PatternFinding};
use devlens_storage::{GraphStore, RecordStore};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Classifies the dominant pattern in a session's recent events.
pub struct PatternDetector {
    records: Arc<dyn RecordStore>,
    graph: Arc<dyn GraphStore>,
    oracle: Arc<dyn Oracle>,
    config: AnalyzerConfig,
}

impl PatternDetector {
    pub fn new(
        records: Arc<dyn RecordStore>,
        graph: Arc<dyn GraphStore>,
        oracle: Arc<dyn Oracle>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            records,
            graph,
            oracle,
            config,
        }
    }

    /// Detect and record the dominant pattern for a session.
    ///
    /// Sessions with no recorded events yield `None`. Each detection appends
    /// a sighting edge in the graph, so repeated detections count up.
    pub async fn detect(
        &self,
        session_id: &str,
    ) -> Result<Option<PatternFinding>, DevLensCoreError> {
        let entries = self
            .records
            .recent_events(session_id, self.config.pattern_window)?;
        if entries.is_empty() {
            return Ok(None);
        }

        let deadline = Duration::from_secs(self.config.oracle_timeout_secs);
        let finding = timeout(deadline, self.oracle.classify_pattern(&entries))
            .await
            .map_err(|_| OracleError::Timeout(deadline))??;

        self.graph
            .record_pattern(&finding, session_id, Utc::now())?;
        info!(
            "pattern detected (session_id={session_id}, pattern={}, kind={})",
            finding.pattern, finding.kind
        );
        Ok(Some(finding))
    }
}

#[cfg(test)]
mod tests {
    use super::PatternDetector;
    use chrono::Utc;
    use devlens_config::AnalyzerConfig;
    use devlens_protocol::{Event, EventContent, EventKind};
    use devlens_storage::{GraphStore, RecordStore, SqliteGraphStore, SqliteRecordStore};
    use devlens_test_utils::FixedOracle;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn log_event(id: &str, session_id: &str) -> Event {
        let mut content = Map::new();
        content.insert("message".to_string(), json!("clicked retry"));
        Event {
            id: id.to_string(),
            kind: EventKind::Log,
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            content: EventContent::from_map(EventKind::Log, content),
            stack_trace: None,
            context: Map::new(),
            embedding: None,
        }
    }

    #[tokio::test]
    async fn detection_records_a_sighting_per_run() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let event = log_event("evt_1_log_abc", "s1");
        records
            .insert_event(&event, &event.to_changelog())
            .expect("insert");

        let detector = PatternDetector::new(
            records,
            graph.clone(),
            Arc::new(FixedOracle::new()),
            AnalyzerConfig::default(),
        );
        let finding = detector.detect("s1").await.expect("detect").expect("some");
        detector.detect("s1").await.expect("detect");

        let key = format!("{}:{}", finding.kind, finding.pattern);
        let patterns = graph.session_patterns("s1").expect("patterns");
        assert_eq!(patterns.get(&key), Some(&2));
    }

    #[tokio::test]
    async fn empty_sessions_yield_no_finding() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let detector = PatternDetector::new(
            records,
            graph,
            Arc::new(FixedOracle::new()),
            AnalyzerConfig::default(),
        );
        assert_eq!(detector.detect("empty").await.expect("detect"), None);
    }
}
