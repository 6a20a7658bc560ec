//! Error analysis through the reasoning oracle.

use crate::error::DevLensCoreError;
use chrono::Utc;
use devlens_config::AnalyzerConfig;
use devlens_protocol::{ErrorContext, Event, Oracle, OracleError, SolutionSuggestion};
use devlens_storage::{GraphStore, RecordStore, SolutionRecord};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Analyzes error events and persists the resulting solutions.
///
/// Context assembly degrades gracefully: a broken similarity lookup or
/// changelog read shrinks the oracle's context instead of failing the
/// analysis. Only the oracle call itself is fatal.
pub struct ErrorAnalyzer {
    records: Arc<dyn RecordStore>,
    graph: Arc<dyn GraphStore>,
    oracle: Arc<dyn Oracle>,
    config: AnalyzerConfig,
}

impl ErrorAnalyzer {
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

    /// Analyze one error event and record the suggested solution.
    ///
    /// The solution id derives from the event id; re-analyzing the same
    /// event bumps the stored solution's usage count instead of rewriting
    /// it.
    pub async fn analyze(&self, event: &Event) -> Result<SolutionSuggestion, DevLensCoreError> {
        let similar = match event.embedding.as_deref() {
            Some(embedding) => {
                match self
                    .records
                    .similar_errors(embedding, &event.id, self.config.similar_cases)
                {
                    Ok(cases) => cases,
                    Err(err) => {
                        warn!(
                            "similarity lookup failed, analyzing without history (event_id={}, err={err})",
                            event.id
                        );
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };
        let recent_actions = match self
            .records
            .recent_events(&event.session_id, self.config.context_window)
        {
            Ok(entries) => entries
                .iter()
                .filter_map(|entry| entry.content.get("message"))
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect(),
            Err(err) => {
                warn!(
                    "recent-event lookup failed, analyzing without context (session_id={}, err={err})",
                    event.session_id
                );
                Vec::new()
            }
        };

        let context = ErrorContext {
            error_message: event.message().unwrap_or_default().to_string(),
            stack_trace: event.stack_trace.clone().unwrap_or_default(),
            code_context: event.content.code_context().unwrap_or_default().to_string(),
            framework: event.framework().unwrap_or("unknown").to_string(),
            recent_actions,
        };

        let deadline = Duration::from_secs(self.config.oracle_timeout_secs);
        let mut suggestion = timeout(deadline, self.oracle.analyze_error(&context))
            .await
            .map_err(|_| OracleError::Timeout(deadline))??;
        suggestion.similar_cases = similar.iter().map(|case| case.event_id.clone()).collect();

        let solution_id = format!("sol_{}", event.id);
        let now = Utc::now();
        let created = self.records.upsert_solution(&SolutionRecord {
            id: solution_id.clone(),
            root_cause: suggestion.root_cause.clone(),
            solution_code: suggestion.solution_code.clone(),
            explanation: suggestion.explanation.clone(),
            confidence: suggestion.confidence,
            success_rate: 0.0,
            usage_count: 1,
            created_at: now,
        })?;
        self.graph
            .link_solution(&event.id, &solution_id, suggestion.confidence, now)?;

        if created {
            info!(
                "solution recorded (event_id={}, solution_id={solution_id}, confidence={})",
                event.id, suggestion.confidence
            );
        } else {
            debug!("solution re-used (solution_id={solution_id})");
        }
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorAnalyzer;
    use chrono::Utc;
    use devlens_config::AnalyzerConfig;
    use devlens_protocol::{Event, EventContent, EventKind};
    use devlens_storage::{GraphStore, RecordStore, SqliteGraphStore, SqliteRecordStore};
    use devlens_test_utils::{FailingOracle, FixedOracle, RecordingOracle};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn error_event(id: &str, message: &str, embedding: Option<Vec<f32>>) -> Event {
        let mut content = Map::new();
        content.insert("message".to_string(), json!(message));
        Event {
            id: id.to_string(),
            kind: EventKind::Error,
            timestamp: Utc::now(),
            session_id: "s1".to_string(),
            content: EventContent::from_map(EventKind::Error, content),
            stack_trace: Some("at main.js:1".to_string()),
            context: Map::new(),
            embedding,
        }
    }

    fn analyzer(
        records: Arc<SqliteRecordStore>,
        graph: Arc<SqliteGraphStore>,
        oracle: Arc<dyn devlens_protocol::Oracle>,
    ) -> ErrorAnalyzer {
        ErrorAnalyzer::new(records, graph, oracle, AnalyzerConfig::default())
    }

    #[tokio::test]
    async fn analysis_attaches_similar_cases_and_stores_the_solution() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let past = error_event("evt_0_error_old", "boom earlier", Some(vec![1.0, 0.0]));
        records
            .insert_event(&past, &past.to_changelog())
            .expect("insert");

        let analyzer = analyzer(records.clone(), graph.clone(), Arc::new(FixedOracle::new()));
        let event = error_event("evt_1_error_new", "boom", Some(vec![0.9, 0.1]));
        let suggestion = analyzer.analyze(&event).await.expect("analyze");

        assert_eq!(suggestion.similar_cases, vec!["evt_0_error_old".to_string()]);
        let stored = records
            .solution("sol_evt_1_error_new")
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.root_cause, suggestion.root_cause);
        assert_eq!(stored.usage_count, 1);
        assert_eq!(
            graph.session_metrics("s1").expect("metrics").solution_count,
            0,
        );
    }

    #[tokio::test]
    async fn reanalysis_bumps_usage_without_overwriting() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let analyzer = analyzer(records.clone(), graph, Arc::new(FixedOracle::new()));
        let event = error_event("evt_1_error_abc", "boom", None);

        analyzer.analyze(&event).await.expect("first");
        analyzer.analyze(&event).await.expect("second");

        let stored = records
            .solution("sol_evt_1_error_abc")
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.usage_count, 2);
    }

    #[tokio::test]
    async fn oracle_failures_propagate() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let analyzer = analyzer(records.clone(), graph, Arc::new(FailingOracle::new("down")));
        let event = error_event("evt_1_error_abc", "boom", None);

        analyzer.analyze(&event).await.expect_err("oracle down");
        assert_eq!(records.solution("sol_evt_1_error_abc").expect("fetch"), None);
    }

    #[tokio::test]
    async fn context_carries_event_details() {
        let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
        let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
        let oracle = Arc::new(RecordingOracle::new());
        let analyzer = analyzer(records, graph, oracle.clone());

        let mut event = error_event("evt_1_error_abc", "boom", None);
        event.context = json!({ "framework": { "name": "React" } })
            .as_object()
            .expect("object")
            .clone();
        analyzer.analyze(&event).await.expect("analyze");

        let contexts = oracle.error_contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].error_message, "boom");
        assert_eq!(contexts[0].framework, "React");
        assert_eq!(contexts[0].stack_trace, "at main.js:1");
    }
}
