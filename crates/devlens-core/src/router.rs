//! Central event router: ingestion, analysis fan-out, and message handling.

use crate::analyzer::ErrorAnalyzer;
use crate::coordinator::PersistenceCoordinator;
use crate::error::DevLensCoreError;
use crate::normalizer::EventNormalizer;
use crate::outcomes::OutcomeRecorder;
use crate::patterns::PatternDetector;
use crate::registry::{ConnectionSender, SessionRegistry};
use crate::report::ChangelogReporter;
use chrono::Utc;
use devlens_config::{DevLensConfig, StorageConfig};
use devlens_protocol::{
    ClientMessage, ConnectionId, ConnectionMeta, Embedder, EventKind, IngestReceipt, IngestStatus,
    Oracle, OutcomeReceipt, ProcessStatus, QueryKind, RawEvent, ServerMessage, SessionReport,
    PatternFinding,
};
use devlens_storage::{
    GraphStore, JsonlStreamStore, RecordStore, SqliteGraphStore, SqliteRecordStore, StreamStore,
};
use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Source string that flags a connection as a monitor observer.
pub const MONITOR_SOURCE: &str = "monitor";

/// Routes producer messages through the pipeline and fans results back out.
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    normalizer: EventNormalizer,
    coordinator: PersistenceCoordinator,
    analyzer: ErrorAnalyzer,
    patterns: PatternDetector,
    outcomes: OutcomeRecorder,
    reporter: ChangelogReporter,
}

impl EventRouter {
    /// Build a router over explicit storage facets.
    pub fn new(
        config: &DevLensConfig,
        stream: Arc<dyn StreamStore>,
        records: Arc<dyn RecordStore>,
        graph: Arc<dyn GraphStore>,
        oracle: Arc<dyn Oracle>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            normalizer: EventNormalizer::new(),
            coordinator: PersistenceCoordinator::new(
                stream,
                records.clone(),
                graph.clone(),
                embedder,
            ),
            analyzer: ErrorAnalyzer::new(
                records.clone(),
                graph.clone(),
                oracle.clone(),
                config.analyzer.clone(),
            ),
            patterns: PatternDetector::new(
                records.clone(),
                graph.clone(),
                oracle,
                config.analyzer.clone(),
            ),
            outcomes: OutcomeRecorder::new(records.clone(), graph.clone()),
            reporter: ChangelogReporter::new(records, graph),
        }
    }

    /// Build a router with facets opened under the configured storage root.
    pub fn open(
        config: &DevLensConfig,
        oracle: Arc<dyn Oracle>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, DevLensCoreError> {
        let root = storage_root(&config.storage);
        fs::create_dir_all(&root).map_err(devlens_storage::StorageError::Io)?;
        info!("opening storage facets (root={})", root.display());
        let stream = Arc::new(JsonlStreamStore::new(root.join(&config.storage.stream_dir))?);
        let records = Arc::new(SqliteRecordStore::open(
            root.join(&config.storage.records_file),
        )?);
        let graph = Arc::new(SqliteGraphStore::open(root.join(&config.storage.graph_file))?);
        Ok(Self::new(config, stream, records, graph, oracle, embedder))
    }

    /// The live connection registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Register a connection's outbound channel.
    pub fn connect(&self, sender: ConnectionSender) -> ConnectionId {
        self.registry.register(sender)
    }

    /// Drop a connection from the registry.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.registry.unregister(connection_id);
    }

    /// Ingest one raw event through normalize, persist, and analyze.
    ///
    /// Analysis failures degrade: the event stays stored and the receipt
    /// simply carries no solution. Outcome events additionally update the
    /// referenced solution's success rate.
    pub async fn ingest(
        &self,
        raw: RawEvent,
        bound_session: Option<&str>,
    ) -> Result<IngestReceipt, DevLensCoreError> {
        let mut event = self.normalizer.normalize(raw, bound_session)?;
        let changelog = self.coordinator.persist(&mut event).await?;

        let solution = if event.kind == EventKind::Error {
            match self.analyzer.analyze(&event).await {
                Ok(suggestion) => Some(suggestion),
                Err(err) => {
                    warn!(
                        "analysis failed, event stored without solution (event_id={}, err={err})",
                        event.id
                    );
                    None
                }
            }
        } else {
            None
        };

        if event.kind == EventKind::SolutionOutcome {
            if let Err(err) = self.record_outcome_event(&event) {
                warn!(
                    "outcome recording failed (event_id={}, err={err})",
                    event.id
                );
            }
        }

        Ok(IngestReceipt {
            event_id: event.id,
            status: IngestStatus::Stored,
            solution,
            changelog,
        })
    }

    /// Ingest a batch of events independently, preserving order.
    pub async fn ingest_bulk(
        &self,
        events: Vec<RawEvent>,
        bound_session: Option<&str>,
    ) -> Vec<Result<IngestReceipt, DevLensCoreError>> {
        let mut receipts = Vec::with_capacity(events.len());
        for raw in events {
            receipts.push(self.ingest(raw, bound_session).await);
        }
        receipts
    }

    /// Record an outcome for a known solution.
    pub fn record_outcome(
        &self,
        solution_id: &str,
        success: bool,
        metrics: Value,
    ) -> Result<OutcomeReceipt, DevLensCoreError> {
        self.outcomes.record(solution_id, success, metrics)
    }

    /// Detect and record the dominant pattern of a session.
    pub async fn detect_patterns(
        &self,
        session_id: &str,
    ) -> Result<Option<PatternFinding>, DevLensCoreError> {
        self.patterns.detect(session_id).await
    }

    /// Build the full changelog report for a session.
    pub fn session_report(&self, session_id: &str) -> Result<SessionReport, DevLensCoreError> {
        self.reporter.report(session_id)
    }

    /// Handle one inbound message for a registered connection.
    ///
    /// Processing failures go back to the submitting connection as error
    /// messages; results fan out to the event's whole session group.
    pub async fn handle_message(&self, connection_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Init {
                session_id,
                source,
                url,
                workspace,
                user_agent,
            } => {
                let is_monitor = source == MONITOR_SOURCE;
                self.registry.bind(
                    connection_id,
                    ConnectionMeta {
                        session_id,
                        source,
                        url,
                        workspace,
                        user_agent,
                    },
                );
                self.registry.send_to(
                    connection_id,
                    ServerMessage::InitAck {
                        connection_id,
                        timestamp: Utc::now(),
                    },
                );
                if is_monitor {
                    self.registry.mark_monitor(connection_id);
                    self.registry.send_to(
                        connection_id,
                        ServerMessage::Sessions {
                            data: self.registry.snapshot(),
                        },
                    );
                }
            }
            ClientMessage::Event { event } => {
                self.handle_event(connection_id, event).await;
            }
            ClientMessage::Bulk { events } => {
                for event in events {
                    self.handle_event(connection_id, event).await;
                }
            }
            ClientMessage::Query { query } => {
                let Some(session_id) = self.registry.session_of(connection_id) else {
                    self.registry.send_to(
                        connection_id,
                        ServerMessage::Error {
                            message: "connection is not bound to a session".to_string(),
                        },
                    );
                    return;
                };
                let result = match query {
                    QueryKind::Patterns => self
                        .detect_patterns(&session_id)
                        .await
                        .map(|finding| serde_json::to_value(finding).unwrap_or(Value::Null)),
                    QueryKind::Changelog => self
                        .session_report(&session_id)
                        .map(|report| serde_json::to_value(report).unwrap_or(Value::Null)),
                };
                match result {
                    Ok(result) => {
                        self.registry
                            .send_to(connection_id, ServerMessage::QueryResult { query, result });
                    }
                    Err(err) => {
                        self.registry.send_to(
                            connection_id,
                            ServerMessage::Error {
                                message: err.to_string(),
                            },
                        );
                    }
                }
            }
        }
    }

    async fn handle_event(&self, connection_id: ConnectionId, raw: RawEvent) {
        let bound_session = self.registry.session_of(connection_id);
        let result = self.ingest(raw, bound_session.as_deref()).await;
        match result {
            Ok(receipt) => {
                let session_id = receipt.changelog.session_id.clone();
                self.registry.broadcast(
                    &session_id,
                    &ServerMessage::EventProcessed {
                        event_id: receipt.event_id.clone(),
                        status: ProcessStatus::Success,
                    },
                );
                if let Some(solution) = receipt.solution {
                    self.registry.broadcast(
                        &session_id,
                        &ServerMessage::Solution {
                            event_id: receipt.event_id,
                            solution,
                        },
                    );
                }
            }
            Err(err) => {
                let message = ServerMessage::Error {
                    message: err.to_string(),
                };
                // The whole session hears about the failure, matching the
                // success fan-out. Unbound submitters get a direct reply.
                match bound_session {
                    Some(session_id) => {
                        self.registry.broadcast(&session_id, &message);
                    }
                    None => {
                        self.registry.send_to(connection_id, message);
                    }
                }
            }
        }
    }

    /// Apply a solution_outcome event's payload to its solution.
    fn record_outcome_event(&self, event: &devlens_protocol::Event) -> Result<(), DevLensCoreError> {
        let fields = event.content.to_map();
        let solution_id = fields
            .get("solution_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DevLensCoreError::InvalidEvent("solution_outcome without solution_id".to_string())
            })?;
        let success = fields
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let metrics = fields
            .get("metrics")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        self.outcomes.record(solution_id, success, metrics)?;
        Ok(())
    }
}

/// Resolve the storage root, defaulting to `~/.devlens`.
pub fn storage_root(config: &StorageConfig) -> PathBuf {
    match &config.root {
        Some(root) => PathBuf::from(root),
        None => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".devlens"))
            .unwrap_or_else(|| PathBuf::from(".devlens")),
    }
}
