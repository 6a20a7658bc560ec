//! End-to-end pipeline tests over in-memory storage facets.

use devlens_config::DevLensConfig;
use devlens_core::{EventRouter, spawn_connection};
use devlens_protocol::{
    ClientMessage, Oracle, ProcessStatus, QueryKind, RawEvent, ServerMessage,
};
use devlens_storage::{
    JsonlStreamStore, RecordStore, SqliteGraphStore, SqliteRecordStore, StreamStore,
};
use devlens_test_utils::{FailingOracle, FixedEmbedder, FixedOracle, StalledOracle};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;

struct Fixture {
    router: Arc<EventRouter>,
    stream: Arc<JsonlStreamStore>,
    records: Arc<SqliteRecordStore>,
    _temp: TempDir,
}

fn fixture(oracle: Arc<dyn Oracle>) -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let stream = Arc::new(JsonlStreamStore::new(temp.path()).expect("stream"));
    let records = Arc::new(SqliteRecordStore::open_in_memory().expect("records"));
    let graph = Arc::new(SqliteGraphStore::open_in_memory().expect("graph"));
    let router = Arc::new(EventRouter::new(
        &DevLensConfig::default(),
        stream.clone(),
        records.clone(),
        graph,
        oracle,
        Arc::new(FixedEmbedder::new(8)),
    ));
    Fixture {
        router,
        stream,
        records,
        _temp: temp,
    }
}

fn init(session_id: &str, source: &str) -> ClientMessage {
    ClientMessage::Init {
        session_id: Some(session_id.to_string()),
        source: source.to_string(),
        url: None,
        workspace: None,
        user_agent: None,
    }
}

fn raw_event(kind: &str, content: Value) -> RawEvent {
    RawEvent {
        kind: kind.to_string(),
        session_id: None,
        content: content.as_object().cloned().unwrap_or_else(Map::new),
        stack_trace: None,
        context: Map::new(),
    }
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn error_event_reaches_every_facet_and_observer() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let producer = router.connect(tx1);
    let observer = router.connect(tx2);
    router.handle_message(producer, init("s1", "browser")).await;
    router.handle_message(observer, init("s1", "editor")).await;
    drain(&mut rx1);
    drain(&mut rx2);

    router
        .handle_message(
            producer,
            ClientMessage::Event {
                event: raw_event("error", json!({ "message": "boom" })),
            },
        )
        .await;

    for rx in [&mut rx1, &mut rx2] {
        let messages = drain(rx);
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            ServerMessage::EventProcessed { status, .. } => {
                assert_eq!(*status, ProcessStatus::Success);
            }
            other => panic!("expected event_processed, got {other:?}"),
        }
        match &messages[1] {
            ServerMessage::Solution { solution, .. } => {
                assert_eq!(solution.confidence, 0.8);
            }
            other => panic!("expected solution, got {other:?}"),
        }
    }

    let timeline = fixture.records.session_timeline("s1").expect("timeline");
    assert_eq!(timeline.len(), 1);
    assert_eq!(fixture.stream.tail("s1", 10).expect("tail").len(), 1);
}

#[tokio::test]
async fn receipts_carry_solutions_only_for_error_events() {
    let fixture = fixture(Arc::new(FixedOracle::new()));

    let receipt = fixture
        .router
        .ingest(raw_event("log", json!({ "message": "hello" })), Some("s1"))
        .await
        .expect("ingest log");
    assert_eq!(receipt.solution, None);
    let encoded = serde_json::to_value(&receipt).expect("serialize");
    assert_eq!(encoded["status"], json!("stored"));
    assert_eq!(encoded.get("solution"), None);

    let mut raw = raw_event(
        "error",
        json!({ "message": "TypeError: x is undefined" }),
    );
    raw.stack_trace = Some("at render (app.js:10)".to_string());
    let receipt = fixture
        .router
        .ingest(raw, Some("s1"))
        .await
        .expect("ingest error");
    let solution = receipt.solution.expect("solution");
    assert!((0.0..=1.0).contains(&solution.confidence));
    assert_eq!(
        receipt.changelog.hash,
        devlens_protocol::fingerprint(&receipt.changelog.content)
    );
}

#[tokio::test]
async fn analysis_failure_keeps_the_event_stored() {
    let fixture = fixture(Arc::new(FailingOracle::new("oracle down")));
    let router = &fixture.router;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let producer = router.connect(tx);
    router.handle_message(producer, init("s1", "browser")).await;
    drain(&mut rx);

    router
        .handle_message(
            producer,
            ClientMessage::Event {
                event: raw_event("error", json!({ "message": "boom" })),
            },
        )
        .await;

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], ServerMessage::EventProcessed { .. }));
    assert_eq!(
        fixture.records.session_timeline("s1").expect("timeline").len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn oracle_timeouts_degrade_like_failures() {
    let fixture = fixture(Arc::new(StalledOracle));
    let receipt = fixture
        .router
        .ingest(raw_event("error", json!({ "message": "boom" })), Some("s1"))
        .await
        .expect("ingest");
    assert_eq!(receipt.solution, None);
    assert_eq!(
        fixture.records.session_timeline("s1").expect("timeline").len(),
        1
    );
}

#[tokio::test]
async fn solution_outcomes_update_the_success_rate() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let receipt = router
        .ingest(raw_event("error", json!({ "message": "boom" })), Some("s1"))
        .await
        .expect("ingest error");
    let solution_id = format!("sol_{}", receipt.event_id);

    router
        .ingest(
            raw_event(
                "solution_outcome",
                json!({ "solution_id": solution_id, "success": true }),
            ),
            Some("s1"),
        )
        .await
        .expect("ingest outcome");
    router
        .ingest(
            raw_event(
                "solution_outcome",
                json!({ "solution_id": solution_id, "success": false }),
            ),
            Some("s1"),
        )
        .await
        .expect("ingest outcome");

    let stored = fixture
        .records
        .solution(&solution_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.success_rate, 0.5);
}

#[tokio::test]
async fn processing_failures_broadcast_to_the_whole_session() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let producer = router.connect(tx1);
    let observer = router.connect(tx2);
    router.handle_message(producer, init("s1", "browser")).await;
    router.handle_message(observer, init("s1", "editor")).await;
    drain(&mut rx1);
    drain(&mut rx2);

    router
        .handle_message(
            producer,
            ClientMessage::Event {
                event: raw_event("explosion", json!({})),
            },
        )
        .await;

    for rx in [&mut rx1, &mut rx2] {
        let messages = drain(rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::Error { message } => assert!(message.contains("unknown kind")),
            other => panic!("expected error, got {other:?}"),
        }
    }
    assert_eq!(
        fixture.records.session_timeline("s1").expect("timeline").len(),
        0
    );
}

#[tokio::test]
async fn unbound_submitters_get_a_direct_error_reply() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = fixture.router.connect(tx);

    fixture
        .router
        .handle_message(
            connection,
            ClientMessage::Event {
                event: raw_event("log", json!({ "message": "hello" })),
            },
        )
        .await;

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        ServerMessage::Error { message } => assert!(message.contains("no session id")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn monitor_connections_get_ack_and_snapshot() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let producer = router.connect(tx1);
    router.handle_message(producer, init("s1", "browser")).await;
    drain(&mut rx1);

    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let monitor = router.connect(tx2);
    router
        .handle_message(
            monitor,
            ClientMessage::Init {
                session_id: None,
                source: "monitor".to_string(),
                url: None,
                workspace: None,
                user_agent: None,
            },
        )
        .await;

    let messages = drain(&mut rx2);
    assert_eq!(messages.len(), 2);
    match &messages[0] {
        ServerMessage::InitAck { connection_id, .. } => assert_eq!(*connection_id, monitor),
        other => panic!("expected init_ack, got {other:?}"),
    }
    match &messages[1] {
        ServerMessage::Sessions { data } => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].id, "s1");
            assert_eq!(data[0].connections.len(), 1);
        }
        other => panic!("expected sessions, got {other:?}"),
    }
}

#[tokio::test]
async fn changelog_query_returns_the_session_report() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let producer = router.connect(tx);
    router.handle_message(producer, init("s1", "browser")).await;
    drain(&mut rx);

    router
        .handle_message(
            producer,
            ClientMessage::Bulk {
                events: vec![
                    raw_event("log", json!({ "message": "one" })),
                    raw_event("log", json!({ "message": "two" })),
                ],
            },
        )
        .await;
    drain(&mut rx);

    router
        .handle_message(
            producer,
            ClientMessage::Query {
                query: QueryKind::Changelog,
            },
        )
        .await;

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        ServerMessage::QueryResult { query, result } => {
            assert_eq!(*query, QueryKind::Changelog);
            assert_eq!(result["session_id"], json!("s1"));
            assert_eq!(result["event_count"], json!(2));
        }
        other => panic!("expected query_result, got {other:?}"),
    }
}

#[tokio::test]
async fn pattern_query_records_a_sighting() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let router = &fixture.router;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let producer = router.connect(tx);
    router.handle_message(producer, init("s1", "browser")).await;
    router
        .handle_message(
            producer,
            ClientMessage::Event {
                event: raw_event("log", json!({ "message": "clicked retry" })),
            },
        )
        .await;
    drain(&mut rx);

    router
        .handle_message(
            producer,
            ClientMessage::Query {
                query: QueryKind::Patterns,
            },
        )
        .await;

    let messages = drain(&mut rx);
    match &messages[0] {
        ServerMessage::QueryResult { result, .. } => {
            assert_eq!(result["pattern"], json!("retry-loop"));
        }
        other => panic!("expected query_result, got {other:?}"),
    }

    let report = fixture.router.session_report("s1").expect("report");
    assert_eq!(report.patterns.get("smell:retry-loop"), Some(&1));
}

#[tokio::test]
async fn unbound_queries_are_rejected() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = fixture.router.connect(tx);
    fixture
        .router
        .handle_message(
            connection,
            ClientMessage::Query {
                query: QueryKind::Changelog,
            },
        )
        .await;
    let messages = drain(&mut rx);
    assert!(matches!(messages[0], ServerMessage::Error { .. }));
}

#[tokio::test]
async fn closing_the_inbound_channel_unregisters_the_connection() {
    let fixture = fixture(Arc::new(FixedOracle::new()));
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (connection_id, handle) =
        spawn_connection(fixture.router.clone(), inbound_rx, outbound_tx);
    assert_eq!(fixture.router.registry().connection_count(), 1);

    inbound_tx
        .send(init("s1", "browser"))
        .expect("send init");
    drop(inbound_tx);
    handle.await.expect("connection task");

    assert_eq!(fixture.router.registry().connection_count(), 0);
    assert_eq!(fixture.router.registry().session_of(connection_id), None);
    assert!(matches!(
        outbound_rx.try_recv(),
        Ok(ServerMessage::InitAck { .. })
    ));
}
