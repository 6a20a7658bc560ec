//! Coordinates writes across the three storage facets.

use crate::error::DevLensCoreError;
use devlens_protocol::{ChangelogEntry, Embedder, Event};
use devlens_storage::{GraphStore, RecordStore, StreamStore};
use log::{debug, warn};
use std::sync::Arc;

/// Persists accepted events across the stream, record, and graph facets.
///
/// Writes are not transactional: each facet is attempted regardless of the
/// others, nothing is rolled back, and only a record store failure fails
/// the operation. A broken tail file or graph write never loses the
/// durable record, and a failed durable insert still leaves the stream and
/// graph entries behind.
pub struct PersistenceCoordinator {
    stream: Arc<dyn StreamStore>,
    records: Arc<dyn RecordStore>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
}

impl PersistenceCoordinator {
    pub fn new(
        stream: Arc<dyn StreamStore>,
        records: Arc<dyn RecordStore>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            stream,
            records,
            graph,
            embedder,
        }
    }

    /// Persist one event, attaching an embedding first.
    ///
    /// A failed embedding is logged and skipped; the event persists without
    /// one and stays invisible to similarity search. Facet order: stream
    /// append, record insert, graph upsert.
    pub async fn persist(&self, event: &mut Event) -> Result<ChangelogEntry, DevLensCoreError> {
        if event.embedding.is_none() {
            match self.embedder.embed(&event.embedding_text()).await {
                Ok(embedding) => event.embedding = Some(embedding),
                Err(err) => {
                    warn!(
                        "embedding failed, storing without one (event_id={}, err={err})",
                        event.id
                    );
                }
            }
        }

        let changelog = event.to_changelog();
        if let Err(err) = self.stream.append(&changelog) {
            warn!(
                "stream facet write failed (event_id={}, err={err})",
                event.id
            );
        }
        let inserted = self.records.insert_event(event, &changelog);
        if let Err(err) = self.graph.upsert_event(event) {
            warn!(
                "graph facet write failed (event_id={}, err={err})",
                event.id
            );
        }
        inserted?;
        debug!(
            "event persisted (event_id={}, session_id={}, kind={})",
            event.id, event.session_id, event.kind
        );
        Ok(changelog)
    }
}
