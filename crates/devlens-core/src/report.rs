//! Session changelog reporting.

use crate::error::DevLensCoreError;
use devlens_protocol::SessionReport;
use devlens_storage::{GraphStore, RecordStore};
use std::sync::Arc;

/// Builds full changelog reports for a session.
pub struct ChangelogReporter {
    records: Arc<dyn RecordStore>,
    graph: Arc<dyn GraphStore>,
}

impl ChangelogReporter {
    pub fn new(records: Arc<dyn RecordStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { records, graph }
    }

    /// Assemble the report: ordered timeline, pattern counts, and solution
    /// metrics. Unknown sessions report empty, not an error.
    pub fn report(&self, session_id: &str) -> Result<SessionReport, DevLensCoreError> {
        let timeline = self.records.session_timeline(session_id)?;
        let patterns = self.graph.session_patterns(session_id)?;
        let metrics = self.graph.session_metrics(session_id)?;
        Ok(SessionReport {
            session_id: session_id.to_string(),
            event_count: timeline.len(),
            patterns,
            metrics,
            timeline,
        })
    }
}
