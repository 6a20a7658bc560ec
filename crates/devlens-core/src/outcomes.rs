//! Records real-world solution outcomes and keeps success rates current.

use crate::error::DevLensCoreError;
use chrono::Utc;
use devlens_protocol::{OutcomeReceipt, OutcomeStatus};
use devlens_storage::{GraphStore, OutcomeRecord, RecordStore};
use log::info;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Appends solution outcomes and recomputes the derived success rate.
pub struct OutcomeRecorder {
    records: Arc<dyn RecordStore>,
    graph: Arc<dyn GraphStore>,
}

impl OutcomeRecorder {
    pub fn new(records: Arc<dyn RecordStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { records, graph }
    }

    /// Record one outcome for a solution.
    ///
    /// The success rate is the mean over every recorded outcome of the
    /// solution, never an increment, so replays converge to the same value.
    /// Unknown solution ids are rejected before anything is written.
    pub fn record(
        &self,
        solution_id: &str,
        success: bool,
        metrics: Value,
    ) -> Result<OutcomeReceipt, DevLensCoreError> {
        if self.records.solution(solution_id)?.is_none() {
            return Err(DevLensCoreError::UnknownSolution(solution_id.to_string()));
        }

        self.graph.append_outcome(&OutcomeRecord {
            id: format!("out_{}", Uuid::new_v4()),
            solution_id: solution_id.to_string(),
            success,
            metrics,
            created_at: Utc::now(),
        })?;

        let outcomes = self.graph.outcomes(solution_id)?;
        let success_rate = success_rate(&outcomes);
        self.records.set_success_rate(solution_id, success_rate)?;
        info!(
            "outcome recorded (solution_id={solution_id}, success={success}, success_rate={success_rate:.3})"
        );
        Ok(OutcomeReceipt {
            status: OutcomeStatus::Recorded,
            success_rate,
        })
    }
}

/// Mean success over a set of outcomes; an empty set rates 0.0.
fn success_rate(outcomes: &[OutcomeRecord]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let successes = outcomes.iter().filter(|outcome| outcome.success).count();
    successes as f64 / outcomes.len() as f64
}
