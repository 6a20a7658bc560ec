//! Deterministic oracle stubs for pipeline tests.

use async_trait::async_trait;
use devlens_protocol::{
    ChangelogEntry, ErrorContext, Oracle, OracleError, PatternFinding, PatternKind,
    SolutionSuggestion,
};
use parking_lot::Mutex;

fn default_solution() -> SolutionSuggestion {
    SolutionSuggestion {
        root_cause: "variable used before declaration".to_string(),
        solution_code: "let value = 0;".to_string(),
        explanation: "declare the variable before first use".to_string(),
        confidence: 0.8,
        similar_cases: Vec::new(),
        pattern_name: None,
    }
}

fn default_pattern() -> PatternFinding {
    PatternFinding {
        pattern: "retry-loop".to_string(),
        kind: PatternKind::Smell,
        description: "tight retry loop without backoff".to_string(),
    }
}

/// Oracle that always answers with fixed, configurable responses.
pub struct FixedOracle {
    solution: SolutionSuggestion,
    pattern: PatternFinding,
}

impl FixedOracle {
    pub fn new() -> Self {
        Self {
            solution: default_solution(),
            pattern: default_pattern(),
        }
    }

    pub fn with_solution(mut self, solution: SolutionSuggestion) -> Self {
        self.solution = solution;
        self
    }

    pub fn with_pattern(mut self, pattern: PatternFinding) -> Self {
        self.pattern = pattern;
        self
    }
}

impl Default for FixedOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for FixedOracle {
    async fn analyze_error(
        &self,
        _context: &ErrorContext,
    ) -> Result<SolutionSuggestion, OracleError> {
        Ok(self.solution.clone())
    }

    async fn classify_pattern(
        &self,
        _events: &[ChangelogEntry],
    ) -> Result<PatternFinding, OracleError> {
        Ok(self.pattern.clone())
    }
}

/// Oracle that fails every call with a provider error.
pub struct FailingOracle {
    message: String,
}

impl FailingOracle {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Oracle for FailingOracle {
    async fn analyze_error(
        &self,
        _context: &ErrorContext,
    ) -> Result<SolutionSuggestion, OracleError> {
        Err(OracleError::Provider(self.message.clone()))
    }

    async fn classify_pattern(
        &self,
        _events: &[ChangelogEntry],
    ) -> Result<PatternFinding, OracleError> {
        Err(OracleError::Provider(self.message.clone()))
    }
}

/// Oracle that records every request and answers with fixed responses.
pub struct RecordingOracle {
    inner: FixedOracle,
    error_contexts: Mutex<Vec<ErrorContext>>,
    pattern_batches: Mutex<Vec<Vec<ChangelogEntry>>>,
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self {
            inner: FixedOracle::new(),
            error_contexts: Mutex::new(Vec::new()),
            pattern_batches: Mutex::new(Vec::new()),
        }
    }

    /// Contexts passed to `analyze_error`, in call order.
    pub fn error_contexts(&self) -> Vec<ErrorContext> {
        self.error_contexts.lock().clone()
    }

    /// Event batches passed to `classify_pattern`, in call order.
    pub fn pattern_batches(&self) -> Vec<Vec<ChangelogEntry>> {
        self.pattern_batches.lock().clone()
    }
}

impl Default for RecordingOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for RecordingOracle {
    async fn analyze_error(
        &self,
        context: &ErrorContext,
    ) -> Result<SolutionSuggestion, OracleError> {
        self.error_contexts.lock().push(context.clone());
        self.inner.analyze_error(context).await
    }

    async fn classify_pattern(
        &self,
        events: &[ChangelogEntry],
    ) -> Result<PatternFinding, OracleError> {
        self.pattern_batches.lock().push(events.to_vec());
        self.inner.classify_pattern(events).await
    }
}

/// Oracle that never answers; pairs with paused-time tests of deadlines.
pub struct StalledOracle;

#[async_trait]
impl Oracle for StalledOracle {
    async fn analyze_error(
        &self,
        _context: &ErrorContext,
    ) -> Result<SolutionSuggestion, OracleError> {
        std::future::pending().await
    }

    async fn classify_pattern(
        &self,
        _events: &[ChangelogEntry],
    ) -> Result<PatternFinding, OracleError> {
        std::future::pending().await
    }
}
