//! Configuration schema for DevLens.

use serde::{Deserialize, Serialize};

/// Root config for the DevLens pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DevLensConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl DevLensConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> DevLensConfigBuilder {
        DevLensConfigBuilder::new()
    }
}

/// Builder for assembling a `DevLensConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct DevLensConfigBuilder {
    config: DevLensConfig,
}

impl DevLensConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: DevLensConfig::default(),
        }
    }

    /// Replace the storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Replace the analyzer configuration.
    pub fn analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.config.analyzer = analyzer;
        self
    }

    /// Replace the embedding configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the session monitor configuration.
    pub fn monitor(mut self, monitor: MonitorConfig) -> Self {
        self.config.monitor = monitor;
        self
    }

    /// Finalize and return the built `DevLensConfig`.
    pub fn build(self) -> DevLensConfig {
        self.config
    }
}

/// Locations for the three storage facets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all facets; defaults to `~/.devlens` when unset.
    #[serde(default)]
    pub root: Option<String>,
    /// Stream facet directory name under the root.
    #[serde(default = "default_stream_dir")]
    pub stream_dir: String,
    /// Relational facet database filename under the root.
    #[serde(default = "default_records_file")]
    pub records_file: String,
    /// Graph facet database filename under the root.
    #[serde(default = "default_graph_file")]
    pub graph_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            stream_dir: default_stream_dir(),
            records_file: default_records_file(),
            graph_file: default_graph_file(),
        }
    }
}

fn default_stream_dir() -> String {
    "stream".to_string()
}

fn default_records_file() -> String {
    "records.db".to_string()
}

fn default_graph_file() -> String {
    "graph.db".to_string()
}

/// Tuning for error analysis and pattern detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum similar past errors retrieved per analysis.
    #[serde(default = "default_similar_cases")]
    pub similar_cases: usize,
    /// Recent session events used as rolling context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Recent session events batched for pattern detection.
    #[serde(default = "default_pattern_window")]
    pub pattern_window: usize,
    /// Seconds allowed for one oracle call.
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            similar_cases: default_similar_cases(),
            context_window: default_context_window(),
            pattern_window: default_pattern_window(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

fn default_similar_cases() -> usize {
    5
}

fn default_context_window() -> usize {
    10
}

fn default_pattern_window() -> usize {
    50
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Fixed dimension for event embeddings.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

/// Session monitor push settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between session snapshot pushes to monitor connections.
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval_secs(),
        }
    }
}

fn default_monitor_interval_secs() -> u64 {
    5
}
