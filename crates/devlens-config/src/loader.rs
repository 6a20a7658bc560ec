//! Config loading with JSON5 parsing and override merging.

use crate::{ConfigError, DevLensConfig};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::Path;

impl DevLensConfig {
    /// Load a single config from a path.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a single config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value)
    }

    /// Load a config from a path and apply runtime override files in order.
    ///
    /// Later overrides win; objects merge recursively, scalars replace.
    pub fn load_with_overrides(
        path: impl AsRef<Path>,
        overrides: &[impl AsRef<Path>],
    ) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let mut merged: Value = json5::from_str(&contents)?;
        for override_path in overrides {
            let override_path = override_path.as_ref();
            debug!("applying config override: {}", override_path.display());
            let contents = fs::read_to_string(override_path)?;
            let overlay: Value = json5::from_str(&contents)?;
            merge_json_values(&mut merged, &overlay);
        }
        info!("config loaded (overrides={})", overrides.len());
        config_from_value(merged)
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        if self.analyzer.similar_cases == 0 {
            return Err(ConfigError::Invalid(
                "analyzer similar_cases must be non-zero".to_string(),
            ));
        }
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor interval_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_from_value(value: Value) -> Result<DevLensConfig, ConfigError> {
    let config: DevLensConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

/// Merge overlay values into the base, recursively overriding objects.
fn merge_json_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::DevLensConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = DevLensConfig::load_from_str("{}").expect("load");
        assert_eq!(config.analyzer.similar_cases, 5);
        assert_eq!(config.analyzer.context_window, 10);
        assert_eq!(config.analyzer.pattern_window, 50);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.monitor.interval_secs, 5);
        assert_eq!(config.storage.records_file, "records.db");
    }

    #[test]
    fn json5_comments_and_trailing_commas_parse() {
        let config = DevLensConfig::load_from_str(
            r#"{
                // tighter analysis window
                analyzer: { context_window: 4, },
            }"#,
        )
        .expect("load");
        assert_eq!(config.analyzer.context_window, 4);
        assert_eq!(config.analyzer.similar_cases, 5);
    }

    #[test]
    fn overrides_merge_recursively() {
        let temp = tempdir().expect("tempdir");
        let base = temp.path().join("devlens.json5");
        let overlay = temp.path().join("override.json5");
        fs::write(&base, r#"{ analyzer: { similar_cases: 3 }, monitor: { interval_secs: 2 } }"#)
            .expect("write base");
        fs::write(&overlay, r#"{ analyzer: { context_window: 7 } }"#).expect("write overlay");

        let config = DevLensConfig::load_with_overrides(&base, &[overlay]).expect("load");
        assert_eq!(config.analyzer.similar_cases, 3);
        assert_eq!(config.analyzer.context_window, 7);
        assert_eq!(config.monitor.interval_secs, 2);
    }

    #[test]
    fn zero_dimension_fails_validation() {
        let err = DevLensConfig::load_from_str(r#"{ embedding: { dimension: 0 } }"#)
            .expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "invalid config: embedding dimension must be non-zero"
        );
    }
}
