//! Configuration for the configuration engine

use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Identifier of the user's config source (usually its file path)
    #[serde(default = "default_main_source")]
    pub main_source: String,

    /// Quiet period before pending user settings are saved (milliseconds)
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Drop user values equal to their default after a schema change
    #[serde(default = "default_true")]
    pub prune_on_schema_change: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            main_source: default_main_source(),
            save_debounce_ms: default_save_debounce_ms(),
            prune_on_schema_change: true,
        }
    }
}

impl StoreConfig {
    /// Parse a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid config_engine configuration")
    }

    pub fn with_main_source(mut self, main_source: impl Into<String>) -> Self {
        self.main_source = main_source.into();
        self
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

fn default_main_source() -> String {
    "user".to_string()
}

fn default_save_debounce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.main_source, "user");
        assert_eq!(config.save_debounce(), Duration::from_millis(100));
        assert!(config.prune_on_schema_change);
    }

    #[test]
    fn test_from_yaml_fills_missing_fields() {
        let config = StoreConfig::from_yaml_str("main_source: /home/me/.app/config.json\n")
            .unwrap_or_default();
        assert_eq!(config.main_source, "/home/me/.app/config.json");
        assert_eq!(config.save_debounce_ms, 100);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields() {
        let err = StoreConfig::from_yaml_str("save_debounce_ms: 5\nretries: 3\n");
        assert!(err.is_err());
    }
}
