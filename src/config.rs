//! Demo parameters, loadable from TOML.
//!
//! Every field has a default equal to the reference run, so an empty file (or
//! no file at all) reproduces it exactly:
//!
//! ```toml
//! [race]
//! threads = 4
//! increments = 100
//! max_threads = 1024
//!
//! [pipeline]
//! items = 50
//! capacity = 100
//! consumers = 3
//! produce_delay_ms = 50
//! consume_latency_ms = 100
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub race: RaceDefaults,
    pub pipeline: PipelineConfig,
}

/// Fallbacks used when a race-condition prompt answer is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaceDefaults {
    pub threads: usize,
    pub increments: u64,
    /// Thread counts above this are treated as unusable answers.
    pub max_threads: usize,
}

impl Default for RaceDefaults {
    fn default() -> Self {
        Self {
            threads: 4,
            increments: 100,
            max_threads: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub items: u64,
    pub capacity: usize,
    pub consumers: usize,
    pub produce_delay_ms: u64,
    pub consume_latency_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            items: 50,
            capacity: 100,
            consumers: 3,
            produce_delay_ms: 50,
            consume_latency_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn produce_delay(&self) -> Duration {
        Duration::from_millis(self.produce_delay_ms)
    }

    pub fn consume_latency(&self) -> Duration {
        Duration::from_millis(self.consume_latency_ms)
    }
}

impl DemoConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DemoConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.capacity == 0 {
            return Err(ConfigError::invalid("pipeline.capacity", "must be at least 1"));
        }
        if self.pipeline.consumers == 0 {
            return Err(ConfigError::invalid("pipeline.consumers", "must be at least 1"));
        }
        if self.race.threads == 0 {
            return Err(ConfigError::invalid("race.threads", "must be at least 1"));
        }
        if self.race.increments == 0 {
            return Err(ConfigError::invalid("race.increments", "must be at least 1"));
        }
        if self.race.max_threads < self.race.threads {
            return Err(ConfigError::invalid(
                "race.max_threads",
                format!("must be at least race.threads ({})", self.race.threads),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = DemoConfig::default();
        assert_eq!(config.pipeline.items, 50);
        assert_eq!(config.pipeline.capacity, 100);
        assert_eq!(config.pipeline.consumers, 3);
        assert_eq!(config.pipeline.produce_delay(), Duration::from_millis(50));
        assert_eq!(config.pipeline.consume_latency(), Duration::from_millis(100));
        assert_eq!(config.race.threads, 4);
        assert_eq!(config.race.increments, 100);
        assert_eq!(config.race.max_threads, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DemoConfig::from_toml_str("").unwrap(), DemoConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = DemoConfig::from_toml_str(
            r#"
            [pipeline]
            items = 5
            capacity = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.items, 5);
        assert_eq!(config.pipeline.capacity, 2);
        assert_eq!(config.pipeline.consumers, 3);
        assert_eq!(config.race, RaceDefaults::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = DemoConfig::from_toml_str("[pipeline]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "pipeline.capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_thread_limit_below_fallback_rejected() {
        let err =
            DemoConfig::from_toml_str("[race]\nthreads = 8\nmax_threads = 4\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "race.max_threads",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DemoConfig::from_toml_str("[pipeline]\nworkers = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[race]\nthreads = 8").unwrap();

        let config = DemoConfig::load(file.path()).unwrap();
        assert_eq!(config.race.threads, 8);
    }

    #[test]
    fn test_missing_file() {
        let err = DemoConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
