//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stash_core::CacheConfig;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synthetic workload driven against the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of writer tasks
    #[serde(default = "default_writers")]
    pub writers: usize,
    /// Number of reader tasks
    #[serde(default = "default_readers")]
    pub readers: usize,
    /// Keys are drawn from `key-0 .. key-{key_space}`
    #[serde(default = "default_key_space")]
    pub key_space: usize,
    /// Pause between operations of a single task, in milliseconds
    #[serde(default = "default_op_delay_ms")]
    pub op_delay_ms: u64,
    /// How long to run before shutting down (0 = until Ctrl+C)
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Interval between progress reports
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            readers: default_readers(),
            key_space: default_key_space(),
            op_delay_ms: default_op_delay_ms(),
            duration_secs: default_duration_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: "pretty".to_string(),
        }
    }
}

// Default value functions
fn default_writers() -> usize {
    4
}

fn default_readers() -> usize {
    8
}

fn default_key_space() -> usize {
    1_000
}

fn default_op_delay_ms() -> u64 {
    1
}

fn default_duration_secs() -> u64 {
    30
}

fn default_report_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        // Check if config file exists
        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.normalize();

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Clamp values that would make the workload meaningless
    fn normalize(&mut self) {
        if self.workload.key_space == 0 {
            warn!("workload.key_space must be positive, using {}", default_key_space());
            self.workload.key_space = default_key_space();
        }
        if self.workload.report_interval_secs == 0 {
            warn!(
                "workload.report_interval_secs must be positive, using {}",
                default_report_interval_secs()
            );
            self.workload.report_interval_secs = default_report_interval_secs();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::Ttl;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.workload.writers, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_sections() {
        let file = write_config(
            r#"
            [cache]
            default_ttl = "2s"
            cleanup_interval_ms = 500

            [workload]
            writers = 2
            key_space = 10

            [logging]
            level = "debug"
            format = "json"
            "#,
        );

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.cache.default_ttl, Ttl::from_secs(2));
        assert_eq!(config.cache.cleanup_interval_ms, 500);
        assert_eq!(config.workload.writers, 2);
        assert_eq!(config.workload.readers, 8);
        assert_eq!(config.workload.key_space, 10);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_zero_key_space_is_clamped() {
        let file = write_config("[workload]\nkey_space = 0\nreport_interval_secs = 0\n");

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.workload.key_space, 1_000);
        assert_eq!(config.workload.report_interval_secs, 5);
    }

    #[test]
    fn test_invalid_ttl_is_an_error() {
        let file = write_config("[cache]\ndefault_ttl = \"whenever\"\n");
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
