//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::histo::{DateBinConfig, DateBinType};
use crate::index::IndexConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub histogram: HistogramConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Histogram (bucketing) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HistogramConfig {
    #[serde(default = "default_bin_type")]
    pub bin_type: DateBinType,

    #[serde(default = "default_invalid_label")]
    pub invalid_label: String,

    /// Count timeless records in a separate bin
    #[serde(default)]
    pub include_timeless: bool,
}

fn default_bin_type() -> DateBinType {
    DateBinType::Day
}

fn default_invalid_label() -> String {
    DateBinConfig::default().invalid_label
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_type: default_bin_type(),
            invalid_label: default_invalid_label(),
            include_timeless: false,
        }
    }
}

impl HistogramConfig {
    /// Settings for a `DateBinMethod`
    pub fn bin_config(&self) -> DateBinConfig {
        DateBinConfig {
            bin_type: self.bin_type,
            invalid_label: self.invalid_label.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("timecube").join("config.toml")),
            Some(PathBuf::from("/etc/timecube/config.toml")),
            Some(PathBuf::from("./timecube.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Index overrides
        if let Ok(holds) = std::env::var("TIMECUBE_HOLDS_ACTIVE") {
            if let Ok(h) = holds.parse() {
                self.index.holds_active = h;
            }
        }
        if let Ok(batch) = std::env::var("TIMECUBE_BATCH_SIZE") {
            if let Ok(b) = batch.parse() {
                self.index.batch_size = b;
            }
        }

        // Histogram overrides
        if let Ok(bin_type) = std::env::var("TIMECUBE_BIN_TYPE") {
            match bin_type.parse() {
                Ok(t) => self.histogram.bin_type = t,
                Err(e) => tracing::warn!("Ignoring TIMECUBE_BIN_TYPE: {}", e),
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("TIMECUBE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TIMECUBE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Timecube Configuration
#
# Environment variables override these settings:
# - TIMECUBE_HOLDS_ACTIVE
# - TIMECUBE_BATCH_SIZE
# - TIMECUBE_BIN_TYPE
# - TIMECUBE_LOG_LEVEL
# - TIMECUBE_LOG_FORMAT

[index]
# Keep timeless records visible in every time window (needs a hold accessor)
holds_active = false

# Records added per batch during bulk loads
batch_size = 10000

# Result limit when a query names none
# default_limit = 100

[histogram]
# unique, minute, minute-of-hour, hour, hour-of-day, hour-of-week,
# hour-of-month, hour-of-year, day, day-of-week, day-of-month, day-of-year,
# week, month, month-of-year, year
bin_type = "day"

# Label of records without a usable time
invalid_label = "Invalid Date"

# Count timeless records in their own bin
include_timeless = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/timecube/timecube.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();

        assert!(!config.index.holds_active);
        assert_eq!(config.index.batch_size, 10_000);
        assert_eq!(config.histogram.bin_type, DateBinType::Day);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[histogram]\nbin_type = \"hour-of-day\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.histogram.bin_type, DateBinType::HourOfDay);
        assert_eq!(config.histogram.bin_config().invalid_label, "Invalid Date");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/timecube.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[histogram]\nbin_type = \"fortnight\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }
}
