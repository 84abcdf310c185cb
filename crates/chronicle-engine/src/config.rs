//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `chronicle-config.yaml` at the
//! project root. This module defines strongly-typed structs mirroring the
//! YAML structure, with a loader that reads and validates the file. All
//! trigger thresholds and guard ceilings are configuration, not hard-coded
//! contracts -- though the trigger semantics (count bar applies to timer
//! flushes too) are fixed in code.

use std::path::Path;

use serde::Deserialize;

use chronicle_bus::BusLimits;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Aggregator trigger settings.
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Bus guard ceilings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Aggregator trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerConfig {
    /// Buffered events at Major/Catastrophic impact required before a
    /// flush calls the generation port. Applies to timer flushes too.
    #[serde(default = "default_severe_event_threshold")]
    pub severe_event_threshold: usize,

    /// Seconds between periodic flush attempts.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Maximum recent events pulled into a beat's generation context.
    #[serde(default = "default_recent_event_limit")]
    pub recent_event_limit: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            severe_event_threshold: default_severe_event_threshold(),
            flush_interval_secs: default_flush_interval_secs(),
            recent_event_limit: default_recent_event_limit(),
        }
    }
}

/// Bus guard ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Hop ceiling; a publish at or above this is rejected.
    #[serde(default = "default_max_hops")]
    pub max_hops: u8,

    /// Serialized payload ceiling in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl BusConfig {
    /// Convert into the bus's limits struct.
    pub const fn limits(&self) -> BusLimits {
        BusLimits {
            max_hops: self.max_hops,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_severe_event_threshold() -> usize {
    3
}

const fn default_flush_interval_secs() -> u64 {
    60
}

const fn default_recent_event_limit() -> usize {
    50
}

const fn default_max_hops() -> u8 {
    10
}

const fn default_max_payload_bytes() -> usize {
    32 * 1024
}

fn default_log_level() -> String {
    "info".to_owned()
}
