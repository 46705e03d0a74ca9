//! Edge coordinator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
}

/// Edge coordinator configuration, loadable from TOML/JSON by an external
/// CLI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Serial device path (e.g. `/dev/ttyACM0`).
    pub serial_port: String,
    /// Serial baud rate.
    pub baudrate: u32,
    /// Broker connection, if uplink/downlink republishing is enabled.
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
    /// Network id this gateway is expected to operate on.
    pub network_id: u16,
    /// Load generator target, as a percentage of the schedule's maximum
    /// downlink rate. `0` disables the load generator.
    #[serde(default)]
    pub load_percent: u8,
    /// Whether the latency probe engine is enabled.
    #[serde(default)]
    pub latency_probe_enabled: bool,
    /// Directory for the metrics sink's JSON-lines log, if any.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Broker topic prefix (default `"mari"`).
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_topic_prefix() -> String {
    "mari".to_string()
}

impl EdgeConfig {
    /// Validates the configuration, returning the first violation found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::LoadPercentOutOfRange`] if
    /// `load_percent` exceeds 100.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.load_percent > 100 {
            return Err(ConfigurationError::LoadPercentOutOfRange { value: self.load_percent });
        }
        Ok(())
    }
}

/// Configuration validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `load_percent` was outside `[0, 100]`.
    #[error("load_percent must be in [0, 100], got {value}")]
    LoadPercentOutOfRange {
        /// The offending value.
        value: u8,
    },

    /// The configured schedule id has no entry in the schedule table.
    #[error("unknown schedule id {id}")]
    UnknownScheduleId {
        /// The unrecognized schedule id.
        id: u8,
    },
}
