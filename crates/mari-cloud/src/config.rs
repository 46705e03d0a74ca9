//! Cloud coordinator configuration.

use serde::{Deserialize, Serialize};

/// Broker connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
}

/// Cloud coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Broker connection. Unlike the edge side, the cloud coordinator has
    /// no other transport, so this is not optional.
    pub broker: BrokerConfig,
    /// Network id this coordinator listens for.
    pub network_id: u16,
    /// Broker topic prefix (default `"mari"`).
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

fn default_topic_prefix() -> String {
    "mari".to_string()
}
