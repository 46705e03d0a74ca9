//! Events surfaced to the embedding application.

use mari_proto::{Frame, GatewayInfo};

use crate::config::ConfigurationError;

/// One event delivered to the application callback, in the order the
/// coordinator processed it.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A node joined the network.
    NodeJoined {
        /// The joining node's address.
        address: u64,
    },
    /// A node left the network.
    NodeLeft {
        /// The departing node's address.
        address: u64,
    },
    /// The gateway's identity/schedule snapshot was (re)established.
    GatewayInfo(GatewayInfo),
    /// Application data received from a node (test/stats packets are
    /// filtered out before this is raised).
    NodeData(Frame),
    /// The gateway announced a `schedule_id` outside the schedule table.
    /// The load generator refuses to start against this gateway until a
    /// recognized schedule id arrives.
    ConfigurationError(ConfigurationError),
}
