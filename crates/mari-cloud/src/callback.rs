//! Events surfaced to the embedding cloud application.

use mari_proto::{Frame, GatewayInfo};

/// One event delivered to the application callback, in the order the
/// coordinator processed it. Every variant carries the owning gateway's
/// address, since the cloud side multiplexes many gateways.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudEvent {
    /// A gateway's identity/schedule snapshot was (re)established.
    GatewayInfo {
        /// The reporting gateway's address.
        gateway_address: u64,
        /// The decoded snapshot.
        info: GatewayInfo,
    },
    /// A node joined one of the tracked gateways.
    NodeJoined {
        /// The owning gateway's address.
        gateway_address: u64,
        /// The joining node's address.
        node_address: u64,
    },
    /// A node left one of the tracked gateways.
    NodeLeft {
        /// The owning gateway's address.
        gateway_address: u64,
        /// The departing node's address.
        node_address: u64,
    },
    /// Application data forwarded from a gateway.
    NodeData {
        /// The owning gateway's address.
        gateway_address: u64,
        /// The forwarded frame.
        frame: Frame,
    },
}
