//! `Gateway`: the radio device attached over UART, its node registry, and
//! its own aggregate statistics.

use std::{collections::HashMap, time::Instant};

use mari_proto::{Frame, GatewayInfo};

use crate::{latency::LatencyStats, node::Node, stats::FrameStats};

/// A gateway and the nodes currently associated with it.
#[derive(Debug, Clone)]
pub struct Gateway {
    info: GatewayInfo,
    nodes: HashMap<u64, Node>,
    stats: FrameStats,
    latency_stats: LatencyStats,
    session_started: Instant,
    last_gateway_info: Option<Instant>,
}

impl Gateway {
    /// Creates a gateway from its first observed `GATEWAY_INFO`.
    #[must_use]
    pub fn new(info: GatewayInfo, now: Instant) -> Self {
        Self {
            info,
            nodes: HashMap::new(),
            stats: FrameStats::default(),
            latency_stats: LatencyStats::new(),
            session_started: now,
            last_gateway_info: Some(now),
        }
    }

    /// The gateway's 64-bit address.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.info.address
    }

    /// Current gateway identity/schedule snapshot.
    #[must_use]
    pub fn info(&self) -> &GatewayInfo {
        &self.info
    }

    /// Replaces the gateway identity/schedule snapshot (`GATEWAY_INFO`
    /// refresh).
    pub fn set_info(&mut self, info: GatewayInfo, now: Instant) {
        self.info = info;
        self.last_gateway_info = Some(now);
    }

    /// Timestamp of the last `GATEWAY_INFO` received for this gateway.
    /// `None` on the edge side before the first is observed (the edge
    /// coordinator only constructs a `Gateway` once one has arrived, so
    /// this is mainly meaningful on the cloud side's eviction check).
    #[must_use]
    pub fn last_gateway_info(&self) -> Option<Instant> {
        self.last_gateway_info
    }

    /// Monotonic time the session began.
    #[must_use]
    pub fn session_started(&self) -> Instant {
        self.session_started
    }

    /// Aggregate (gateway-wide) frame statistics.
    #[must_use]
    pub fn stats(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    /// Aggregate (gateway-wide) latency histogram.
    #[must_use]
    pub fn latency_stats(&mut self) -> &mut LatencyStats {
        &mut self.latency_stats
    }

    /// Iterates over all currently-registered nodes (live or not; call
    /// [`Gateway::update`] first to evict stale ones).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterates over nodes that are currently live as of `now`.
    pub fn live_nodes(&self, now: Instant) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.is_live(now))
    }

    /// Looks up a node by address.
    #[must_use]
    pub fn get_node(&self, address: u64) -> Option<&Node> {
        self.nodes.get(&address)
    }

    /// Mutable lookup of a node by address.
    pub fn get_node_mut(&mut self, address: u64) -> Option<&mut Node> {
        self.nodes.get_mut(&address)
    }

    /// Inserts a node if absent, or refreshes `last_seen` if present.
    /// Returns the node.
    pub fn add_node(&mut self, address: u64, now: Instant) -> &mut Node {
        self.nodes.entry(address).and_modify(|n| n.touch(now)).or_insert_with(|| Node::new(address, now))
    }

    /// Removes a node, returning it if it was present.
    pub fn remove_node(&mut self, address: u64) -> Option<Node> {
        self.nodes.remove(&address)
    }

    /// Refreshes liveness for `address`, auto-inserting the node if it is
    /// unknown.
    pub fn update_node_liveness(&mut self, address: u64, now: Instant) {
        self.add_node(address, now);
    }

    /// Records a frame received from `frame.header.source`, updating both
    /// the node-level (if known) and gateway-level statistics.
    ///
    /// An unknown source updates only gateway-level stats.
    pub fn register_received_frame(&mut self, now: Instant, frame: &Frame, is_test_packet: bool, rssi_dbm: Option<i16>) {
        if let Some(node) = self.nodes.get_mut(&frame.header.source) {
            node.register_received_frame(now, frame, is_test_packet, rssi_dbm);
        }
        self.stats.add_received(now, is_test_packet, rssi_dbm);
    }

    /// Records a frame sent from the gateway. Broadcast destinations
    /// credit every currently-live node; unicast to a known node credits
    /// only that node; an unknown unicast destination updates only
    /// gateway-level stats.
    pub fn register_sent_frame(&mut self, now: Instant, frame: &Frame, is_test_packet: bool) {
        self.stats.add_sent(now, is_test_packet, None);

        if frame.header.destination == mari_proto::BROADCAST_ADDRESS {
            for node in self.nodes.values_mut().filter(|n| n.is_live(now)) {
                node.register_sent_frame(now, frame, is_test_packet);
            }
        } else if let Some(node) = self.nodes.get_mut(&frame.header.destination) {
            node.register_sent_frame(now, frame, is_test_packet);
        }
    }

    /// Prunes nodes that are no longer live as of `now`.
    pub fn update(&mut self, now: Instant) {
        self.nodes.retain(|_, node| node.is_live(now));
    }
}
