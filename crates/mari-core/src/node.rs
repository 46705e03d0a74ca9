//! `Node`: a wireless endpoint managed by a gateway.

use std::time::{Duration, Instant};

use mari_proto::Frame;

use crate::{latency::LatencyStats, stats::FrameStats};

/// Liveness TTL: a node is considered live iff `now - last_seen < LIVENESS_TTL`.
pub const LIVENESS_TTL: Duration = Duration::from_secs(10);

/// A wireless endpoint managed by one gateway.
///
/// Stats survive only within the lifetime of a single `Node` value: a
/// node that rejoins after being evicted starts with fresh counters.
#[derive(Debug, Clone)]
pub struct Node {
    address: u64,
    last_seen: Instant,
    sent: FrameStats,
    received: FrameStats,
    latency: LatencyStats,
    stats_reply_count: u32,
    last_reported_rx_count: u32,
    last_reported_tx_count: u32,
    pdr_downlink: f64,
    pdr_uplink: f64,
}

impl Node {
    /// Creates a newly-seen node with all counters at zero.
    #[must_use]
    pub fn new(address: u64, now: Instant) -> Self {
        Self {
            address,
            last_seen: now,
            sent: FrameStats::default(),
            received: FrameStats::default(),
            latency: LatencyStats::new(),
            stats_reply_count: 0,
            last_reported_rx_count: 0,
            last_reported_tx_count: 0,
            pdr_downlink: 1.0,
            pdr_uplink: 1.0,
        }
    }

    /// The node's 64-bit address.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Timestamp of the last inbound activity from this node.
    #[must_use]
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Whether `now - last_seen < `[`LIVENESS_TTL`].
    #[must_use]
    pub fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.last_seen) < LIVENESS_TTL
    }

    /// Refreshes the liveness timestamp (JOIN, KEEP_ALIVE, or any inbound
    /// frame).
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// Downlink frame statistics (host → node).
    #[must_use]
    pub fn sent_stats(&mut self) -> &mut FrameStats {
        &mut self.sent
    }

    /// Uplink frame statistics (node → host).
    #[must_use]
    pub fn received_stats(&mut self) -> &mut FrameStats {
        &mut self.received
    }

    /// Round-trip latency histogram for probes this node answered.
    #[must_use]
    pub fn latency_stats(&mut self) -> &mut LatencyStats {
        &mut self.latency
    }

    /// Records a frame sent to this node.
    pub fn register_sent_frame(&mut self, now: Instant, _frame: &Frame, is_test_packet: bool) {
        self.sent.add_sent(now, is_test_packet, None);
    }

    /// Cumulative count of frames sent to this node (test packets included).
    #[must_use]
    pub fn sent_stats_count(&mut self, now: Instant) -> u64 {
        self.sent.sent_count(now, 0)
    }

    /// Records a frame received from this node.
    pub fn register_received_frame(
        &mut self,
        now: Instant,
        _frame: &Frame,
        is_test_packet: bool,
        rssi_dbm: Option<i16>,
    ) {
        self.received.add_received(now, is_test_packet, rssi_dbm);
    }

    /// Last reported remote application-packet RX/TX counters.
    #[must_use]
    pub fn remote_counters(&self) -> (u32, u32) {
        (self.last_reported_rx_count, self.last_reported_tx_count)
    }

    /// Downlink packet delivery ratio: `min(1, remote_rx / non_test_sent)`.
    #[must_use]
    pub fn pdr_downlink(&self) -> f64 {
        self.pdr_downlink
    }

    /// Uplink packet delivery ratio: `min(1, stats_reply_count / remote_tx)`.
    #[must_use]
    pub fn pdr_uplink(&self) -> f64 {
        self.pdr_uplink
    }

    /// Number of `NodeStatsReply` records received from this node.
    #[must_use]
    pub fn stats_reply_count(&self) -> u32 {
        self.stats_reply_count
    }

    /// Applies a freshly-parsed `NodeStatsReply` and recomputes PDR in both
    /// directions.
    pub fn apply_stats_reply(&mut self, rx_app_packets: u32, tx_app_packets: u32) {
        self.stats_reply_count += 1;
        self.last_reported_rx_count = rx_app_packets;
        self.last_reported_tx_count = tx_app_packets;

        let non_test_sent = self.sent.cumulative_sent_non_test();
        self.pdr_downlink = if non_test_sent > 0 {
            (f64::from(rx_app_packets) / non_test_sent as f64).min(1.0)
        } else {
            1.0
        };

        self.pdr_uplink = if tx_app_packets > 0 {
            (f64::from(self.stats_reply_count) / f64::from(tx_app_packets)).min(1.0)
        } else {
            1.0
        };
    }
}
