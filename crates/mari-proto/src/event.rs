//! Wire event codec (C3): the tagged union exchanged on both the
//! host↔gateway UART channel and the edge↔cloud broker channel.

use bytes::Bytes;

use crate::{
    errors::ProtocolParseError,
    frame::Frame,
    packet::{GatewayInfo, NodeInfoCloud, NodeStatsReply, WireRecord},
};

/// Magic prefix identifying a latency-probe payload. Deployment constant
/// agreed with the gateway firmware.
pub const LATENCY_MAGIC: &[u8] = b"LTNC";

/// Single-byte payload used by the load generator (C8). Excluded from
/// delivery statistics.
pub const LOAD_PACKET_PAYLOAD: &[u8] = b"L";

/// Reserved tag byte prefixing a downlink command frame (host → gateway).
/// A separate wire convention from the event-tag table below: it is the
/// gateway's command channel, not an event.
pub const DOWNLINK_COMMAND_TAG: u8 = 0x01;

/// Returns whether `payload` is a test packet (latency probe or load
/// filler): it contributes to cumulative-but-not-non-test counters and
/// never reaches the application callback as `NODE_DATA`.
#[must_use]
pub fn is_test_packet(payload: &[u8]) -> bool {
    payload.starts_with(LATENCY_MAGIC) || payload == LOAD_PACKET_PAYLOAD
}

/// Event tag byte discriminating [`Event`] variants on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventTag {
    /// A node joined the gateway's network.
    NodeJoined = 1,
    /// A node left (or was evicted from) the gateway's network.
    NodeLeft = 2,
    /// Application or test data addressed to/from a node.
    NodeData = 3,
    /// A node's periodic liveness refresh.
    NodeKeepAlive = 4,
    /// An update to the gateway's own identity/schedule.
    GatewayInfo = 5,
    /// A latency-probe response (shares the `NodeData` wire payload shape).
    LatencyData = 6,
}

impl EventTag {
    fn from_u8(tag: u8) -> Result<Self, ProtocolParseError> {
        match tag {
            1 => Ok(Self::NodeJoined),
            2 => Ok(Self::NodeLeft),
            3 => Ok(Self::NodeData),
            4 => Ok(Self::NodeKeepAlive),
            5 => Ok(Self::GatewayInfo),
            6 => Ok(Self::LatencyData),
            other => Err(ProtocolParseError::UnknownTag(other)),
        }
    }
}

/// Which channel an [`Event`] is being decoded from, since the same tag
/// carries a bare node address on the edge channel but a
/// [`NodeInfoCloud`] envelope on the cloud channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    /// Host↔gateway UART channel: node identity is a bare `u64` address.
    Edge,
    /// Edge↔cloud broker channel: node identity carries the owning
    /// gateway's address alongside the node address.
    Cloud,
}

/// Node identity as carried by a JOIN/LEFT/KEEP_ALIVE event, shaped by the
/// channel it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdentity {
    /// Bare node address (edge channel).
    Edge(u64),
    /// Gateway-qualified node address (cloud channel).
    Cloud(NodeInfoCloud),
}

impl NodeIdentity {
    /// The node's own address, regardless of channel.
    #[must_use]
    pub fn node_address(&self) -> u64 {
        match self {
            Self::Edge(addr) => *addr,
            Self::Cloud(info) => info.node_address,
        }
    }
}

/// A decoded wire event (C3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Tag 1: a node joined.
    NodeJoined(NodeIdentity),
    /// Tag 2: a node left.
    NodeLeft(NodeIdentity),
    /// Tag 3: application or test data.
    NodeData(Frame),
    /// Tag 4: a liveness refresh.
    NodeKeepAlive(NodeIdentity),
    /// Tag 5: gateway identity/schedule update.
    GatewayInfo(GatewayInfo),
    /// Tag 6: a latency-probe response.
    LatencyData(Frame),
}

impl Event {
    /// Encodes `tag || payload` for this event on the given channel.
    #[must_use]
    pub fn encode(&self, channel: EventChannel) -> Vec<u8> {
        let (tag, body): (EventTag, Vec<u8>) = match self {
            Self::NodeJoined(id) => (EventTag::NodeJoined, encode_identity(id, channel)),
            Self::NodeLeft(id) => (EventTag::NodeLeft, encode_identity(id, channel)),
            Self::NodeData(frame) => (EventTag::NodeData, frame.to_bytes()),
            Self::NodeKeepAlive(id) => (EventTag::NodeKeepAlive, encode_identity(id, channel)),
            Self::GatewayInfo(info) => (EventTag::GatewayInfo, info.encode()),
            Self::LatencyData(frame) => (EventTag::LatencyData, frame.to_bytes()),
        };
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(tag as u8);
        out.extend_from_slice(&body);
        out
    }

    /// Decodes an event from `bytes` (leading tag byte plus payload),
    /// interpreting node-identity payloads per `channel`.
    ///
    /// # Errors
    ///
    /// [`ProtocolParseError::PayloadTooShort`] if `bytes` is empty or the
    /// payload is shorter than the tag's record requires;
    /// [`ProtocolParseError::UnknownTag`] for an unrecognized tag byte.
    pub fn decode(bytes: &[u8], channel: EventChannel) -> Result<Self, ProtocolParseError> {
        let (&tag_byte, rest) =
            bytes.split_first().ok_or(ProtocolParseError::PayloadTooShort { needed: 1, got: 0 })?;
        let tag = EventTag::from_u8(tag_byte)?;
        match tag {
            EventTag::NodeJoined => Ok(Self::NodeJoined(decode_identity(rest, channel)?)),
            EventTag::NodeLeft => Ok(Self::NodeLeft(decode_identity(rest, channel)?)),
            EventTag::NodeKeepAlive => Ok(Self::NodeKeepAlive(decode_identity(rest, channel)?)),
            EventTag::NodeData => Ok(Self::NodeData(Frame::from_bytes(rest)?)),
            EventTag::LatencyData => Ok(Self::LatencyData(Frame::from_bytes(rest)?)),
            EventTag::GatewayInfo => Ok(Self::GatewayInfo(GatewayInfo::decode(rest)?)),
        }
    }
}

fn encode_identity(id: &NodeIdentity, channel: EventChannel) -> Vec<u8> {
    match (id, channel) {
        (NodeIdentity::Edge(addr), EventChannel::Edge) => addr.to_le_bytes().to_vec(),
        (NodeIdentity::Cloud(info), EventChannel::Cloud) => info.encode(),
        // Mismatched (identity, channel) pairs are a caller bug, not a wire
        // condition; fall back to encoding by the identity's own shape.
        (NodeIdentity::Edge(addr), EventChannel::Cloud) => addr.to_le_bytes().to_vec(),
        (NodeIdentity::Cloud(info), EventChannel::Edge) => info.node_address.to_le_bytes().to_vec(),
    }
}

fn decode_identity(bytes: &[u8], channel: EventChannel) -> Result<NodeIdentity, ProtocolParseError> {
    match channel {
        EventChannel::Edge => {
            if bytes.len() < 8 {
                return Err(ProtocolParseError::PayloadTooShort { needed: 8, got: bytes.len() });
            }
            Ok(NodeIdentity::Edge(u64::from_le_bytes(bytes[0..8].try_into().unwrap_or([0; 8]))))
        }
        EventChannel::Cloud => Ok(NodeIdentity::Cloud(NodeInfoCloud::decode(bytes)?)),
    }
}

/// A downlink command frame (host → gateway). Distinct from [`Event`]
/// because it uses a separate wire convention: [`DOWNLINK_COMMAND_TAG`]
/// followed directly by a serialized [`Frame`], never one of the six
/// event tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkCommand {
    /// The frame to transmit to the gateway.
    pub frame: Frame,
}

impl DownlinkCommand {
    /// Encodes `0x01 || frame`.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let frame_bytes = self.frame.to_bytes();
        let mut out = Vec::with_capacity(1 + frame_bytes.len());
        out.push(DOWNLINK_COMMAND_TAG);
        out.extend_from_slice(&frame_bytes);
        Bytes::from(out)
    }
}
