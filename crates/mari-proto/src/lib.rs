//! Wire-level building blocks for the mari gateway protocol: byte framing
//! (C1), the fixed-layout binary record codec (C2), and the tagged-union
//! event codec (C3).
//!
//! This crate is Sans-IO: it has no notion of a serial port, a thread, or
//! a broker connection. Those live in `mari-edge` and `mari-cloud`.

mod crc;
mod event;
mod frame;
mod framing;
mod header;
mod packet;
mod schedule;

pub mod errors;

pub use event::{
    DOWNLINK_COMMAND_TAG, DownlinkCommand, Event, EventChannel, EventTag, LATENCY_MAGIC,
    LOAD_PACKET_PAYLOAD, NodeIdentity, is_test_packet,
};
pub use frame::Frame;
pub use framing::{DecoderState, FrameDecoder, encode_frame};
pub use header::{BROADCAST_ADDRESS, DEFAULT_NETWORK_ID, Header, PROTOCOL_VERSION};
pub use packet::{GatewayInfo, NodeInfoCloud, NodeStatsReply, WireRecord};
pub use schedule::{SCHEDULES, Schedule, schedule_by_id};
