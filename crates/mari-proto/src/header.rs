//! Frame header (C2): a fixed 20-byte, little-endian MAC-ish header.

use crate::errors::ProtocolParseError;

/// Current protocol version carried in every header.
pub const PROTOCOL_VERSION: u8 = 2;

/// Default network id used when none is configured.
pub const DEFAULT_NETWORK_ID: u16 = 0x0001;

/// Broadcast destination address: every currently-live node is credited
/// with the send.
pub const BROADCAST_ADDRESS: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Fixed 20-byte frame header, little-endian on the wire.
///
/// Layout: `version(1) type(1) network_id(2) destination(8) source(8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (currently [`PROTOCOL_VERSION`]).
    pub version: u8,
    /// MAC-layer packet type, opaque to this layer.
    pub packet_type: u8,
    /// Network id this frame belongs to.
    pub network_id: u16,
    /// Destination node address, or [`BROADCAST_ADDRESS`].
    pub destination: u64,
    /// Source node (or gateway) address.
    pub source: u64,
}

impl Header {
    /// Size of the encoded header in bytes.
    pub const SIZE: usize = 20;

    /// Builds a header addressed to `destination`, with `source` left at 0
    /// (the edge coordinator fills it in from the gateway's own identity
    /// where relevant).
    #[must_use]
    pub fn new(destination: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type: 0,
            network_id: DEFAULT_NETWORK_ID,
            destination,
            source: 0,
        }
    }

    /// Encodes the header as 20 little-endian bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.version;
        buf[1] = self.packet_type;
        buf[2..4].copy_from_slice(&self.network_id.to_le_bytes());
        buf[4..12].copy_from_slice(&self.destination.to_le_bytes());
        buf[12..20].copy_from_slice(&self.source.to_le_bytes());
        buf
    }

    /// Parses a header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolParseError::PayloadTooShort`] if fewer than
    /// [`Header::SIZE`] bytes are available.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolParseError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolParseError::PayloadTooShort { needed: Self::SIZE, got: bytes.len() });
        }
        Ok(Self {
            version: bytes[0],
            packet_type: bytes[1],
            network_id: u16::from_le_bytes([bytes[2], bytes[3]]),
            destination: u64::from_le_bytes(bytes[4..12].try_into().unwrap_or([0; 8])),
            source: u64::from_le_bytes(bytes[12..20].try_into().unwrap_or([0; 8])),
        })
    }
}
