//! Binary packet codec (C2): fixed-layout, little-endian records.
//!
//! Each record type implements [`WireRecord`], which fixes its encoded
//! size and gives uniform `encode`/`decode` methods. Decoding fails with
//! [`ProtocolParseError::PayloadTooShort`] when fewer bytes than the
//! record's layout are supplied; this is the only failure mode for these
//! simple integer/byte-string layouts.

use crate::errors::ProtocolParseError;

/// A fixed-layout binary record with a statically known encoded size.
pub trait WireRecord: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encodes `self` as little-endian bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decodes `self` from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolParseError::PayloadTooShort`] if `bytes.len() <
    /// Self::SIZE`.
    fn decode(bytes: &[u8]) -> Result<Self, ProtocolParseError>;
}

fn require_len(bytes: &[u8], needed: usize) -> Result<(), ProtocolParseError> {
    if bytes.len() < needed {
        return Err(ProtocolParseError::PayloadTooShort { needed, got: bytes.len() });
    }
    Ok(())
}

/// Gateway identity and schedule snapshot, broadcast periodically by the
/// gateway firmware.
///
/// Layout: `address(8) network_id(2) schedule_id(1) schedule_stats(32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewayInfo {
    /// Gateway's own 64-bit address.
    pub address: u64,
    /// Network id the gateway is operating on.
    pub network_id: u16,
    /// Active TDMA schedule id (see `schedule::SCHEDULES`).
    pub schedule_id: u8,
    /// 256-bit schedule cell occupancy bitmap, little-endian bit order.
    pub schedule_stats: [u8; 32],
}

impl GatewayInfo {
    /// Returns whether downlink slot `index` (0..256) is marked occupied.
    #[must_use]
    pub fn schedule_cell(&self, index: usize) -> bool {
        let byte = index / 8;
        let bit = index % 8;
        self.schedule_stats.get(byte).is_some_and(|b| b & (1 << bit) != 0)
    }
}

impl WireRecord for GatewayInfo {
    const SIZE: usize = 8 + 2 + 1 + 32;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.address.to_le_bytes());
        out.extend_from_slice(&self.network_id.to_le_bytes());
        out.push(self.schedule_id);
        out.extend_from_slice(&self.schedule_stats);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolParseError> {
        require_len(bytes, Self::SIZE)?;
        let address = u64::from_le_bytes(bytes[0..8].try_into().unwrap_or([0; 8]));
        let network_id = u16::from_le_bytes([bytes[8], bytes[9]]);
        let schedule_id = bytes[10];
        let mut schedule_stats = [0u8; 32];
        schedule_stats.copy_from_slice(&bytes[11..43]);
        Ok(Self { address, network_id, schedule_id, schedule_stats })
    }
}

/// Cloud-channel envelope binding a node address to the gateway that owns
/// it, used for JOIN/LEFT/KEEP_ALIVE on the edge→cloud link where a bare
/// node address would be ambiguous across gateways.
///
/// Layout: `gateway_address(8) node_address(8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfoCloud {
    /// Address of the gateway the node is attached to.
    pub gateway_address: u64,
    /// Address of the node.
    pub node_address: u64,
}

impl WireRecord for NodeInfoCloud {
    const SIZE: usize = 16;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.gateway_address.to_le_bytes());
        out.extend_from_slice(&self.node_address.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolParseError> {
        require_len(bytes, Self::SIZE)?;
        Ok(Self {
            gateway_address: u64::from_le_bytes(bytes[0..8].try_into().unwrap_or([0; 8])),
            node_address: u64::from_le_bytes(bytes[8..16].try_into().unwrap_or([0; 8])),
        })
    }
}

/// Application-packet counters a node reports back to the gateway,
/// feeding the PDR computation in `mari-core`.
///
/// Layout: `rx_app_packets(4) tx_app_packets(4)`.
///
/// Note: this record's 8-byte encoded size is identical to a plausible
/// 8-byte application payload. This is an accepted protocol ambiguity;
/// the edge coordinator resolves it purely by payload length, matching
/// the observed gateway behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatsReply {
    /// Application packets the node has received from the gateway.
    pub rx_app_packets: u32,
    /// Application packets the node has sent to the gateway.
    pub tx_app_packets: u32,
}

impl WireRecord for NodeStatsReply {
    const SIZE: usize = 8;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.rx_app_packets.to_le_bytes());
        out.extend_from_slice(&self.tx_app_packets.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolParseError> {
        require_len(bytes, Self::SIZE)?;
        Ok(Self {
            rx_app_packets: u32::from_le_bytes(bytes[0..4].try_into().unwrap_or([0; 4])),
            tx_app_packets: u32::from_le_bytes(bytes[4..8].try_into().unwrap_or([0; 4])),
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn gateway_info_round_trip(
            address in any::<u64>(),
            network_id in any::<u16>(),
            schedule_id in any::<u8>(),
            stats in proptest::collection::vec(any::<u8>(), 32..=32),
        ) {
            let mut schedule_stats = [0u8; 32];
            schedule_stats.copy_from_slice(&stats);
            let info = GatewayInfo { address, network_id, schedule_id, schedule_stats };
            let parsed = GatewayInfo::decode(&info.encode()).expect("valid record");
            prop_assert_eq!(info, parsed);
        }

        #[test]
        fn node_info_cloud_round_trip(gateway_address in any::<u64>(), node_address in any::<u64>()) {
            let info = NodeInfoCloud { gateway_address, node_address };
            let parsed = NodeInfoCloud::decode(&info.encode()).expect("valid record");
            prop_assert_eq!(info, parsed);
        }

        #[test]
        fn node_stats_reply_round_trip(rx_app_packets in any::<u32>(), tx_app_packets in any::<u32>()) {
            let reply = NodeStatsReply { rx_app_packets, tx_app_packets };
            let parsed = NodeStatsReply::decode(&reply.encode()).expect("valid record");
            prop_assert_eq!(reply, parsed);
        }
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(NodeStatsReply::decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn schedule_cell_reads_expected_bit() {
        let mut schedule_stats = [0u8; 32];
        schedule_stats[1] = 0b0000_0010; // bit index 9
        let info = GatewayInfo { address: 0, network_id: 0, schedule_id: 0, schedule_stats };
        assert!(info.schedule_cell(9));
        assert!(!info.schedule_cell(8));
    }
}
