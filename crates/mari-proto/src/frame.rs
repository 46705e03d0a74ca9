//! `Frame`: a [`Header`] plus an opaque payload.

use bytes::Bytes;

use crate::{errors::ProtocolParseError, header::Header};

/// A complete MAC-layer frame: 20-byte header followed by an opaque
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Routing header.
    pub header: Header,
    /// Opaque application/test payload.
    pub payload: Bytes,
}

impl Frame {
    /// Builds a frame from a header and payload.
    #[must_use]
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self { header, payload: payload.into() }
    }

    /// Encodes `header || payload` as a flat byte vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Header::SIZE + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parses a frame from `bytes` (header followed by the remaining bytes
    /// as payload).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolParseError::PayloadTooShort`] if fewer than
    /// [`Header::SIZE`] bytes are available.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolParseError> {
        let header = Header::from_bytes(bytes)?;
        let payload = Bytes::copy_from_slice(&bytes[Header::SIZE..]);
        Ok(Self { header, payload })
    }
}
