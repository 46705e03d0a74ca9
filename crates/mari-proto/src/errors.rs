//! Error types for the framing, record, and event codecs.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the byte-framing layer (C1).
///
/// These never propagate out of a running coordinator: `FramingError` is
/// absorbed, the current frame is dropped, and the decoder resynchronizes
/// at the next flag byte.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// The trailing CRC did not match the decoded payload.
    #[error("CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch {
        /// CRC carried on the wire.
        expected: u16,
        /// CRC recomputed over the decoded payload.
        computed: u16,
    },

    /// An escape byte was immediately followed by the flag byte, or the
    /// stream ended mid-escape.
    #[error("invalid byte-stuffing sequence")]
    InvalidEscape,
}

/// Errors raised by the binary record codec (C2) and the event codec (C3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolParseError {
    /// Fewer bytes were supplied than the record's fixed layout requires.
    #[error("payload too short: need {needed} bytes, got {got}")]
    PayloadTooShort {
        /// Bytes required by the record layout.
        needed: usize,
        /// Bytes actually supplied.
        got: usize,
    },

    /// The leading discriminator byte did not match any known event tag.
    #[error("unknown event tag {0:#04x}")]
    UnknownTag(u8),
}

/// Umbrella error for anything that can go wrong decoding wire data.
///
/// Kept separate from [`FramingError`] because framing failures are
/// recovered differently (resync on next flag byte) than parse failures
/// (drop the single event).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A framing-layer failure (see [`FramingError`]).
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A record/event parse failure (see [`ProtocolParseError`]).
    #[error(transparent)]
    Parse(#[from] ProtocolParseError),
}
