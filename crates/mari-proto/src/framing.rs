//! Byte-framing codec (C1): HDLC-style flag delimiting with byte-stuffing
//! and a CRC-16 trailer.
//!
//! Frames on the wire look like:
//!
//! `FLAG, <escaped payload>, <escaped CRC-16 (little-endian)>, FLAG`
//!
//! Any occurrence of `FLAG` or `ESC` inside the payload or CRC is replaced
//! by `ESC, byte ^ ESC_XOR`. The decoder is a byte-at-a-time state machine;
//! callers feed one byte at a time and poll the state after each feed.

use crate::errors::FramingError;

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape marker.
pub const ESC: u8 = 0x7D;

/// XOR mask applied to an escaped byte.
pub const ESC_XOR: u8 = 0x20;

/// Decoder state, as named in the byte-framing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for the opening flag byte.
    Idle,
    /// Accumulating payload bytes.
    Receiving,
    /// The previous byte was an escape marker.
    Escaping,
    /// A complete, CRC-verified payload is available via [`FrameDecoder::payload`].
    Ready,
    /// The last frame failed CRC or framing validation; resyncing on the next flag.
    Error,
}

/// Appends the byte-stuffed, CRC-trailed encoding of `payload` to `out`.
///
/// This is the symmetric counterpart of [`FrameDecoder`]: `decode(encode(x))
/// == x` for every `x`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let crc = crate::crc::crc16(payload);
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(FLAG);
    for &byte in payload.iter().chain(crc.to_le_bytes().iter()) {
        stuff_byte(&mut out, byte);
    }
    out.push(FLAG);
    out
}

fn stuff_byte(out: &mut Vec<u8>, byte: u8) {
    if byte == FLAG || byte == ESC {
        out.push(ESC);
        out.push(byte ^ ESC_XOR);
    } else {
        out.push(byte);
    }
}

/// Byte-at-a-time HDLC-style frame decoder.
///
/// `feed` advances the state machine by one input byte and returns the new
/// state. When the state becomes [`DecoderState::Ready`], the caller must
/// read [`FrameDecoder::payload`] and then call [`FrameDecoder::reset`]
/// before feeding further bytes (or rely on the next `FLAG` to implicitly
/// start a fresh frame).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: Vec<u8>,
    last_error: Option<FramingError>,
    corruption_count: u64,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self::Idle
    }
}

impl FrameDecoder {
    /// Creates a decoder in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self { state: DecoderState::Idle, buffer: Vec::new(), last_error: None, corruption_count: 0 }
    }

    /// Current decoder state.
    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Number of frames dropped due to framing or CRC errors since creation.
    #[must_use]
    pub fn corruption_count(&self) -> u64 {
        self.corruption_count
    }

    /// The decoded, CRC-verified payload, available only in `Ready` state.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        matches!(self.state, DecoderState::Ready).then(|| self.buffer.as_slice())
    }

    /// The error that caused the `Error` state, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<FramingError> {
        self.last_error
    }

    /// Discards the current payload/error and returns to `Idle`, ready for
    /// the next frame. Safe to call in any state.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.buffer.clear();
        self.last_error = None;
    }

    /// Feeds one raw (pre-unstuffing) byte from the transport into the
    /// decoder and returns the resulting state.
    pub fn feed(&mut self, byte: u8) -> DecoderState {
        match self.state {
            DecoderState::Ready | DecoderState::Error => {
                // Caller hasn't consumed the previous result yet; starting a
                // fresh frame on FLAG still resynchronizes.
                self.reset();
                self.feed(byte)
            }
            DecoderState::Idle => {
                if byte == FLAG {
                    self.state = DecoderState::Receiving;
                }
                self.state
            }
            DecoderState::Receiving => {
                if byte == FLAG {
                    self.finish()
                } else if byte == ESC {
                    self.state = DecoderState::Escaping;
                    self.state
                } else {
                    self.buffer.push(byte);
                    self.state
                }
            }
            DecoderState::Escaping => {
                self.buffer.push(byte ^ ESC_XOR);
                self.state = DecoderState::Receiving;
                self.state
            }
        }
    }

    fn finish(&mut self) -> DecoderState {
        if self.buffer.len() < 2 {
            return self.fail(FramingError::InvalidEscape);
        }
        let split = self.buffer.len() - 2;
        let crc_bytes = [self.buffer[split], self.buffer[split + 1]];
        let expected = u16::from_le_bytes(crc_bytes);
        let computed = crate::crc::crc16(&self.buffer[..split]);
        if expected != computed {
            return self.fail(FramingError::CrcMismatch { expected, computed });
        }
        self.buffer.truncate(split);
        self.state = DecoderState::Ready;
        self.state
    }

    fn fail(&mut self, err: FramingError) -> DecoderState {
        self.buffer.clear();
        self.last_error = Some(err);
        self.state = DecoderState::Error;
        self.corruption_count += 1;
        self.state
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn decode_one(frame_bytes: &[u8]) -> Option<Vec<u8>> {
        let mut dec = FrameDecoder::new();
        let mut result = None;
        for &b in frame_bytes {
            if dec.feed(b) == DecoderState::Ready {
                result = Some(dec.payload().unwrap_or(&[]).to_vec());
            }
        }
        result
    }

    #[test]
    fn round_trip_empty_payload() {
        let encoded = encode_frame(&[]);
        assert_eq!(decode_one(&encoded), Some(vec![]));
    }

    #[test]
    fn round_trip_payload_with_flag_and_escape_bytes() {
        let payload = vec![FLAG, ESC, 0x00, 0xFF, FLAG, ESC];
        let encoded = encode_frame(&payload);
        assert_eq!(decode_one(&encoded), Some(payload));
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_payload(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode_frame(&payload);
            prop_assert_eq!(decode_one(&encoded), Some(payload));
        }
    }

    #[test]
    fn resyncs_after_corruption_within_one_flag_byte() {
        let good1 = encode_frame(b"hello");
        let good2 = encode_frame(b"world");

        // A structurally valid frame whose CRC trailer has been flipped, so
        // it decodes cleanly through framing but fails the CRC check.
        let mut corrupted = encode_frame(b"oops!");
        let crc_idx = corrupted.len() - 3;
        corrupted[crc_idx] ^= 0xFF;

        let mut stream = Vec::new();
        stream.extend_from_slice(&good1);
        stream.extend_from_slice(&corrupted);
        stream.extend_from_slice(&good2);

        let mut dec = FrameDecoder::new();
        let mut delivered = Vec::new();
        for &b in &stream {
            match dec.feed(b) {
                DecoderState::Ready => {
                    delivered.push(dec.payload().unwrap_or(&[]).to_vec());
                }
                DecoderState::Error => {}
                _ => {}
            }
        }

        assert_eq!(delivered, vec![b"hello".to_vec(), b"world".to_vec()]);
        assert_eq!(dec.corruption_count(), 1);
    }
}
