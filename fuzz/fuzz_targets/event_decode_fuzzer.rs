//! Fuzz target for `Event::decode`.
//!
//! Exercises the tagged-union event codec with arbitrary byte sequences on
//! both channel variants. Should never panic; malformed input must only
//! ever produce an `Err`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mari_proto::{Event, EventChannel};

fuzz_target!(|data: &[u8]| {
    let _ = Event::decode(data, EventChannel::Edge);
    let _ = Event::decode(data, EventChannel::Cloud);
});
