//! Transport seams: a blocking serial link to the gateway, and an
//! optional broker link to the cloud.
//!
//! Production serial I/O runs on a dedicated reader thread; this trait
//! only describes what the coordinator needs from it, so tests can
//! substitute an in-memory duplex (`mari-harness`) without spawning real
//! threads or opening real ports. The broker side of the seam is shared
//! with the cloud coordinator and lives in `mari_core::transport`.

pub use mari_core::{BrokerTransport, TransportError};

/// One HDLC-framed, CRC-checked application record, already decoded by
/// C1/C2 — the byte stream between the host and the gateway's UART.
pub type SerialFrame = Vec<u8>;

/// The serial link to the radio gateway.
///
/// `poll_received` is non-blocking: it returns whatever fully-decoded
/// frames the reader thread has queued since the last call, or an empty
/// vec if none. The reader thread itself owns the blocking read loop and
/// the [`mari_proto::FrameDecoder`] state machine.
pub trait SerialTransport: Send {
    /// Sends an HDLC-encoded frame (the caller has already called
    /// [`mari_proto::encode_frame`]).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SerialWrite`] on a write failure.
    fn send(&mut self, encoded: &[u8]) -> Result<(), TransportError>;

    /// Drains frames decoded since the previous call. Each entry is one
    /// decoded application record (post byte-framing, pre C2/C3 parsing).
    fn poll_received(&mut self) -> Vec<SerialFrame>;

    /// Whether the underlying link is currently connected.
    fn is_connected(&self) -> bool;
}
