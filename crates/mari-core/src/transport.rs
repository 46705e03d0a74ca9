//! Broker transport seam shared by the edge and cloud coordinators.
//!
//! Serial-port specifics (the gateway UART link) are edge-only and live
//! in `mari-edge`; the broker side is identical on both ends of the
//! link, so it lives here.

use thiserror::Error;

/// Transport-level failures (open/read/write/connect/publish).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the serial port failed.
    #[error("serial open failed: {0}")]
    SerialOpen(String),

    /// Writing an encoded frame to the serial port failed.
    #[error("serial write failed: {0}")]
    SerialWrite(String),

    /// Connecting to the broker failed.
    #[error("broker connect failed: {0}")]
    BrokerConnect(String),

    /// Publishing to the broker failed.
    #[error("broker publish failed: {0}")]
    BrokerPublish(String),
}

/// The broker link between an edge coordinator and the cloud component.
pub trait BrokerTransport: Send {
    /// Publishes a byte payload to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BrokerPublish`] on a publish failure.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Subscribes to `topic`; subsequent inbound messages surface via
    /// [`BrokerTransport::poll_received`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BrokerConnect`] if the subscription
    /// cannot be established.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Drains messages received on subscribed topics since the previous
    /// call.
    fn poll_received(&mut self) -> Vec<Vec<u8>>;
}
