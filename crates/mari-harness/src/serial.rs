//! In-memory stand-in for the gateway's UART link.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use mari_edge::{SerialFrame, SerialTransport, TransportError};

#[derive(Default)]
struct Inner {
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<SerialFrame>,
    connected: bool,
}

/// A [`SerialTransport`] backed by an in-memory queue, paired with a
/// [`SerialHandle`] a test can use to inject gateway frames and inspect
/// what the coordinator sent.
pub struct InMemorySerial {
    inner: Arc<Mutex<Inner>>,
}

/// The test-side handle for an [`InMemorySerial`].
#[derive(Clone)]
pub struct SerialHandle {
    inner: Arc<Mutex<Inner>>,
}

/// Builds a connected in-memory serial pair: the transport half for the
/// coordinator, and the handle half for the test.
#[must_use]
pub fn serial_pair() -> (InMemorySerial, SerialHandle) {
    let inner = Arc::new(Mutex::new(Inner { connected: true, ..Inner::default() }));
    (InMemorySerial { inner: inner.clone() }, SerialHandle { inner })
}

impl SerialHandle {
    /// Queues a decoded frame as if the reader thread had just received
    /// it from the gateway.
    pub fn push_frame(&self, frame: SerialFrame) {
        self.inner.lock().expect("serial mutex poisoned").inbound.push_back(frame);
    }

    /// Returns every encoded frame sent by the coordinator so far, in
    /// order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.inner.lock().expect("serial mutex poisoned").sent.clone()
    }

    /// Sets the link's reported connectivity.
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().expect("serial mutex poisoned").connected = connected;
    }
}

impl SerialTransport for InMemorySerial {
    fn send(&mut self, encoded: &[u8]) -> Result<(), TransportError> {
        self.inner.lock().expect("serial mutex poisoned").sent.push(encoded.to_vec());
        Ok(())
    }

    fn poll_received(&mut self) -> Vec<SerialFrame> {
        self.inner.lock().expect("serial mutex poisoned").inbound.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().expect("serial mutex poisoned").connected
    }
}
