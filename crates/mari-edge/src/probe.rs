//! Latency probe engine (C7): periodic broadcast round-trip measurement.
//!
//! RTT matching itself lives on [`crate::coordinator::EdgeCoordinator`],
//! which owns the pending-probe table and the gateway/node latency
//! histograms it feeds. This type only decides *when* the next probe is
//! due; call [`LatencyProbeEngine::tick`] from the same loop that calls
//! [`EdgeCoordinator::update`].

use std::time::{Duration, Instant};

use crate::{coordinator::EdgeCoordinator, transport::TransportError};

/// Default interval between outbound probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Drives periodic latency probes against a coordinator.
///
/// Borrows the coordinator rather than owning it, since the coordinator
/// is typically shared (via `Arc`) across the probe engine, the load
/// generator, and the application's own polling loop.
pub struct LatencyProbeEngine<'a> {
    coordinator: &'a EdgeCoordinator,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl<'a> LatencyProbeEngine<'a> {
    /// Builds a probe engine with the default 1 s interval.
    #[must_use]
    pub fn new(coordinator: &'a EdgeCoordinator) -> Self {
        Self { coordinator, interval: DEFAULT_PROBE_INTERVAL, last_sent: None }
    }

    /// Builds a probe engine with a custom interval.
    #[must_use]
    pub fn with_interval(coordinator: &'a EdgeCoordinator, interval: Duration) -> Self {
        Self { coordinator, interval, last_sent: None }
    }

    /// Sends one probe if at least `interval` has elapsed since the last,
    /// otherwise does nothing. Call at least as often as `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SerialWrite`] if the underlying transport
    /// write fails.
    pub fn tick(&mut self, now: Instant) -> Result<(), TransportError> {
        let due = self.last_sent.is_none_or(|sent| now.duration_since(sent) >= self.interval);
        if !due {
            return Ok(());
        }
        self.coordinator.send_latency_probe(now)?;
        self.last_sent = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use mari_core::SystemClock;

    use super::*;
    use crate::{
        config::EdgeConfig,
        transport::{SerialFrame, SerialTransport},
    };

    struct SpySerial {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl SerialTransport for SpySerial {
        fn send(&mut self, encoded: &[u8]) -> Result<(), TransportError> {
            self.sent.lock().expect("lock").push(encoded.to_vec());
            Ok(())
        }

        fn poll_received(&mut self) -> Vec<SerialFrame> {
            Vec::new()
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn test_config() -> EdgeConfig {
        EdgeConfig {
            serial_port: "/dev/ttyACM0".into(),
            baudrate: 1_000_000,
            broker: None,
            network_id: 1,
            load_percent: 0,
            latency_probe_enabled: true,
            log_dir: None,
            topic_prefix: "mari".into(),
        }
    }

    #[test]
    fn first_tick_always_sends() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let serial = SpySerial { sent: sent.clone() };
        let coordinator =
            EdgeCoordinator::new(test_config(), Box::new(serial), None, None, Box::new(SystemClock));
        let mut engine = LatencyProbeEngine::new(&coordinator);

        let t0 = Instant::now();
        engine.tick(t0).expect("send succeeds");
        assert_eq!(sent.lock().expect("lock").len(), 1);
    }

    #[test]
    fn probe_does_not_resend_before_interval_elapses() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let serial = SpySerial { sent: sent.clone() };
        let coordinator =
            EdgeCoordinator::new(test_config(), Box::new(serial), None, None, Box::new(SystemClock));
        let mut engine = LatencyProbeEngine::with_interval(&coordinator, Duration::from_secs(1));

        let t0 = Instant::now();
        engine.tick(t0).expect("send succeeds");
        engine.tick(t0 + Duration::from_millis(500)).expect("no-op succeeds");
        assert_eq!(sent.lock().expect("lock").len(), 1);

        engine.tick(t0 + Duration::from_secs(1)).expect("send succeeds");
        assert_eq!(sent.lock().expect("lock").len(), 2);
    }
}
