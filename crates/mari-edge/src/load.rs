//! Load generator (C8): a fixed-rate broadcast emitter sized as a
//! percentage of the active schedule's downlink capacity.

use std::time::{Duration, Instant};

use mari_proto::{BROADCAST_ADDRESS, LOAD_PACKET_PAYLOAD, schedule_by_id};

use crate::{coordinator::EdgeCoordinator, transport::TransportError};

/// Suggested recheck cadence while the gateway's schedule is still
/// unknown: callers driving their own loop should poll at least this
/// often so the generator starts promptly once a schedule arrives.
pub const UNKNOWN_SCHEDULE_WAIT: Duration = Duration::from_millis(100);

/// Drives periodic broadcast load packets against a coordinator.
///
/// Mirrors [`crate::probe::LatencyProbeEngine`]: it borrows the
/// coordinator and only decides when the next packet is due. Disabled
/// entirely (every [`LoadGenerator::tick`] is a no-op) when `load_percent`
/// is zero.
pub struct LoadGenerator<'a> {
    coordinator: &'a EdgeCoordinator,
    load_percent: u8,
    last_sent: Option<Instant>,
}

impl<'a> LoadGenerator<'a> {
    /// Builds a load generator targeting `load_percent` of the active
    /// schedule's maximum downlink rate. `0` disables it.
    #[must_use]
    pub fn new(coordinator: &'a EdgeCoordinator, load_percent: u8) -> Self {
        Self { coordinator, load_percent, last_sent: None }
    }

    /// Sends one load packet if the computed period has elapsed. A no-op
    /// while the gateway's schedule is still unknown (before the first
    /// `GATEWAY_INFO`); callers should recheck on a fixed
    /// [`UNKNOWN_SCHEDULE_WAIT`] cadence until then.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SerialWrite`] if the underlying transport
    /// write fails.
    pub fn tick(&mut self, now: Instant) -> Result<(), TransportError> {
        if self.load_percent == 0 {
            return Ok(());
        }

        let Some(period) = self.period() else {
            return Ok(());
        };

        let due = self.last_sent.is_none_or(|sent| now.duration_since(sent) >= period);
        if !due {
            return Ok(());
        }

        self.coordinator.send_frame(BROADCAST_ADDRESS, LOAD_PACKET_PAYLOAD)?;
        self.last_sent = Some(now);
        Ok(())
    }

    fn period(&self) -> Option<Duration> {
        let (address, schedule_id) =
            self.coordinator.with_gateway(|gw| (gw.address(), gw.info().schedule_id));
        if address == 0 {
            // No `GATEWAY_INFO` has arrived yet; schedule id 0 is the
            // "huge" schedule, not a sentinel, so this must be gated on
            // gateway identity rather than on `schedule_by_id`'s result.
            return None;
        }
        let schedule = schedule_by_id(schedule_id)?;
        let target_rate = schedule.max_downlink_rate() * f64::from(self.load_percent) / 100.0;
        if target_rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(1.0 / target_rate))
    }
}
