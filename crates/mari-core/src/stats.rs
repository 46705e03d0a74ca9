//! Sliding-window and cumulative frame statistics (part of C4).

use std::{collections::VecDeque, time::{Duration, Instant}};

/// Default sliding-window length, in seconds.
pub const DEFAULT_WINDOW_SECONDS: u64 = 240;

/// One logged sent/received frame.
#[derive(Debug, Clone, Copy)]
struct LogEntry {
    at: Instant,
    rssi_dbm: Option<i16>,
}

/// Sliding-window and cumulative counters for one direction (sent or
/// received) of traffic.
///
/// Window pruning is lazy: entries older than `window_seconds` are
/// dropped from the head on every append and before every windowed read.
#[derive(Debug, Clone)]
pub struct FrameStats {
    window: Duration,
    sent_log: VecDeque<LogEntry>,
    received_log: VecDeque<LogEntry>,
    cumulative_sent: u64,
    cumulative_received: u64,
    cumulative_sent_non_test: u64,
    cumulative_received_non_test: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_WINDOW_SECONDS))
    }
}

impl FrameStats {
    /// Creates an empty stats tracker with the given sliding-window length.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sent_log: VecDeque::new(),
            received_log: VecDeque::new(),
            cumulative_sent: 0,
            cumulative_received: 0,
            cumulative_sent_non_test: 0,
            cumulative_received_non_test: 0,
        }
    }

    /// Records a sent frame at `now`. Test packets bump the cumulative
    /// total but never enter the windowed log or the non-test counters.
    pub fn add_sent(&mut self, now: Instant, is_test_packet: bool, rssi_dbm: Option<i16>) {
        self.cumulative_sent += 1;
        if !is_test_packet {
            self.cumulative_sent_non_test += 1;
            self.sent_log.push_back(LogEntry { at: now, rssi_dbm });
            prune(&mut self.sent_log, now, self.window);
        }
    }

    /// Records a received frame at `now`. See [`FrameStats::add_sent`].
    pub fn add_received(&mut self, now: Instant, is_test_packet: bool, rssi_dbm: Option<i16>) {
        self.cumulative_received += 1;
        if !is_test_packet {
            self.cumulative_received_non_test += 1;
            self.received_log.push_back(LogEntry { at: now, rssi_dbm });
            prune(&mut self.received_log, now, self.window);
        }
    }

    /// Sent-frame count. `window_secs == 0` returns the cumulative total
    /// (including test packets); any other value returns the count of
    /// non-test sends within the last `window_secs` seconds as of `now`.
    #[must_use]
    pub fn sent_count(&mut self, now: Instant, window_secs: u64) -> u64 {
        if window_secs == 0 {
            return self.cumulative_sent;
        }
        prune(&mut self.sent_log, now, Duration::from_secs(window_secs));
        windowed_count(&self.sent_log, now, Duration::from_secs(window_secs))
    }

    /// Received-frame count, with the same `window_secs` convention as
    /// [`FrameStats::sent_count`].
    #[must_use]
    pub fn received_count(&mut self, now: Instant, window_secs: u64) -> u64 {
        if window_secs == 0 {
            return self.cumulative_received;
        }
        prune(&mut self.received_log, now, Duration::from_secs(window_secs));
        windowed_count(&self.received_log, now, Duration::from_secs(window_secs))
    }

    /// Cumulative sent count, non-test packets only.
    #[must_use]
    pub fn cumulative_sent_non_test(&self) -> u64 {
        self.cumulative_sent_non_test
    }

    /// Cumulative received count, non-test packets only.
    #[must_use]
    pub fn cumulative_received_non_test(&self) -> u64 {
        self.cumulative_received_non_test
    }

    /// `received_count(window) / sent_count(window)`, both restricted to
    /// non-test packets, capped at 1.0. Defaults to 1.0 when nothing has
    /// been sent (an empty window is trivially "fully delivered").
    #[must_use]
    pub fn success_rate(&mut self, now: Instant, window_secs: u64) -> f64 {
        let sent = if window_secs == 0 {
            self.cumulative_sent_non_test
        } else {
            prune(&mut self.sent_log, now, Duration::from_secs(window_secs));
            windowed_count(&self.sent_log, now, Duration::from_secs(window_secs))
        };
        if sent == 0 {
            return 1.0;
        }
        let received = if window_secs == 0 {
            self.cumulative_received_non_test
        } else {
            prune(&mut self.received_log, now, Duration::from_secs(window_secs));
            windowed_count(&self.received_log, now, Duration::from_secs(window_secs))
        };
        (received as f64 / sent as f64).min(1.0)
    }

    /// Average RSSI (dBm) over the window, or the last received RSSI when
    /// `window_secs == 0`. Returns 0 when nothing with a known RSSI has
    /// been received.
    #[must_use]
    pub fn received_rssi_dbm(&mut self, now: Instant, window_secs: u64) -> i32 {
        if window_secs == 0 {
            return self.received_log.back().and_then(|e| e.rssi_dbm).map_or(0, i32::from);
        }
        prune(&mut self.received_log, now, Duration::from_secs(window_secs));
        let window = Duration::from_secs(window_secs);
        let samples: Vec<i32> = self
            .received_log
            .iter()
            .filter(|e| now.duration_since(e.at) < window)
            .filter_map(|e| e.rssi_dbm.map(i32::from))
            .collect();
        if samples.is_empty() {
            return 0;
        }
        samples.iter().sum::<i32>() / i32::try_from(samples.len()).unwrap_or(1)
    }
}

fn prune(log: &mut VecDeque<LogEntry>, now: Instant, window: Duration) {
    while let Some(front) = log.front() {
        if now.duration_since(front.at) > window {
            log.pop_front();
        } else {
            break;
        }
    }
}

fn windowed_count(log: &VecDeque<LogEntry>, now: Instant, window: Duration) -> u64 {
    log.iter().filter(|e| now.duration_since(e.at) < window).count() as u64
}
