//! `MetricsSink`: an append-only record of application-level events,
//! distinct from `tracing`'s diagnostic log stream.
//!
//! A `tracing` subscriber tells an operator "what the process is doing";
//! a `MetricsSink` tells an analyst "what the network did". The two are
//! never merged: coordinators emit both, independently, at the same call
//! sites.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use serde_json::Value;

/// One row of setup metadata, logged once at coordinator startup.
#[derive(Debug, Clone, Serialize)]
pub struct SetupParameters {
    /// Network id the coordinator is operating on.
    pub network_id: u16,
    /// Name of the active TDMA schedule, or `"unknown"` before the first
    /// `GATEWAY_INFO` event.
    pub schedule_name: String,
    /// Which side logged this: `"edge"` or `"cloud"`.
    pub role: &'static str,
}

/// One row describing a single dispatched event, logged as it is handled.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Which channel the event was dispatched on: `"edge"` or `"cloud"`.
    pub channel: &'static str,
    /// Short event discriminant, e.g. `"node_joined"`.
    pub kind: &'static str,
    /// Node address involved, if any.
    pub node_address: Option<u64>,
    /// Gateway address involved, if any.
    pub gateway_address: Option<u64>,
    /// Payload length in bytes, if the event carries application data.
    pub payload_len: Option<usize>,
}

/// One row of periodic aggregate statistics, logged on a timer.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodicMetrics {
    /// The gateway this snapshot describes.
    pub gateway_address: u64,
    /// Number of nodes currently considered live.
    pub live_node_count: usize,
    /// Downlink packet delivery rate, in `[0.0, 1.0]`.
    pub success_rate_downlink: f64,
    /// Uplink packet delivery rate, in `[0.0, 1.0]`.
    pub success_rate_uplink: f64,
    /// Mean measured round-trip latency, in milliseconds.
    pub mean_latency_ms: f64,
}

/// Sink for application-data records, independent of diagnostic logging.
///
/// Implementations must not block the calling coordinator indefinitely;
/// [`JsonlMetricsSink`] buffers and flushes synchronously, which is
/// acceptable because it is only ever invoked from the coordinator's own
/// worker thread, never from the serial-reader thread.
pub trait MetricsSink: Send {
    /// Records the one-time setup parameters for a session.
    fn log_setup_parameters(&mut self, params: &SetupParameters);

    /// Records one dispatched event.
    fn log_event(&mut self, record: &EventRecord);

    /// Records one periodic aggregate snapshot.
    fn log_periodic_metrics(&mut self, metrics: &PeriodicMetrics);
}

/// A no-op sink, for configurations that disable application-data logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn log_setup_parameters(&mut self, _params: &SetupParameters) {}
    fn log_event(&mut self, _record: &EventRecord) {}
    fn log_periodic_metrics(&mut self, _metrics: &PeriodicMetrics) {}
}

/// Appends one JSON object per line to a file, each tagged with a
/// `record_type` discriminant and a Unix-epoch millisecond timestamp.
pub struct JsonlMetricsSink {
    writer: BufWriter<File>,
}

impl JsonlMetricsSink {
    /// Opens (creating if absent, appending if present) the metrics log at
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying `io::Error` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    fn write_record(&mut self, record_type: &'static str, value: &impl Serialize) {
        let mut row = match serde_json::to_value(value) {
            Ok(Value::Object(map)) => map,
            _ => return,
        };
        row.insert("record_type".into(), Value::String(record_type.into()));
        row.insert("timestamp_ms".into(), Value::from(epoch_millis()));
        if let Ok(line) = serde_json::to_string(&Value::Object(row)) {
            let _ = writeln!(self.writer, "{line}");
            let _ = self.writer.flush();
        }
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

impl MetricsSink for JsonlMetricsSink {
    fn log_setup_parameters(&mut self, params: &SetupParameters) {
        self.write_record("setup_parameters", params);
    }

    fn log_event(&mut self, record: &EventRecord) {
        self.write_record("event", record);
    }

    fn log_periodic_metrics(&mut self, metrics: &PeriodicMetrics) {
        self.write_record("periodic_metrics", metrics);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn jsonl_sink_appends_tagged_lines() {
        let file = NamedTempFile::new().expect("tempfile");
        let mut sink = JsonlMetricsSink::open(file.path()).expect("open");
        sink.log_setup_parameters(&SetupParameters {
            network_id: 1,
            schedule_name: "medium".into(),
            role: "edge",
        });
        sink.log_event(&EventRecord {
            channel: "edge",
            kind: "node_joined",
            node_address: Some(7),
            gateway_address: None,
            payload_len: None,
        });
        drop(sink);

        let reader = BufReader::new(File::open(file.path()).expect("reopen"));
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>().expect("lines");
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(&lines[0]).expect("valid json");
        assert_eq!(first["record_type"], "setup_parameters");
        assert_eq!(first["schedule_name"], "medium");
        let second: Value = serde_json::from_str(&lines[1]).expect("valid json");
        assert_eq!(second["record_type"], "event");
        assert_eq!(second["node_address"], 7);
    }

    #[test]
    fn null_sink_accepts_everything_silently() {
        let mut sink = NullMetricsSink;
        sink.log_setup_parameters(&SetupParameters {
            network_id: 1,
            schedule_name: "tiny".into(),
            role: "cloud",
        });
        sink.log_event(&EventRecord {
            channel: "cloud",
            kind: "gateway_info",
            node_address: None,
            gateway_address: Some(9),
            payload_len: None,
        });
    }
}
