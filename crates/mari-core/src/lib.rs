//! Gateway/node network model shared by the edge and cloud coordinators:
//! liveness, sliding-window frame statistics, packet delivery ratio,
//! latency histograms, and the application-data metrics sink.
//!
//! This crate depends on `mari-proto` for wire types and defines the
//! broker transport seam shared by both coordinators; serial port
//! specifics are edge-only and live in `mari-edge`.

mod clock;
mod gateway;
mod latency;
mod metrics;
mod node;
mod stats;
mod topic;
mod transport;

pub use clock::{Clock, SystemClock};
pub use gateway::Gateway;
pub use latency::{LatencyStats, MAX_SAMPLES};
pub use metrics::{EventRecord, JsonlMetricsSink, MetricsSink, NullMetricsSink, PeriodicMetrics, SetupParameters};
pub use node::{LIVENESS_TTL, Node};
pub use stats::{DEFAULT_WINDOW_SECONDS, FrameStats};
pub use topic::{to_cloud_topic, to_edge_topic};
pub use transport::{BrokerTransport, TransportError};
