//! Edge coordinator (C5), latency probe engine (C7), and load generator
//! (C8): the host-side process attached to one gateway over UART, with
//! optional broker republishing to a cloud component.

mod callback;
mod config;
mod coordinator;
mod load;
mod probe;
mod topic;
mod transport;

pub use callback::AppEvent;
pub use config::{BrokerConfig, ConfigurationError, EdgeConfig};
pub use coordinator::{EdgeCoordinator, Health};
pub use load::{LoadGenerator, UNKNOWN_SCHEDULE_WAIT};
pub use probe::{DEFAULT_PROBE_INTERVAL, LatencyProbeEngine};
pub use topic::{to_cloud_topic, to_edge_topic};
pub use transport::{BrokerTransport, SerialFrame, SerialTransport, TransportError};
