//! Broker topic naming. Shared with the cloud coordinator; see
//! `mari_core::topic`.

pub use mari_core::{to_cloud_topic, to_edge_topic};
