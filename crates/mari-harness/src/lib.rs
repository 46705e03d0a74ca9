//! In-memory transport doubles for integration tests: a fake UART link
//! to the gateway, and a fake broker bus connecting an edge coordinator
//! to a cloud coordinator.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

mod broker;
mod serial;

pub use broker::{BrokerBus, BrokerClient};
pub use serial::{InMemorySerial, SerialHandle, serial_pair};
