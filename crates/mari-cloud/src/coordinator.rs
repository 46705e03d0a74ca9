//! Cloud coordinator (C6): a multi-gateway registry consuming broker
//! events published by one or more edge coordinators.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use mari_core::{BrokerTransport, Clock, Gateway, MetricsSink, TransportError, to_cloud_topic, to_edge_topic};
use mari_proto::{Event, EventChannel, EventTag, Frame, GatewayInfo, Header, NodeIdentity};

use crate::{callback::CloudEvent, config::CloudConfig};

/// A gateway is evicted if no `GATEWAY_INFO` has refreshed it within this
/// window, mirroring the edge side's node liveness TTL.
pub const GATEWAY_TTL: Duration = Duration::from_secs(10);

/// Point-in-time connectivity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Whether the broker transport reports an open connection.
    pub connected: bool,
    /// When the last message was decoded off the broker, if ever.
    pub last_received: Option<Instant>,
}

/// Coordinates the broker link shared by every gateway on one network id,
/// maintaining a `gateway_address -> Gateway` registry.
pub struct CloudCoordinator {
    config: CloudConfig,
    broker: Mutex<Box<dyn BrokerTransport>>,
    metrics: Mutex<Option<Box<dyn MetricsSink>>>,
    clock: Box<dyn Clock>,
    gateways: Mutex<HashMap<u64, Gateway>>,
    last_received: Mutex<Option<Instant>>,
}

impl CloudCoordinator {
    /// Builds a coordinator and subscribes to this network's edge→cloud
    /// topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BrokerConnect`] if the subscription
    /// cannot be established.
    pub fn new(
        config: CloudConfig,
        mut broker: Box<dyn BrokerTransport>,
        metrics: Option<Box<dyn MetricsSink>>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, TransportError> {
        let topic = to_cloud_topic(&config.topic_prefix, config.network_id);
        broker.subscribe(&topic)?;
        Ok(Self {
            config,
            broker: Mutex::new(broker),
            metrics: Mutex::new(metrics),
            clock,
            gateways: Mutex::new(HashMap::new()),
            last_received: Mutex::new(None),
        })
    }

    /// Current connectivity snapshot. Cloud-side broker transports have
    /// no `is_connected` signal of their own, so `connected` reflects
    /// whether a message has ever been received.
    #[must_use]
    pub fn health(&self) -> Health {
        let last_received = *self.last_received.lock().expect("last_received mutex poisoned");
        Health { connected: last_received.is_some(), last_received }
    }

    /// Drains the broker transport and dispatches every decoded message,
    /// returning the application events raised in arrival order.
    pub fn poll(&self) -> Vec<CloudEvent> {
        let messages = self.broker.lock().expect("broker mutex poisoned").poll_received();
        let mut events = Vec::new();
        for message in messages {
            events.extend(self.handle_message(&message));
        }
        events
    }

    /// Evicts gateways whose `GATEWAY_INFO` has not refreshed within
    /// [`GATEWAY_TTL`], and prunes each surviving gateway's own stale
    /// nodes. Call at least once a second.
    pub fn update(&self) {
        let now = self.clock.now();
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        gateways.retain(|_, gateway| {
            gateway.last_gateway_info().is_some_and(|seen| now.duration_since(seen) <= GATEWAY_TTL)
        });
        for gateway in gateways.values_mut() {
            gateway.update(now);
        }
    }

    /// Publishes a downlink command to `gateway_address`'s edge
    /// coordinator, addressed to node `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BrokerPublish`] if the publish fails.
    pub fn send_frame(&self, dst: u64, payload: impl Into<bytes::Bytes>) -> Result<(), TransportError> {
        let frame = Frame::new(Header::new(dst), payload);
        let mut message = Vec::with_capacity(1 + Header::SIZE + frame.payload.len());
        message.push(EventTag::NodeData as u8);
        message.extend_from_slice(&frame.to_bytes());

        let topic = to_edge_topic(&self.config.topic_prefix, self.config.network_id);
        self.broker.lock().expect("broker mutex poisoned").publish(&topic, &message)
    }

    /// Gives a cooperating task locked access to the gateway registry,
    /// e.g. to read per-gateway PDR/latency stats forwarded from the
    /// edge side.
    pub fn with_gateways<R>(&self, f: impl FnOnce(&mut HashMap<u64, Gateway>) -> R) -> R {
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        f(&mut gateways)
    }

    fn handle_message(&self, data: &[u8]) -> Vec<CloudEvent> {
        let Ok(event) = Event::decode(data, EventChannel::Cloud) else {
            tracing::debug!("dropping malformed broker message");
            return Vec::new();
        };

        let now = self.clock.now();
        *self.last_received.lock().expect("last_received mutex poisoned") = Some(now);

        match event {
            Event::GatewayInfo(info) => self.on_gateway_info(info, now),
            Event::NodeJoined(identity) => self.on_node_joined(identity, now),
            Event::NodeLeft(identity) => self.on_node_left(identity),
            Event::NodeKeepAlive(identity) => {
                self.on_node_keep_alive(identity, now);
                Vec::new()
            }
            Event::NodeData(frame) => self.on_node_data(frame, now),
            // Probe/load traffic is edge-local and never forwarded.
            Event::LatencyData(_) => Vec::new(),
        }
    }

    fn on_gateway_info(&self, info: GatewayInfo, now: Instant) -> Vec<CloudEvent> {
        let gateway_address = info.address;
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        gateways
            .entry(gateway_address)
            .and_modify(|gw| gw.set_info(info, now))
            .or_insert_with(|| Gateway::new(info, now));
        vec![CloudEvent::GatewayInfo { gateway_address, info }]
    }

    fn on_node_joined(&self, identity: NodeIdentity, now: Instant) -> Vec<CloudEvent> {
        let NodeIdentity::Cloud(id) = identity else { return Vec::new() };
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        let Some(gateway) = gateways.get_mut(&id.gateway_address) else { return Vec::new() };
        gateway.add_node(id.node_address, now);
        vec![CloudEvent::NodeJoined { gateway_address: id.gateway_address, node_address: id.node_address }]
    }

    fn on_node_left(&self, identity: NodeIdentity) -> Vec<CloudEvent> {
        let NodeIdentity::Cloud(id) = identity else { return Vec::new() };
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        let Some(gateway) = gateways.get_mut(&id.gateway_address) else { return Vec::new() };
        if gateway.remove_node(id.node_address).is_none() {
            return Vec::new();
        }
        vec![CloudEvent::NodeLeft { gateway_address: id.gateway_address, node_address: id.node_address }]
    }

    fn on_node_keep_alive(&self, identity: NodeIdentity, now: Instant) {
        let NodeIdentity::Cloud(id) = identity else { return };
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        let Some(gateway) = gateways.get_mut(&id.gateway_address) else { return };
        gateway.update_node_liveness(id.node_address, now);
    }

    /// A forwarded `NODE_DATA` frame carries the owning gateway's address
    /// in `frame.header.destination`, not the node's MAC destination: the
    /// edge coordinator rewrites it before publishing, since the cloud
    /// channel has no separate gateway-qualified envelope for data frames
    /// the way it does for JOIN/LEFT/KEEP_ALIVE.
    fn on_node_data(&self, frame: Frame, now: Instant) -> Vec<CloudEvent> {
        let gateway_address = frame.header.destination;
        let mut gateways = self.gateways.lock().expect("gateways mutex poisoned");
        let Some(gateway) = gateways.get_mut(&gateway_address) else { return Vec::new() };
        gateway.update_node_liveness(frame.header.source, now);
        vec![CloudEvent::NodeData { gateway_address, frame }]
    }
}
