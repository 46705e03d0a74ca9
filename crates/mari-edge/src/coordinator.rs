//! Edge coordinator (C5): dispatches decoded wire events between the
//! gateway serial link and the application, with optional broker
//! republishing.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use mari_core::{Clock, Gateway, MetricsSink, SetupParameters};
use mari_proto::{
    BROADCAST_ADDRESS, DownlinkCommand, Event, EventChannel, EventTag, Frame, GatewayInfo, Header,
    LATENCY_MAGIC, NodeIdentity, NodeInfoCloud, NodeStatsReply, WireRecord, encode_frame,
    is_test_packet,
};

use crate::{
    callback::AppEvent,
    config::{ConfigurationError, EdgeConfig},
    transport::{BrokerTransport, SerialTransport, TransportError},
};

/// Pending latency probes older than this are dropped unmatched.
const PROBE_EXPIRY: Duration = Duration::from_secs(2);

/// Point-in-time connectivity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Whether the serial transport reports an open link.
    pub connected: bool,
    /// When the last frame was decoded off the serial link, if ever.
    pub last_received: Option<Instant>,
    /// Whether the broker subscription for this gateway's downlink
    /// command topic has been established (only ever true once the
    /// gateway has identified itself and a broker is configured).
    pub broker_subscribed: bool,
}

/// Coordinates one gateway's serial link, optional broker forwarding, and
/// the application callback sequence.
///
/// All mutable network state lives behind [`EdgeCoordinator::gateway`]'s
/// mutex, so the coordinator can be shared (typically via `Arc`) with the
/// latency probe engine and load generator, each running on its own
/// thread and calling [`EdgeCoordinator::send_frame`] independently.
pub struct EdgeCoordinator {
    config: EdgeConfig,
    serial: Mutex<Box<dyn SerialTransport>>,
    broker: Mutex<Option<Box<dyn BrokerTransport>>>,
    metrics: Mutex<Option<Box<dyn MetricsSink>>>,
    clock: Box<dyn Clock>,
    gateway: Mutex<Gateway>,
    last_received: Mutex<Option<Instant>>,
    broker_subscribed: Mutex<bool>,
    pending_probes: Mutex<HashMap<u32, Instant>>,
    next_probe_id: Mutex<u32>,
}

impl EdgeCoordinator {
    /// Builds a coordinator around a not-yet-identified gateway
    /// (`GatewayInfo::default()`), matching the firmware's own startup
    /// sequence: the gateway's address and schedule are unknown until its
    /// first `GATEWAY_INFO` broadcast arrives.
    pub fn new(
        config: EdgeConfig,
        serial: Box<dyn SerialTransport>,
        broker: Option<Box<dyn BrokerTransport>>,
        metrics: Option<Box<dyn MetricsSink>>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let mut metrics = metrics;
        if let Some(sink) = metrics.as_deref_mut() {
            sink.log_setup_parameters(&SetupParameters {
                network_id: config.network_id,
                schedule_name: "unknown".to_string(),
                role: "edge",
            });
        }
        Self {
            config,
            serial: Mutex::new(serial),
            broker: Mutex::new(broker),
            metrics: Mutex::new(metrics),
            clock,
            gateway: Mutex::new(Gateway::new(GatewayInfo::default(), now)),
            last_received: Mutex::new(None),
            broker_subscribed: Mutex::new(false),
            pending_probes: Mutex::new(HashMap::new()),
            next_probe_id: Mutex::new(0),
        }
    }

    /// Current connectivity snapshot.
    #[must_use]
    pub fn health(&self) -> Health {
        let connected = self.serial.lock().expect("serial mutex poisoned").is_connected();
        let last_received = *self.last_received.lock().expect("last_received mutex poisoned");
        let broker_subscribed = *self.broker_subscribed.lock().expect("broker_subscribed mutex poisoned");
        Health { connected, last_received, broker_subscribed }
    }

    /// Drains the serial transport (and broker, if configured) and
    /// dispatches every decoded record, returning the application events
    /// raised in arrival order.
    pub fn poll(&self) -> Vec<AppEvent> {
        let records = self.serial.lock().expect("serial mutex poisoned").poll_received();
        let mut events = Vec::new();
        for record in records {
            events.extend(self.handle_serial_record(&record));
        }

        let broker_messages = {
            let mut guard = self.broker.lock().expect("broker mutex poisoned");
            guard.as_mut().map_or_else(Vec::new, BrokerTransport::poll_received)
        };
        for message in broker_messages {
            self.handle_broker_message(&message);
        }

        events
    }

    /// Prunes stale nodes and expired latency probes, and, if a metrics
    /// sink is configured, appends a periodic snapshot. Call at least once
    /// a second.
    pub fn update(&self) {
        let now = self.clock.now();

        self.pending_probes
            .lock()
            .expect("pending_probes mutex poisoned")
            .retain(|_, sent_at| now.duration_since(*sent_at) <= PROBE_EXPIRY);

        let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
        gateway.update(now);

        if let Some(sink) = self.metrics.lock().expect("metrics mutex poisoned").as_deref_mut() {
            let live = gateway.live_nodes(now).count();
            sink.log_periodic_metrics(&mari_core::PeriodicMetrics {
                gateway_address: gateway.address(),
                live_node_count: live,
                success_rate_downlink: gateway.stats().success_rate(now, 0),
                success_rate_uplink: 1.0,
                mean_latency_ms: gateway.latency_stats().mean_ms(),
            });
        }
    }

    /// Sends application (or test) data to `dst`, accounting for it in
    /// gateway/node statistics before transmitting.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SerialWrite`] if the underlying transport
    /// write fails.
    pub fn send_frame(&self, dst: u64, payload: impl Into<bytes::Bytes>) -> Result<(), TransportError> {
        let frame = Frame::new(Header::new(dst), payload);
        let is_test = is_test_packet(&frame.payload);
        let now = self.clock.now();

        {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            gateway.register_sent_frame(now, &frame, is_test);
        }

        let command = DownlinkCommand { frame };
        let encoded = encode_frame(&command.encode());
        self.serial.lock().expect("serial mutex poisoned").send(&encoded)
    }

    /// The gateway's own address, if known.
    #[must_use]
    pub fn gateway_address(&self) -> u64 {
        self.gateway.lock().expect("gateway mutex poisoned").address()
    }

    /// Broadcasts one latency probe and records its send time, for a
    /// probe-engine driver to call on a fixed interval.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SerialWrite`] if the underlying transport
    /// write fails.
    pub fn send_latency_probe(&self, now: Instant) -> Result<(), TransportError> {
        let probe_id = {
            let mut next = self.next_probe_id.lock().expect("next_probe_id mutex poisoned");
            let id = *next;
            *next = next.wrapping_add(1);
            id
        };

        let session_started = self.gateway.lock().expect("gateway mutex poisoned").session_started();
        let tx_micros = now.saturating_duration_since(session_started).as_micros() as u64;

        let mut payload = Vec::with_capacity(LATENCY_MAGIC.len() + 4 + 8);
        payload.extend_from_slice(LATENCY_MAGIC);
        payload.extend_from_slice(&probe_id.to_le_bytes());
        payload.extend_from_slice(&tx_micros.to_le_bytes());

        self.pending_probes.lock().expect("pending_probes mutex poisoned").insert(probe_id, now);
        self.send_frame(BROADCAST_ADDRESS, payload)
    }

    fn handle_serial_record(&self, record: &[u8]) -> Vec<AppEvent> {
        let Ok(event) = Event::decode(record, EventChannel::Edge) else {
            tracing::debug!("dropping malformed serial record");
            return Vec::new();
        };

        let now = self.clock.now();
        *self.last_received.lock().expect("last_received mutex poisoned") = Some(now);

        self.forward_to_broker(&event);

        match event {
            Event::NodeJoined(identity) => self.on_node_joined(identity.node_address(), now),
            Event::NodeLeft(identity) => self.on_node_left(identity.node_address()),
            Event::NodeKeepAlive(identity) => {
                self.on_node_keep_alive(identity.node_address(), now);
                Vec::new()
            }
            Event::GatewayInfo(info) => self.on_gateway_info(info, now),
            Event::NodeData(frame) => self.on_node_data(frame, now),
            Event::LatencyData(frame) => self.on_node_data(frame, now),
        }
    }

    fn on_node_joined(&self, address: u64, now: Instant) -> Vec<AppEvent> {
        {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            gateway.add_node(address, now);
        }
        self.log_event("node_joined", Some(address), None);
        vec![AppEvent::NodeJoined { address }]
    }

    fn on_node_left(&self, address: u64) -> Vec<AppEvent> {
        let removed = {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            gateway.remove_node(address)
        };
        if removed.is_none() {
            return Vec::new();
        }
        self.log_event("node_left", Some(address), None);
        vec![AppEvent::NodeLeft { address }]
    }

    fn on_node_keep_alive(&self, address: u64, now: Instant) {
        let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
        gateway.update_node_liveness(address, now);
    }

    fn on_gateway_info(&self, info: GatewayInfo, now: Instant) -> Vec<AppEvent> {
        let is_first = {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            let first = gateway.address() == 0;
            gateway.set_info(info, now);
            first
        };

        if is_first {
            if let Some(broker) = self.broker.lock().expect("broker mutex poisoned").as_mut() {
                let topic = crate::topic::to_edge_topic(&self.config.topic_prefix, info.network_id);
                if broker.subscribe(&topic).is_ok() {
                    *self.broker_subscribed.lock().expect("broker_subscribed mutex poisoned") = true;
                }
            }
        }

        let schedule = mari_proto::schedule_by_id(info.schedule_id);
        let schedule_name = schedule.map_or("unknown", |s| s.name);
        if let Some(sink) = self.metrics.lock().expect("metrics mutex poisoned").as_deref_mut() {
            sink.log_setup_parameters(&SetupParameters {
                network_id: self.config.network_id,
                schedule_name: schedule_name.to_string(),
                role: "edge",
            });
        }

        let mut events = vec![AppEvent::GatewayInfo(info)];
        if schedule.is_none() {
            // The load generator reads this same gateway state and refuses
            // to start against an unrecognized schedule id on its own; this
            // surfaces that refusal to the caller.
            events.push(AppEvent::ConfigurationError(ConfigurationError::UnknownScheduleId {
                id: info.schedule_id,
            }));
        }
        events
    }

    fn on_node_data(&self, frame: Frame, now: Instant) -> Vec<AppEvent> {
        let source = frame.header.source;
        let payload = frame.payload.clone();

        {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            gateway.update_node_liveness(source, now);
        }

        let mut marked = false;

        if payload.starts_with(LATENCY_MAGIC) {
            marked = true;
            self.match_latency_probe(&payload, source, now);
        } else if payload.len() == NodeStatsReply::SIZE {
            if let Ok(reply) = NodeStatsReply::decode(&payload) {
                marked = true;
                let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
                if let Some(node) = gateway.get_node_mut(source) {
                    node.apply_stats_reply(reply.rx_app_packets, reply.tx_app_packets);
                }
            }
        }

        {
            let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
            gateway.register_received_frame(now, &frame, marked, None);
        }

        if marked {
            return Vec::new();
        }

        self.log_event("node_data", Some(source), Some(frame.payload.len()));
        vec![AppEvent::NodeData(frame)]
    }

    /// Matches an inbound latency-probe payload against a still-pending
    /// probe, pushing the measured RTT into both the gateway's and the
    /// responding node's latency histograms. Unmatched or expired probe
    /// ids are dropped silently: a late reply is not an error.
    fn match_latency_probe(&self, payload: &[u8], source: u64, now: Instant) {
        let magic_len = LATENCY_MAGIC.len();
        if payload.len() < magic_len + 4 {
            return;
        }
        let Ok(probe_id_bytes) = payload[magic_len..magic_len + 4].try_into() else { return };
        let probe_id = u32::from_le_bytes(probe_id_bytes);

        let sent_at = self.pending_probes.lock().expect("pending_probes mutex poisoned").remove(&probe_id);
        let Some(sent_at) = sent_at else { return };
        if now.duration_since(sent_at) > PROBE_EXPIRY {
            return;
        }

        let rtt_ms = now.duration_since(sent_at).as_secs_f64() * 1000.0;
        let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
        gateway.latency_stats().record_ms(rtt_ms);
        if let Some(node) = gateway.get_node_mut(source) {
            node.latency_stats().record_ms(rtt_ms);
        }
    }

    /// Republishes a decoded serial event onto the edge→cloud topic,
    /// translating node identities into the gateway-qualified
    /// [`NodeInfoCloud`] envelope: a forwarded `NODE_DATA` frame gets
    /// `header.destination` overwritten with this gateway's own address
    /// so the cloud side can route it back, matching the observed
    /// upstream convention.
    fn forward_to_broker(&self, event: &Event) {
        let mut broker_guard = self.broker.lock().expect("broker mutex poisoned");
        let Some(broker) = broker_guard.as_mut() else { return };

        let (gateway_address, network_id) = {
            let gateway = self.gateway.lock().expect("gateway mutex poisoned");
            (gateway.address(), gateway.info().network_id)
        };
        if gateway_address == 0 {
            return;
        }

        let wire_event = match event {
            Event::NodeJoined(identity) => Event::NodeJoined(NodeIdentity::Cloud(NodeInfoCloud {
                gateway_address,
                node_address: identity.node_address(),
            })),
            Event::NodeLeft(identity) => Event::NodeLeft(NodeIdentity::Cloud(NodeInfoCloud {
                gateway_address,
                node_address: identity.node_address(),
            })),
            Event::NodeKeepAlive(identity) => {
                Event::NodeKeepAlive(NodeIdentity::Cloud(NodeInfoCloud {
                    gateway_address,
                    node_address: identity.node_address(),
                }))
            }
            Event::GatewayInfo(info) => Event::GatewayInfo(*info),
            Event::NodeData(frame) => {
                let mut frame = frame.clone();
                frame.header.destination = gateway_address;
                Event::NodeData(frame)
            }
            // Test/probe traffic never leaves the edge.
            Event::LatencyData(_) => return,
        };

        let topic = crate::topic::to_cloud_topic(&self.config.topic_prefix, network_id);
        let _ = broker.publish(&topic, &wire_event.encode(EventChannel::Cloud));
    }

    fn handle_broker_message(&self, data: &[u8]) {
        let Some((&tag, rest)) = data.split_first() else { return };
        if tag != EventTag::NodeData as u8 {
            tracing::debug!(tag, "ignoring unknown broker event type");
            return;
        }
        let Ok(frame) = Frame::from_bytes(rest) else {
            tracing::debug!("dropping malformed broker-forwarded frame");
            return;
        };
        let _ = self.send_frame(frame.header.destination, frame.payload);
    }

    /// Exposes the clock to cooperating tasks (the probe engine and load
    /// generator need `now()` too).
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Gives a cooperating task (e.g. the load generator reading the
    /// active schedule) locked access to the gateway state.
    pub fn with_gateway<R>(&self, f: impl FnOnce(&mut Gateway) -> R) -> R {
        let mut gateway = self.gateway.lock().expect("gateway mutex poisoned");
        f(&mut gateway)
    }

    fn log_event(&self, kind: &'static str, node_address: Option<u64>, payload_len: Option<usize>) {
        if let Some(sink) = self.metrics.lock().expect("metrics mutex poisoned").as_deref_mut() {
            sink.log_event(&mari_core::EventRecord {
                channel: "edge",
                kind,
                node_address,
                gateway_address: None,
                payload_len,
            });
        }
    }
}
