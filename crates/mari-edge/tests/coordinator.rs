//! End-to-end dispatch tests driving an [`EdgeCoordinator`] through an
//! in-memory serial link and broker bus.

use std::time::{Duration, Instant};

use mari_core::{BrokerTransport, SystemClock};
use mari_edge::{
    AppEvent, BrokerConfig, ConfigurationError, EdgeConfig, EdgeCoordinator, LatencyProbeEngine, LoadGenerator,
};
use mari_harness::{BrokerBus, serial_pair};
use mari_proto::{
    BROADCAST_ADDRESS, Event, EventChannel, EventTag, Frame, GatewayInfo, Header, LATENCY_MAGIC, NodeIdentity,
};

fn config(load_percent: u8, broker: Option<BrokerConfig>) -> EdgeConfig {
    EdgeConfig {
        serial_port: "/dev/ttyACM0".into(),
        baudrate: 1_000_000,
        broker,
        network_id: 1,
        load_percent,
        latency_probe_enabled: false,
        log_dir: None,
        topic_prefix: "mari".into(),
    }
}

#[test]
fn join_then_data_then_left_round_trips_through_the_coordinator() {
    let (serial, handle) = serial_pair();
    let coordinator =
        EdgeCoordinator::new(config(0, None), Box::new(serial), None, None, Box::new(SystemClock));

    handle.push_frame(Event::NodeJoined(NodeIdentity::Edge(7)).encode(EventChannel::Edge));
    let events = coordinator.poll();
    assert_eq!(events, vec![AppEvent::NodeJoined { address: 7 }]);

    let frame = Frame::new(Header { source: 7, ..Header::new(0) }, b"hello".to_vec());
    handle.push_frame(Event::NodeData(frame.clone()).encode(EventChannel::Edge));
    let events = coordinator.poll();
    assert_eq!(events, vec![AppEvent::NodeData(frame)]);

    handle.push_frame(Event::NodeLeft(NodeIdentity::Edge(7)).encode(EventChannel::Edge));
    let events = coordinator.poll();
    assert_eq!(events, vec![AppEvent::NodeLeft { address: 7 }]);
}

#[test]
fn left_event_for_unknown_node_raises_nothing() {
    let (serial, handle) = serial_pair();
    let coordinator =
        EdgeCoordinator::new(config(0, None), Box::new(serial), None, None, Box::new(SystemClock));

    handle.push_frame(Event::NodeLeft(NodeIdentity::Edge(42)).encode(EventChannel::Edge));
    assert!(coordinator.poll().is_empty());
}

#[test]
fn latency_probe_round_trip_is_consumed_silently() {
    let (serial, handle) = serial_pair();
    let coordinator =
        EdgeCoordinator::new(config(0, None), Box::new(serial), None, None, Box::new(SystemClock));

    let mut engine = LatencyProbeEngine::new(&coordinator);
    let t0 = Instant::now();
    engine.tick(t0).expect("probe send succeeds");

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 1, "one HDLC-encoded downlink command expected");

    // Echo the probe payload back as if the gateway replied instantly: the
    // probe id and tx timestamp round-trip verbatim inside the payload, so
    // we reconstruct what send_latency_probe broadcast by re-deriving the
    // probe id (0, since this is the first probe this coordinator sent).
    let mut payload = Vec::new();
    payload.extend_from_slice(LATENCY_MAGIC);
    payload.extend_from_slice(&0u32.to_le_bytes());
    payload.extend_from_slice(&0u64.to_le_bytes());
    let reply = Frame::new(Header { source: 99, ..Header::new(BROADCAST_ADDRESS) }, payload);
    handle.push_frame(Event::NodeData(reply).encode(EventChannel::Edge));

    let events = coordinator.poll();
    assert!(events.is_empty(), "latency-probe replies never reach the application callback");
}

#[test]
fn load_generator_emits_once_schedule_is_known() {
    let (serial, handle) = serial_pair();
    let coordinator = EdgeCoordinator::new(config(100, None), Box::new(serial), None, None, Box::new(SystemClock));
    let mut generator = LoadGenerator::new(&coordinator, 100);

    let t0 = Instant::now();
    generator.tick(t0).expect("no-op while schedule unknown");
    assert!(handle.sent_frames().is_empty());

    handle.push_frame(
        Event::GatewayInfo(GatewayInfo { address: 1, network_id: 1, schedule_id: 2, schedule_stats: [0; 32] })
            .encode(EventChannel::Edge),
    );
    coordinator.poll();

    generator.tick(t0 + Duration::from_secs(1)).expect("send succeeds");
    assert_eq!(handle.sent_frames().len(), 1);
}

#[test]
fn load_generator_stays_silent_for_a_schedule_id_outside_the_schedule_table() {
    let (serial, handle) = serial_pair();
    let coordinator = EdgeCoordinator::new(config(100, None), Box::new(serial), None, None, Box::new(SystemClock));
    let mut generator = LoadGenerator::new(&coordinator, 100);

    // Schedule id 5 is one past the end of the 5-entry schedule table;
    // unlike the not-yet-identified case above, the gateway is known here,
    // but its announced schedule is not.
    handle.push_frame(
        Event::GatewayInfo(GatewayInfo { address: 1, network_id: 1, schedule_id: 5, schedule_stats: [0; 32] })
            .encode(EventChannel::Edge),
    );
    coordinator.poll();

    let t0 = Instant::now();
    generator.tick(t0).expect("no-op for an unrecognized schedule id");
    assert!(handle.sent_frames().is_empty());
}

#[test]
fn gateway_info_with_an_unknown_schedule_id_surfaces_a_configuration_error() {
    let (serial, handle) = serial_pair();
    let coordinator =
        EdgeCoordinator::new(config(0, None), Box::new(serial), None, None, Box::new(SystemClock));

    handle.push_frame(
        Event::GatewayInfo(GatewayInfo { address: 1, network_id: 1, schedule_id: 5, schedule_stats: [0; 32] })
            .encode(EventChannel::Edge),
    );
    let events = coordinator.poll();
    assert_eq!(
        events,
        vec![
            AppEvent::GatewayInfo(GatewayInfo { address: 1, network_id: 1, schedule_id: 5, schedule_stats: [0; 32] }),
            AppEvent::ConfigurationError(ConfigurationError::UnknownScheduleId { id: 5 }),
        ]
    );
}

#[test]
fn gateway_info_forwards_to_broker_and_subsequent_events_are_gateway_qualified() {
    let bus = BrokerBus::new();
    let mut cloud_side = bus.connect();
    cloud_side.subscribe("/mari/0001/to_cloud").expect("subscribe succeeds");

    let (serial, handle) = serial_pair();
    let broker = bus.connect();
    let coordinator = EdgeCoordinator::new(
        config(0, Some(BrokerConfig { host: "broker".into(), port: 1883 })),
        Box::new(serial),
        Some(Box::new(broker)),
        None,
        Box::new(SystemClock),
    );

    handle.push_frame(
        Event::GatewayInfo(GatewayInfo { address: 55, network_id: 1, schedule_id: 0, schedule_stats: [0; 32] })
            .encode(EventChannel::Edge),
    );
    coordinator.poll();

    handle.push_frame(Event::NodeJoined(NodeIdentity::Edge(9)).encode(EventChannel::Edge));
    coordinator.poll();

    let forwarded = cloud_side.poll_received();
    assert_eq!(forwarded.len(), 2, "gateway_info and node_joined should both reach the cloud topic");
    let decoded = Event::decode(&forwarded[1], EventChannel::Cloud).expect("valid cloud event");
    match decoded {
        Event::NodeJoined(NodeIdentity::Cloud(info)) => {
            assert_eq!(info.gateway_address, 55);
            assert_eq!(info.node_address, 9);
        }
        other => panic!("expected a gateway-qualified NodeJoined, got {other:?}"),
    }
}

#[test]
fn downlink_command_arriving_over_the_broker_is_written_to_serial() {
    let bus = BrokerBus::new();
    let mut cloud_side = bus.connect();

    let (serial, handle) = serial_pair();
    let broker = bus.connect();
    let coordinator = EdgeCoordinator::new(
        config(0, Some(BrokerConfig { host: "broker".into(), port: 1883 })),
        Box::new(serial),
        Some(Box::new(broker)),
        None,
        Box::new(SystemClock),
    );

    handle.push_frame(
        Event::GatewayInfo(GatewayInfo { address: 55, network_id: 1, schedule_id: 0, schedule_stats: [0; 32] })
            .encode(EventChannel::Edge),
    );
    coordinator.poll();

    let downlink = Frame::new(Header::new(9), b"ping".to_vec());
    let mut message = vec![EventTag::NodeData as u8];
    message.extend_from_slice(&downlink.to_bytes());
    cloud_side.publish("/mari/0001/to_edge", &message).expect("publish succeeds");

    coordinator.poll();
    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 1, "the downlink command should reach the serial transport");
}
