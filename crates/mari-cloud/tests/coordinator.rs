//! End-to-end dispatch tests driving a [`CloudCoordinator`] through an
//! in-memory broker bus, standing in for one or more edge coordinators.

use std::time::{Duration, Instant};

use mari_cloud::{BrokerConfig, CloudConfig, CloudCoordinator, CloudEvent, GATEWAY_TTL};
use mari_core::{BrokerTransport, Clock, SystemClock};
use mari_harness::BrokerBus;
use mari_proto::{EventChannel, EventTag, Frame, GatewayInfo, Header, NodeIdentity, NodeInfoCloud};

fn config() -> CloudConfig {
    CloudConfig {
        broker: BrokerConfig { host: "broker".into(), port: 1883 },
        network_id: 1,
        topic_prefix: "mari".into(),
    }
}

fn gateway_info_event(address: u64) -> Vec<u8> {
    mari_proto::Event::GatewayInfo(GatewayInfo { address, network_id: 1, schedule_id: 0, schedule_stats: [0; 32] })
        .encode(EventChannel::Cloud)
}

#[test]
fn subscribes_to_the_edge_to_cloud_topic_on_construction() {
    let bus = BrokerBus::new();
    let edge_side = bus.connect();
    let cloud_broker = bus.connect();

    let _coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    // Publishing on the topic the coordinator should have subscribed to
    // must reach it; there's no direct way to assert the subscription
    // itself, so this is exercised via end-to-end delivery in the tests
    // below. This test only asserts construction doesn't error.
    drop(edge_side);
}

#[test]
fn gateway_info_registers_a_new_gateway() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    let cloud_broker = bus.connect();
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    edge_side.publish("/mari/0001/to_cloud", &gateway_info_event(7)).expect("publish succeeds");

    let events = coordinator.poll();
    assert_eq!(
        events,
        vec![CloudEvent::GatewayInfo {
            gateway_address: 7,
            info: GatewayInfo { address: 7, network_id: 1, schedule_id: 0, schedule_stats: [0; 32] },
        }]
    );
}

#[test]
fn node_joined_for_unknown_gateway_is_dropped() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    let cloud_broker = bus.connect();
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    let identity = NodeIdentity::Cloud(NodeInfoCloud { gateway_address: 99, node_address: 3 });
    let event = mari_proto::Event::NodeJoined(identity).encode(EventChannel::Cloud);
    edge_side.publish("/mari/0001/to_cloud", &event).expect("publish succeeds");

    assert!(coordinator.poll().is_empty());
}

#[test]
fn node_joined_after_gateway_info_is_routed_to_the_right_gateway() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    let cloud_broker = bus.connect();
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    edge_side.publish("/mari/0001/to_cloud", &gateway_info_event(7)).expect("publish succeeds");
    coordinator.poll();

    let identity = NodeIdentity::Cloud(NodeInfoCloud { gateway_address: 7, node_address: 3 });
    let event = mari_proto::Event::NodeJoined(identity).encode(EventChannel::Cloud);
    edge_side.publish("/mari/0001/to_cloud", &event).expect("publish succeeds");

    let events = coordinator.poll();
    assert_eq!(events, vec![CloudEvent::NodeJoined { gateway_address: 7, node_address: 3 }]);
}

#[test]
fn node_data_is_routed_by_header_destination() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    let cloud_broker = bus.connect();
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    edge_side.publish("/mari/0001/to_cloud", &gateway_info_event(7)).expect("publish succeeds");
    coordinator.poll();

    // The edge rewrites header.destination to its own gateway address
    // before forwarding NODE_DATA.
    let frame = Frame::new(Header { source: 3, destination: 7, ..Header::new(7) }, b"hi".to_vec());
    let event = mari_proto::Event::NodeData(frame.clone()).encode(EventChannel::Cloud);
    edge_side.publish("/mari/0001/to_cloud", &event).expect("publish succeeds");

    let events = coordinator.poll();
    assert_eq!(events, vec![CloudEvent::NodeData { gateway_address: 7, frame }]);
}

#[test]
fn send_frame_publishes_a_node_data_command_to_the_edge() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    edge_side.subscribe("/mari/0001/to_edge").expect("subscribe succeeds");
    let cloud_broker = bus.connect();
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(SystemClock))
            .expect("subscribe succeeds");

    coordinator.send_frame(3, b"ping".to_vec()).expect("publish succeeds");

    let messages = edge_side.poll_received();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0][0], EventTag::NodeData as u8);
    let frame = Frame::from_bytes(&messages[0][1..]).expect("valid frame");
    assert_eq!(frame.header.destination, 3);
    assert_eq!(frame.payload, b"ping".as_slice());
}

struct FakeClock(std::sync::Arc<std::sync::Mutex<Instant>>);

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.0.lock().expect("fake clock mutex poisoned")
    }
}

#[test]
fn stale_gateway_is_evicted_on_update() {
    let bus = BrokerBus::new();
    let mut edge_side = bus.connect();
    let cloud_broker = bus.connect();

    let t0 = Instant::now();
    let now = std::sync::Arc::new(std::sync::Mutex::new(t0));
    let coordinator =
        CloudCoordinator::new(config(), Box::new(cloud_broker), None, Box::new(FakeClock(now.clone())))
            .expect("subscribe succeeds");

    edge_side.publish("/mari/0001/to_cloud", &gateway_info_event(7)).expect("publish succeeds");
    coordinator.poll();
    coordinator.update();
    assert_eq!(coordinator.with_gateways(|gateways| gateways.len()), 1);

    *now.lock().expect("fake clock mutex poisoned") = t0 + GATEWAY_TTL + Duration::from_secs(1);
    coordinator.update();
    assert_eq!(coordinator.with_gateways(|gateways| gateways.len()), 0);
}
