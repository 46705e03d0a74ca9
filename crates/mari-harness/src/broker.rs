//! In-memory publish/subscribe bus standing in for the message broker
//! between edge and cloud coordinators.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use mari_core::{BrokerTransport, TransportError};

struct BusInner {
    /// Topic -> subscriber ids.
    subscriptions: HashMap<String, Vec<usize>>,
    /// Subscriber id -> queued messages.
    queues: HashMap<usize, VecDeque<Vec<u8>>>,
    next_id: usize,
}

/// A shared in-memory broker. Each [`BrokerBus::connect`] call hands out
/// an independent [`BrokerClient`] that publishes into and subscribes
/// from the same bus, so an edge and a cloud coordinator wired to the
/// same bus can exchange messages without a real broker.
#[derive(Clone)]
pub struct BrokerBus {
    inner: Arc<Mutex<BusInner>>,
}

impl BrokerBus {
    /// Builds an empty bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                subscriptions: HashMap::new(),
                queues: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Hands out a new client connected to this bus.
    #[must_use]
    pub fn connect(&self) -> BrokerClient {
        let mut bus = self.inner.lock().expect("broker mutex poisoned");
        let id = bus.next_id;
        bus.next_id += 1;
        bus.queues.insert(id, VecDeque::new());
        BrokerClient { id, bus: self.inner.clone() }
    }
}

impl Default for BrokerBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint connected to a [`BrokerBus`].
pub struct BrokerClient {
    id: usize,
    bus: Arc<Mutex<BusInner>>,
}

impl BrokerTransport for BrokerClient {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut bus = self.bus.lock().expect("broker mutex poisoned");
        let Some(subscribers) = bus.subscriptions.get(topic).cloned() else {
            return Ok(());
        };
        for subscriber in subscribers {
            if subscriber == self.id {
                continue;
            }
            if let Some(queue) = bus.queues.get_mut(&subscriber) {
                queue.push_back(payload.to_vec());
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let mut bus = self.bus.lock().expect("broker mutex poisoned");
        bus.subscriptions.entry(topic.to_string()).or_default().push(self.id);
        Ok(())
    }

    fn poll_received(&mut self) -> Vec<Vec<u8>> {
        let mut bus = self.bus.lock().expect("broker mutex poisoned");
        bus.queues.get_mut(&self.id).map(|queue| queue.drain(..).collect()).unwrap_or_default()
    }
}
