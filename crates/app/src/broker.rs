//! In-process topic broker backed by per-client tokio [`mpsc`] channels.
//!
//! Lets the car park, its sensors and its displays run in one process (and
//! in tests) without a network broker. Topics match exactly; there are no
//! wildcards.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use smartpark_domain::error::SmartParkError;

use crate::ports::{InboundMessage, Transport};

struct ClientSlot {
    id: usize,
    topics: HashSet<String>,
    sender: mpsc::Sender<InboundMessage>,
}

#[derive(Default)]
struct BrokerState {
    next_id: usize,
    clients: Vec<ClientSlot>,
}

/// Same-process broker. Cheap to clone; clones share the subscriber table.
///
/// Publishing succeeds even when nobody is subscribed (the message is
/// simply dropped), and never blocks: a subscriber whose channel is full
/// misses the message.
#[derive(Clone, Default)]
pub struct InProcessBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InProcessBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new client. Its inbound messages arrive on the returned
    /// receiver, which buffers up to `capacity` messages.
    #[must_use]
    pub fn connect(&self, capacity: usize) -> (BrokerClient, mpsc::Receiver<InboundMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.clients.push(ClientSlot {
            id,
            topics: HashSet::new(),
            sender,
        });
        let client = BrokerClient {
            id,
            broker: self.clone(),
        };
        (client, receiver)
    }

    /// Deliver `payload` to every client subscribed to `topic`.
    ///
    /// Returns how many clients accepted the message.
    pub fn publish(&self, topic: &str, payload: &str) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.clients.retain(|client| !client.sender.is_closed());

        let mut delivered = 0;
        for client in state.clients.iter().filter(|c| c.topics.contains(topic)) {
            match client.sender.try_send(InboundMessage::new(topic, payload)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client = client.id, topic, "subscriber channel full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Number of connected clients subscribed to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .clients
            .iter()
            .filter(|c| !c.sender.is_closed() && c.topics.contains(topic))
            .count()
    }

    fn update_topics(&self, id: usize, update: impl FnOnce(&mut HashSet<String>)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = state.clients.iter_mut().find(|c| c.id == id) {
            update(&mut slot.topics);
        }
    }

    fn detach(&self, id: usize) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.clients.retain(|c| c.id != id);
    }
}

/// One client session on an [`InProcessBroker`].
pub struct BrokerClient {
    id: usize,
    broker: InProcessBroker,
}

impl Transport for BrokerClient {
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        self.broker.update_topics(self.id, |topics| {
            topics.insert(topic.to_string());
        });
        async { Ok(()) }
    }

    fn unsubscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        self.broker.update_topics(self.id, |topics| {
            topics.remove(topic);
        });
        async { Ok(()) }
    }

    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        let delivered = self.broker.publish(topic, payload);
        tracing::trace!(topic, delivered, "published in process");
        async { Ok(()) }
    }

    /// Drop every subscription and close this client's inbound channel.
    fn disconnect(&self) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        self.broker.detach(self.id);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_deliver_message_to_subscriber() {
        let broker = InProcessBroker::new();
        let (client, mut rx) = broker.connect(8);
        client.subscribe("a/b/c/d").await.unwrap();

        client.publish("a/b/c/d", "Enter,23").await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, InboundMessage::new("a/b/c/d", "Enter,23"));
    }

    #[tokio::test]
    async fn should_deliver_to_every_subscriber() {
        let broker = InProcessBroker::new();
        let (first, mut rx1) = broker.connect(8);
        let (second, mut rx2) = broker.connect(8);
        first.subscribe("quit").await.unwrap();
        second.subscribe("quit").await.unwrap();

        assert_eq!(broker.publish("quit", "q"), 2);

        assert_eq!(rx1.recv().await.unwrap().payload, b"q");
        assert_eq!(rx2.recv().await.unwrap().payload, b"q");
    }

    #[tokio::test]
    async fn should_not_deliver_when_topic_differs() {
        let broker = InProcessBroker::new();
        let (client, mut rx) = broker.connect(8);
        client.subscribe("root/loc/name/entry").await.unwrap();

        assert_eq!(broker.publish("root/loc/name/exit", "Exit,20"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_stop_delivery_when_unsubscribed() {
        let broker = InProcessBroker::new();
        let (client, mut rx) = broker.connect(8);
        client.subscribe("t").await.unwrap();
        client.unsubscribe("t").await.unwrap();

        assert_eq!(broker.publish("t", "x"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let broker = InProcessBroker::new();
        let (client, _rx) = broker.connect(8);
        assert!(client.publish("nobody/listens", "x").await.is_ok());
    }

    #[tokio::test]
    async fn should_drop_message_when_subscriber_channel_full() {
        let broker = InProcessBroker::new();
        let (client, mut rx) = broker.connect(1);
        client.subscribe("t").await.unwrap();

        assert_eq!(broker.publish("t", "first"), 1);
        assert_eq!(broker.publish("t", "second"), 0);

        assert_eq!(rx.recv().await.unwrap().payload, b"first");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_close_channel_when_client_disconnects() {
        let broker = InProcessBroker::new();
        let (client, mut rx) = broker.connect(8);
        client.subscribe("t").await.unwrap();

        client.disconnect().await.unwrap();

        assert_eq!(broker.subscriber_count("t"), 0);
        assert!(rx.recv().await.is_none());
    }
}
