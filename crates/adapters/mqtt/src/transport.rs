//! rumqttc-backed [`Transport`] with a background event-loop task.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use smartpark_app::ports::{InboundMessage, Transport};
use smartpark_domain::error::SmartParkError;

use crate::config::MqttConfig;
use crate::error::MqttError;

type Topics = Arc<Mutex<BTreeSet<String>>>;

/// One MQTT session.
///
/// Cloning shares the session; dropping every clone does not disconnect,
/// call [`Transport::disconnect`] for a clean goodbye.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    client_id: String,
    topics: Topics,
}

impl MqttTransport {
    /// Open a session and spawn the task driving it.
    ///
    /// Returns the transport, the channel inbound messages arrive on, and
    /// the event-loop task handle. The task ends after
    /// [`Transport::disconnect`] or once the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::EmptyClientId`] when the configured client id is blank.
    pub fn connect(
        config: &MqttConfig,
    ) -> Result<(Self, mpsc::Receiver<InboundMessage>, JoinHandle<()>), MqttError> {
        if config.client_id.trim().is_empty() {
            return Err(MqttError::EmptyClientId);
        }

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs.max(1))));

        let capacity = config.channel_capacity.max(1);
        let (client, event_loop) = AsyncClient::new(options, capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let topics = Topics::default();

        let driver = EventLoopDriver {
            event_loop,
            client: client.clone(),
            client_id: config.client_id.clone(),
            inbound: inbound_tx,
            topics: Arc::clone(&topics),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        };
        let handle = tokio::spawn(driver.run());

        tracing::info!(
            client_id = %config.client_id,
            host = %config.host,
            port = config.port,
            "MQTT session started"
        );

        let transport = Self {
            client,
            client_id: config.client_id.clone(),
            topics,
        };
        Ok((transport, inbound_rx, handle))
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Topics currently subscribed through this session.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.topics).iter().cloned().collect()
    }
}

impl Transport for MqttTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), SmartParkError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(MqttError::from)?;
        lock(&self.topics).insert(topic.to_string());
        tracing::debug!(client_id = %self.client_id, topic, "subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), SmartParkError> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(MqttError::from)?;
        lock(&self.topics).remove(topic);
        tracing::debug!(client_id = %self.client_id, topic, "unsubscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SmartParkError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(MqttError::from)?;
        tracing::trace!(client_id = %self.client_id, topic, payload, "published");
        Ok(())
    }

    /// The event-loop task stops once the disconnect request goes out.
    async fn disconnect(&self) -> Result<(), SmartParkError> {
        self.client.disconnect().await.map_err(MqttError::from)?;
        tracing::info!(client_id = %self.client_id, "MQTT disconnect requested");
        Ok(())
    }
}

fn lock(topics: &Topics) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
    topics.lock().unwrap_or_else(PoisonError::into_inner)
}

struct EventLoopDriver {
    event_loop: EventLoop,
    client: AsyncClient,
    client_id: String,
    inbound: mpsc::Sender<InboundMessage>,
    topics: Topics,
    reconnect_delay: Duration,
}

impl EventLoopDriver {
    /// Poll until disconnected, forwarding every incoming publish.
    async fn run(mut self) {
        let mut connections = 0_usize;
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let msg = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    if self.inbound.send(msg).await.is_err() {
                        tracing::debug!(client_id = %self.client_id, "inbound receiver dropped");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    connections += 1;
                    tracing::info!(client_id = %self.client_id, connections, "MQTT connected");
                    if connections > 1 && !ack.session_present {
                        self.resubscribe();
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    tracing::info!(client_id = %self.client_id, "MQTT session closed");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, client_id = %self.client_id, "MQTT connection error, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    /// Restore subscriptions lost with a fresh session after a reconnect.
    fn resubscribe(&self) {
        for topic in lock(&self.topics).iter() {
            if let Err(err) = self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                tracing::warn!(%err, topic = %topic, "failed to restore subscription");
            }
        }
    }
}
