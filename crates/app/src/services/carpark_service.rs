//! Car park service — the single owner and mutator of one [`CarPark`].
//!
//! Sensor messages are handled one at a time, to completion: store the
//! temperature, run the parking policy, publish a snapshot to the displays.

use tokio::sync::mpsc;

use smartpark_domain::carpark::CarPark;
use smartpark_domain::control::{self, CONTROL_TOPIC};
use smartpark_domain::error::SmartParkError;
use smartpark_domain::policy::ParkingPolicy;
use smartpark_domain::signal::{Signal, SignalMessage};
use smartpark_domain::time;

use crate::ports::{InboundMessage, Transport};
use crate::services::MessageOutcome;

/// Drives a [`CarPark`] from sensor signals arriving over a [`Transport`].
pub struct CarParkService<T> {
    name: String,
    park: CarPark,
    policy: ParkingPolicy,
    transport: T,
    display_topic: String,
    running: bool,
}

impl<T: Transport> CarParkService<T> {
    /// Create a service for the car park called `name`, publishing its
    /// snapshots on `display_topic`.
    pub fn new(
        name: impl Into<String>,
        park: CarPark,
        policy: ParkingPolicy,
        transport: T,
        display_topic: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            park,
            policy,
            transport,
            display_topic: display_topic.into(),
            running: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn park(&self) -> &CarPark {
        &self.park
    }

    #[must_use]
    pub fn display_topic(&self) -> &str {
        &self.display_topic
    }

    /// Whether [`run`](Self::run) is currently consuming messages.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start listening to a sensor topic. Registering a topic twice is a
    /// no-op and does not subscribe again.
    ///
    /// Returns whether the topic was newly registered.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the subscription fails; the topic is
    /// then left unregistered.
    pub async fn register_sensor_topic(&mut self, topic: &str) -> Result<bool, SmartParkError> {
        if !self.park.register_sensor_topic(topic) {
            return Ok(false);
        }
        if let Err(err) = self.transport.subscribe(topic).await {
            self.park.unregister_sensor_topic(topic);
            return Err(err);
        }
        tracing::info!(car_park = %self.name, topic, "sensor topic registered");
        Ok(true)
    }

    /// Stop listening to a sensor topic. Unknown topics are a no-op.
    ///
    /// Returns whether the topic was registered.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the unsubscription fails.
    pub async fn unregister_sensor_topic(&mut self, topic: &str) -> Result<bool, SmartParkError> {
        if !self.park.unregister_sensor_topic(topic) {
            return Ok(false);
        }
        self.transport.unsubscribe(topic).await?;
        tracing::info!(car_park = %self.name, topic, "sensor topic unregistered");
        Ok(true)
    }

    /// Subscribe to the shared quit topic.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the subscription fails.
    pub async fn subscribe_control(&self) -> Result<(), SmartParkError> {
        self.transport.subscribe(CONTROL_TOPIC).await
    }

    /// Handle one inbound message end to end.
    #[tracing::instrument(skip(self, msg), fields(car_park = %self.name, topic = %msg.topic))]
    pub async fn handle_message(&mut self, msg: &InboundMessage) -> MessageOutcome {
        let payload = match msg.payload_str() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable payload");
                return MessageOutcome::Dropped;
            }
        };

        if msg.topic == CONTROL_TOPIC {
            return if control::is_quit(&msg.topic, payload) {
                MessageOutcome::Quit
            } else {
                tracing::debug!(payload, "ignoring control payload");
                MessageOutcome::Ignored
            };
        }

        if !self.park.is_sensor_topic(&msg.topic) {
            tracing::debug!("ignoring message on unregistered topic");
            return MessageOutcome::Ignored;
        }

        match payload.parse::<SignalMessage>() {
            Ok(signal) => self.handle_signal(signal).await,
            Err(err) => {
                tracing::warn!(payload, error = %err, "dropping malformed signal");
                MessageOutcome::Dropped
            }
        }
    }

    /// Apply a decoded signal: store its temperature, dispatch entry or
    /// exit, then publish a snapshot.
    ///
    /// An unrecognised signal word still updates the temperature but is
    /// not dispatched and publishes nothing.
    pub async fn handle_signal(&mut self, msg: SignalMessage) -> MessageOutcome {
        self.park.set_temperature(msg.temperature);

        let dispatched = match &msg.signal {
            Signal::Enter => self.policy.on_entry_signal(&mut self.park).map(Some),
            Signal::Exit => self.policy.on_exit_signal(&mut self.park),
            Signal::Unrecognised(word) => {
                tracing::debug!(signal = %word, "ignoring unrecognised signal");
                return MessageOutcome::Ignored;
            }
        };

        match dispatched {
            Ok(Some(car)) => tracing::debug!(signal = %msg.signal, car = %car, "car moved"),
            Ok(None) => tracing::debug!("exit signalled on an empty car park"),
            Err(err) => {
                tracing::warn!(signal = %msg.signal, error = %err, "signal rejected");
                return MessageOutcome::Dropped;
            }
        }

        tracing::info!(
            car_park = %self.name,
            signal = %msg.signal,
            available_bays = self.park.available_bays(),
            total_cars = self.park.total_cars(),
            parked_cars = self.park.parked_cars(),
            un_parked_cars = self.park.un_parked_cars(),
            temperature = msg.temperature,
            last_event = ?self.park.last_event().as_ref().map(time::format),
            "car park state"
        );

        if let Err(err) = self.publish_snapshot().await {
            tracing::warn!(topic = %self.display_topic, error = %err, "snapshot publish failed");
        }
        MessageOutcome::Processed
    }

    /// Publish the current occupancy snapshot on the display topic.
    ///
    /// # Errors
    ///
    /// Returns a state error when no temperature or event is recorded yet,
    /// or a transport error when the publish fails.
    pub async fn publish_snapshot(&self) -> Result<(), SmartParkError> {
        let snapshot = self.park.snapshot()?;
        self.transport
            .publish(&self.display_topic, &snapshot.to_string())
            .await
    }

    /// Consume inbound messages until a quit request arrives or the
    /// channel closes, then disconnect the transport.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<InboundMessage>) {
        self.running = true;
        tracing::info!(car_park = %self.name, bays = self.park.total_bays(), "car park running");

        while let Some(msg) = inbound.recv().await {
            if self.handle_message(&msg).await == MessageOutcome::Quit {
                tracing::info!(car_park = %self.name, "quit requested");
                break;
            }
        }

        self.running = false;
        if let Err(err) = self.transport.disconnect().await {
            tracing::warn!(%err, car_park = %self.name, "transport disconnect failed");
        }
        tracing::info!(car_park = %self.name, "car park stopped");
    }
}
