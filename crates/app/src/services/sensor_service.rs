//! Sensor service — publishes detections as `"<Signal>,<Temperature>"`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use smartpark_domain::control;
use smartpark_domain::error::SmartParkError;
use smartpark_domain::signal::{Signal, SignalMessage};

use crate::ports::{Detector, InboundMessage, Transport};

/// Clears a sensor's `running` flag from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Stop the sensor once a quit request arrives on `inbound`.
    pub async fn stop_on_quit(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = inbound.recv().await {
            let quit = msg
                .payload_str()
                .is_ok_and(|payload| control::is_quit(&msg.topic, payload));
            if quit {
                tracing::info!("sensor quit requested");
                break;
            }
        }
        self.stop();
    }
}

/// Publishes entry detections on the entry topic and exit detections on
/// the exit topic. A sensor may own only one of the two.
pub struct SensorService<T> {
    name: String,
    transport: T,
    entry_topic: Option<String>,
    exit_topic: Option<String>,
    running: Arc<AtomicBool>,
}

impl<T: Transport> SensorService<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
            entry_topic: None,
            exit_topic: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn with_entry_topic(mut self, topic: impl Into<String>) -> Self {
        self.entry_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_exit_topic(mut self, topic: impl Into<String>) -> Self {
        self.exit_topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to the shared quit topic.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the subscription fails.
    pub async fn subscribe_control(&self) -> Result<(), SmartParkError> {
        self.transport.subscribe(control::CONTROL_TOPIC).await
    }

    /// Publish one detection on the topic matching its signal.
    ///
    /// Returns `false` when this sensor has no topic for the signal.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the publish fails.
    pub async fn on_detection(&self, detection: &SignalMessage) -> Result<bool, SmartParkError> {
        let topic = match detection.signal {
            Signal::Enter => self.entry_topic.as_deref(),
            Signal::Exit => self.exit_topic.as_deref(),
            Signal::Unrecognised(_) => None,
        };
        let Some(topic) = topic else {
            tracing::debug!(sensor = %self.name, signal = %detection.signal, "no topic for signal");
            return Ok(false);
        };

        self.transport
            .publish(topic, &detection.to_string())
            .await?;
        tracing::debug!(sensor = %self.name, topic, payload = %detection, "detection published");
        Ok(true)
    }

    /// Publish detections until the detector runs dry or the sensor is
    /// stopped, then disconnect the transport.
    ///
    /// Returns how many detections were published.
    pub async fn run<D: Detector>(&self, detector: &mut D) -> usize {
        tracing::info!(sensor = %self.name, "sensor running");
        let mut published = 0;

        while self.is_running() {
            let Some(detection) = detector.next_detection().await else {
                tracing::info!(sensor = %self.name, "detector exhausted");
                break;
            };
            if !self.is_running() {
                break;
            }
            match self.on_detection(&detection).await {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(sensor = %self.name, error = %err, "detection publish failed"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        if let Err(err) = self.transport.disconnect().await {
            tracing::warn!(%err, sensor = %self.name, "transport disconnect failed");
        }
        tracing::info!(sensor = %self.name, published, "sensor stopped");
        published
    }
}
