//! Transport port — the pub/sub capability every device role is built on.
//!
//! A connected transport hands out inbound messages on a
//! [`tokio::sync::mpsc`] receiver; the trait itself only covers the
//! outbound calls. Adapters decide how topics are matched and delivered.

use std::future::Future;

use smartpark_domain::error::{ProtocolError, SmartParkError};

/// One message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] when the payload is not valid UTF-8.
    pub fn payload_str(&self) -> Result<&str, ProtocolError> {
        Ok(std::str::from_utf8(&self.payload)?)
    }
}

/// Subscribe, unsubscribe and publish on a topic-addressed broker.
pub trait Transport: Send + Sync {
    /// Start receiving messages published on `topic`.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), SmartParkError>> + Send;

    /// Stop receiving messages published on `topic`.
    fn unsubscribe(&self, topic: &str)
    -> impl Future<Output = Result<(), SmartParkError>> + Send;

    /// Publish a text payload on `topic`. Delivery is at-most-once.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), SmartParkError>> + Send;

    /// End the session. Inbound delivery stops once this resolves.
    fn disconnect(&self) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        async { Ok(()) }
    }
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        (**self).subscribe(topic)
    }

    fn unsubscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        (**self).unsubscribe(topic)
    }

    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        (**self).publish(topic, payload)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), SmartParkError>> + Send {
        (**self).disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_utf8_payload() {
        let msg = InboundMessage::new("quit", "q");
        assert_eq!(msg.payload_str().unwrap(), "q");
    }

    #[test]
    fn should_reject_payload_when_not_utf8() {
        let msg = InboundMessage::new("t", vec![0xff, 0xfe]);
        assert!(matches!(msg.payload_str(), Err(ProtocolError::Encoding(_))));
    }
}
