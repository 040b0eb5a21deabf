//! MQTT connection configuration.

use serde::Deserialize;

/// Configuration for one MQTT session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub host: String,
    /// MQTT broker port.
    pub port: u16,
    /// MQTT client identifier. Must be unique per connected device.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the request queue and of the inbound message channel.
    pub channel_capacity: usize,
    /// Pause before polling the event loop again after a connection error,
    /// in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl MqttConfig {
    /// Same broker settings, different client identifier.
    #[must_use]
    pub fn with_client_id(&self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..self.clone()
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "smartpark".to_string(),
            keep_alive_secs: 30,
            channel_capacity: 64,
            reconnect_delay_ms: 1000,
        }
    }
}
