//! # smartpark-adapter-mqtt
//!
//! MQTT adapter — implements the [`Transport`](smartpark_app::ports::Transport)
//! port on top of an MQTT broker.
//!
//! ## How it works
//!
//! [`MqttTransport::connect`] creates a `rumqttc` client and spawns a task
//! that drives its event loop. Every incoming `PUBLISH` is forwarded as an
//! [`InboundMessage`](smartpark_app::ports::InboundMessage) on the returned
//! channel. Subscriptions and publishes use QoS 0 (at most once).
//!
//! Connection failures are logged and the event loop is polled again after
//! a short pause, so a broker restart does not end the process. Individual
//! publishes are never retried.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `smartpark-app` and `smartpark-domain`.

mod config;
mod error;
mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::MqttTransport;
