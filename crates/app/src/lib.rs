//! # smartpark-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Transport` — subscribe, unsubscribe and publish on a pub/sub broker
//!   - `DisplayRenderer` — show an occupancy snapshot somewhere
//!   - `Detector` — a paced sequence of sensor detections
//! - Define **driving/inbound ports** as use-case structs:
//!   - `CarParkService` — owns one car park and answers its sensors
//!   - `SensorService` — turns detections into signal messages
//!   - `DisplayService` — turns snapshot messages into renders
//! - Provide **in-process infrastructure** (a topic broker) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `smartpark-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod broker;
pub mod ports;
pub mod services;
