//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod carpark_service;
pub mod display_service;
pub mod sensor_service;

/// What a service did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The message changed state and any follow-up was published.
    Processed,
    /// Well-formed but not actionable (unknown signal word, foreign topic).
    Ignored,
    /// Malformed payload; logged and discarded.
    Dropped,
    /// A quit request on the control topic.
    Quit,
}
