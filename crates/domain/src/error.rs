//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SmartParkError`] via `#[from]` (domain) or an explicit `into_domain`
//! (adapters).

/// Base error for everything that crosses a port boundary.
#[derive(Debug, thiserror::Error)]
pub enum SmartParkError {
    /// A car or car-park precondition was violated.
    #[error("car park state error")]
    State(#[from] StateError),

    /// A payload or record could not be decoded.
    #[error("protocol error")]
    Protocol(#[from] ProtocolError),

    /// The pub/sub transport failed (publish, subscribe, connect).
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A display sink (console, recorder file) failed to write.
    #[error("display sink error")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Violations of the car lifecycle or the car-park bay invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// An entry or exit was processed before any temperature was received.
    #[error("temperature must be set before an entry or exit is processed")]
    TemperatureNotSet,

    /// No entry or exit has been recorded yet, so there is no event time.
    #[error("no entry or exit has been recorded yet")]
    NoEventRecorded,

    /// An entry or exit temperature was NaN or infinite.
    #[error("car {plate} got a non-finite temperature")]
    NonFiniteTemperature { plate: String },

    /// The car already carries entry fields.
    #[error("car {plate} has already entered")]
    AlreadyEntered { plate: String },

    /// The car has no entry fields, so it cannot exit.
    #[error("car {plate} has not entered")]
    NotEntered { plate: String },

    /// The car already carries exit fields.
    #[error("car {plate} has already exited")]
    AlreadyExited { plate: String },

    /// Every bay is taken by a parked car.
    #[error("no bay available")]
    NoBayAvailable,

    /// A car with the same plate is already present.
    #[error("car {plate} is already present")]
    DuplicatePlate { plate: String },

    /// No car with this plate is present.
    #[error("car {plate} is not present")]
    UnknownCar { plate: String },
}

/// Reasons a wire payload or car record could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// Wrong number of delimited fields.
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    /// A numeric field did not parse (or was not finite).
    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// A timestamp field did not match `YYYY-MM-DD HH:MM:SS`.
    #[error("field `{field}` is not a timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// A text field contains the record delimiter.
    #[error("field `{field}` contains the delimiter: {value:?}")]
    Delimiter { field: &'static str, value: String },

    /// A boolean field was neither `true` nor `false`.
    #[error("field `{field}` is not a boolean: {value:?}")]
    InvalidFlag { field: &'static str, value: String },

    /// The keyed (JSON) car record is malformed.
    #[error("malformed car record")]
    Json(#[from] serde_json::Error),
}
