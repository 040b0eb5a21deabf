//! Signal — the `"<Signal>,<Temperature>"` payload a sensor sends to a car park.
//!
//! The signal word is matched exactly and case-sensitively. A payload with
//! an unknown word still decodes (its temperature is valid), but carries
//! [`Signal::Unrecognised`] so the car park can skip dispatch.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Field separator of the signal payload.
pub const SEPARATOR: char = ',';

/// What a sensor detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Exit,
    /// Any other word; carried through so it can be logged.
    Unrecognised(String),
}

impl From<&str> for Signal {
    fn from(word: &str) -> Self {
        match word {
            "Enter" => Self::Enter,
            "Exit" => Self::Exit,
            other => Self::Unrecognised(other.to_string()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("Enter"),
            Self::Exit => f.write_str("Exit"),
            Self::Unrecognised(word) => f.write_str(word),
        }
    }
}

/// A decoded sensor payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub signal: Signal,
    pub temperature: f64,
}

impl SignalMessage {
    #[must_use]
    pub fn new(signal: Signal, temperature: f64) -> Self {
        Self {
            signal,
            temperature,
        }
    }

    #[must_use]
    pub fn enter(temperature: f64) -> Self {
        Self::new(Signal::Enter, temperature)
    }

    #[must_use]
    pub fn exit(temperature: f64) -> Self {
        Self::new(Signal::Exit, temperature)
    }
}

impl fmt::Display for SignalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.signal, self.temperature)
    }
}

impl FromStr for SignalMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(SEPARATOR).collect();
        let [word, raw_temperature] = fields.as_slice() else {
            return Err(ProtocolError::FieldCount {
                expected: 2,
                actual: fields.len(),
            });
        };

        let temperature = match raw_temperature.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                return Err(ProtocolError::InvalidNumber {
                    field: "temperature",
                    value: (*raw_temperature).to_string(),
                });
            }
        };

        Ok(Self::new(Signal::from(*word), temperature))
    }
}
