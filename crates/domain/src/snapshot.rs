//! Snapshot — the occupancy summary a car park publishes to its displays.
//!
//! Wire layout (six `;`-separated fields, in this order):
//!
//! | # | Field | Example |
//! |---|-------|---------|
//! | 1 | available bays | `4` |
//! | 2 | temperature | `23.5` |
//! | 3 | last event time | `2024-01-02 03:04:05` |
//! | 4 | total cars | `2` |
//! | 5 | parked cars | `1` |
//! | 6 | un-parked cars | `1` |

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::time::{self, Timestamp};

/// Field separator of the snapshot payload.
pub const SEPARATOR: char = ';';

const FIELDS: usize = 6;

/// Six-field occupancy summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub available_bays: usize,
    pub temperature: f64,
    pub last_event: Timestamp,
    pub total_cars: usize,
    pub parked_cars: usize,
    pub un_parked_cars: usize,
}

impl Snapshot {
    /// The same fields joined with commas, one record per line in a data file.
    #[must_use]
    pub fn to_record(&self) -> String {
        self.to_string().replace(SEPARATOR, ",")
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.available_bays,
            self.temperature,
            time::format(&self.last_event),
            self.total_cars,
            self.parked_cars,
            self.un_parked_cars
        )
    }
}

impl FromStr for Snapshot {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(SEPARATOR).collect();
        if fields.len() != FIELDS {
            return Err(ProtocolError::FieldCount {
                expected: FIELDS,
                actual: fields.len(),
            });
        }

        let temperature = match fields[1].trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                return Err(ProtocolError::InvalidNumber {
                    field: "temperature",
                    value: fields[1].to_string(),
                });
            }
        };
        let last_event = time::parse(fields[2]).map_err(|_| ProtocolError::InvalidTimestamp {
            field: "last_event",
            value: fields[2].to_string(),
        })?;

        Ok(Self {
            available_bays: parse_count("available_bays", fields[0])?,
            temperature,
            last_event,
            total_cars: parse_count("total_cars", fields[3])?,
            parked_cars: parse_count("parked_cars", fields[4])?,
            un_parked_cars: parse_count("un_parked_cars", fields[5])?,
        })
    }
}

fn parse_count(field: &'static str, raw: &str) -> Result<usize, ProtocolError> {
    raw.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            available_bays: 4,
            temperature: 23.5,
            last_event: time::parse("2024-01-02 03:04:05").unwrap(),
            total_cars: 2,
            parked_cars: 1,
            un_parked_cars: 1,
        }
    }

    #[test]
    fn should_format_six_semicolon_separated_fields() {
        assert_eq!(sample().to_string(), "4;23.5;2024-01-02 03:04:05;2;1;1");
    }

    #[test]
    fn should_format_whole_temperature_without_fraction() {
        let snapshot = Snapshot {
            temperature: 23.0,
            ..sample()
        };
        assert_eq!(snapshot.to_string(), "4;23;2024-01-02 03:04:05;2;1;1");
    }

    #[test]
    fn should_parse_published_payload() {
        let parsed: Snapshot = "4;23.5;2024-01-02 03:04:05;2;1;1".parse().unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn should_reject_legacy_three_field_payload() {
        let result = "4;23.5;2024-01-02 03:04:05".parse::<Snapshot>();
        assert!(matches!(
            result,
            Err(ProtocolError::FieldCount {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn should_reject_negative_count() {
        let result = "-1;23.5;2024-01-02 03:04:05;2;1;1".parse::<Snapshot>();
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidNumber {
                field: "available_bays",
                ..
            })
        ));
    }

    #[test]
    fn should_reject_bad_timestamp() {
        let result = "4;23.5;yesterday;2;1;1".parse::<Snapshot>();
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn should_render_comma_separated_record() {
        assert_eq!(sample().to_record(), "4,23.5,2024-01-02 03:04:05,2,1,1");
    }
}
