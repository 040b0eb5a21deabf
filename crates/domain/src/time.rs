//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// UTC timestamp used for entry/exit times and the car park's last event.
pub type Timestamp = DateTime<Utc>;

/// Text layout shared by the snapshot payload and the car record formats.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Return the current UTC time, truncated to whole seconds.
///
/// Every timestamp the domain records goes through here so that it survives
/// a round trip through [`TIMESTAMP_FORMAT`] unchanged.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp (interpreted as UTC).
///
/// # Errors
///
/// Returns the underlying [`chrono::ParseError`] when `raw` does not match
/// [`TIMESTAMP_FORMAT`].
pub fn parse(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Serde helpers for `Option<Timestamp>` fields: the text layout when set,
/// an explicit `null` otherwise.
pub mod optional_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}
