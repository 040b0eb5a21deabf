//! Topic naming — `<root>/<location>/<name>/<qualifier>`.
//!
//! Segments are joined verbatim. Nothing is escaped or validated: a segment
//! containing the separator produces a topic with extra levels, which is
//! the caller's problem.

use std::fmt;

/// Level separator of a topic.
pub const SEPARATOR: char = '/';

/// Qualifier of an entry sensor's publish topic.
pub const ENTRY: &str = "entry";
/// Qualifier of an exit sensor's publish topic.
pub const EXIT: &str = "exit";
/// Qualifier of a car park's display topic.
pub const DISPLAY: &str = "display";
/// Default qualifier for devices without a specific purpose.
pub const NA: &str = "na";

/// Build a topic from its four segments.
#[must_use]
pub fn topic(root: &str, location: &str, name: &str, qualifier: &str) -> String {
    format!("{root}{SEPARATOR}{location}{SEPARATOR}{name}{SEPARATOR}{qualifier}")
}

/// The four segments addressing one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAddress {
    pub root: String,
    pub location: String,
    pub name: String,
    pub qualifier: String,
}

impl TopicAddress {
    #[must_use]
    pub fn new(
        root: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            location: location.into(),
            name: name.into(),
            qualifier: qualifier.into(),
        }
    }

    /// The device's default topic.
    #[must_use]
    pub fn topic(&self) -> String {
        topic(&self.root, &self.location, &self.name, &self.qualifier)
    }

    /// Same device, different qualifier (e.g. a car park's `display` topic).
    #[must_use]
    pub fn with_qualifier(&self, qualifier: &str) -> String {
        topic(&self.root, &self.location, &self.name, qualifier)
    }

    /// Another device under the same root.
    #[must_use]
    pub fn sibling(&self, location: &str, name: &str, qualifier: &str) -> String {
        topic(&self.root, location, name, qualifier)
    }
}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_join_segments_with_slash() {
        assert_eq!(
            topic("carpark1", "L306", "sensor1", ENTRY),
            "carpark1/L306/sensor1/entry"
        );
    }

    #[test]
    fn should_keep_spaces_verbatim() {
        assert_eq!(
            topic("carpark1", "Moondaloop Park", "carpark1", DISPLAY),
            "carpark1/Moondaloop Park/carpark1/display"
        );
    }

    #[test]
    fn should_not_escape_separator_inside_segment() {
        assert_eq!(topic("a", "b/c", "d", "e"), "a/b/c/d/e");
    }

    #[test]
    fn should_build_default_and_qualified_topics() {
        let address = TopicAddress::new("carpark2", "Jandurah Park", "carpark2", NA);
        assert_eq!(address.topic(), "carpark2/Jandurah Park/carpark2/na");
        assert_eq!(
            address.with_qualifier(DISPLAY),
            "carpark2/Jandurah Park/carpark2/display"
        );
        assert_eq!(
            address.sibling("L250", "sensor2", EXIT),
            "carpark2/L250/sensor2/exit"
        );
        assert_eq!(address.to_string(), address.topic());
    }
}
