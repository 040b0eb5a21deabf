//! Control channel — the reserved topic that tells every subscriber to stop.

/// Reserved topic every device listens to for shutdown requests.
pub const CONTROL_TOPIC: &str = "quit";

/// Payloads accepted as a quit request (exact match).
pub const QUIT_PAYLOADS: [&str; 3] = ["quit", "q", "Q"];

/// Whether a message on `topic` with `payload` asks subscribers to quit.
#[must_use]
pub fn is_quit(topic: &str, payload: &str) -> bool {
    topic == CONTROL_TOPIC && QUIT_PAYLOADS.contains(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_quit_payloads_on_control_topic() {
        assert!(is_quit("quit", "quit"));
        assert!(is_quit("quit", "q"));
        assert!(is_quit("quit", "Q"));
    }

    #[test]
    fn should_ignore_other_payloads_on_control_topic() {
        assert!(!is_quit("quit", "QUIT"));
        assert!(!is_quit("quit", "quit "));
        assert!(!is_quit("quit", "Enter,23"));
    }

    #[test]
    fn should_ignore_quit_payload_on_other_topics() {
        assert!(!is_quit("carpark1/L306/sensor1/entry", "quit"));
    }
}
