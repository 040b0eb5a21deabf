//! MQTT adapter error types.

use smartpark_domain::error::SmartParkError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The configuration has an empty client identifier.
    #[error("MQTT client id must not be empty")]
    EmptyClientId,

    /// The rumqttc client returned an error (request queue closed).
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`SmartParkError::Transport`] for propagation across
    /// port boundaries.
    pub fn into_domain(self) -> SmartParkError {
        SmartParkError::Transport(Box::new(self))
    }
}

impl From<MqttError> for SmartParkError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Client(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_empty_client_id_error() {
        let err = MqttError::EmptyClientId;
        assert_eq!(err.to_string(), "MQTT client id must not be empty");
    }

    #[test]
    fn should_convert_into_transport_error() {
        let err: SmartParkError = MqttError::EmptyClientId.into();
        assert!(matches!(err, SmartParkError::Transport(_)));
    }
}
