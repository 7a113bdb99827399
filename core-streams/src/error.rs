use bridge_traits::ChannelError;
use serde_json::json;
use thiserror::Error;

/// Error code sent to a caller whose subscribe collided with a live identifier.
pub const DUPLICATE_ID_CODE: &str = "DUPLICATE_ID";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stream identifier '{identifier}' is already listening (event '{event_name}')")]
    DuplicateIdentifier {
        event_name: String,
        identifier: String,
    },
}

impl From<RegistryError> for ChannelError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::DuplicateIdentifier {
                event_name,
                identifier,
            } => ChannelError::new(DUPLICATE_ID_CODE, message)
                .with_details(json!({ "name": event_name, "id": identifier })),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_identifier_to_channel_error() {
        let err = RegistryError::DuplicateIdentifier {
            event_name: "accelerometer".to_string(),
            identifier: "a-1".to_string(),
        };

        let channel: ChannelError = err.into();
        assert_eq!(channel.code, DUPLICATE_ID_CODE);
        assert!(channel.message.contains("a-1"));
        assert_eq!(
            channel.details,
            Some(json!({ "name": "accelerometer", "id": "a-1" }))
        );
    }
}
