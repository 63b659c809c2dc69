//! Error types for roomchat.

use thiserror::Error;

/// Errors shared by the relay and its clients.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Room identifier is not a decimal integer
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// Identity label is empty
    #[error("identity must not be empty")]
    EmptyIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChatError::InvalidRoomId("abc".to_string());
        assert_eq!(err.to_string(), "invalid room id: \"abc\"");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatError>();
    }
}
