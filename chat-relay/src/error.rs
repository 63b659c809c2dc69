//! Error types for chat-relay.

/// Main error type for chat-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A user with this email already exists.
    #[error("email already registered: {email}")]
    EmailTaken {
        /// The conflicting email.
        email: String,
    },

    /// Password hashing or hash parsing failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

/// Credential verification errors.
///
/// The variants exist for logging only. Every one of them is reported to a
/// connecting client the same way: a policy-violation close.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token is malformed, badly signed or expired.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token carries no usable subject.
    #[error("token has no subject")]
    MissingSubject,

    /// Subject does not name a registered user.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// User lookup failed.
    #[error("user directory unavailable: {0}")]
    Directory(#[from] StorageError),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Reasons an upgrade request is refused.
///
/// All of them end the same way for the client: a policy-violation close.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The room segment of the path is not a room id.
    #[error("bad room id: {0}")]
    RoomId(#[from] chat_types::ChatError),

    /// The request path or query string could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// No `token` query parameter was supplied.
    #[error("missing token")]
    MissingToken,

    /// The credential did not verify.
    #[error("credential rejected: {0}")]
    Credential(#[from] AuthError),
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for authentication operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;
