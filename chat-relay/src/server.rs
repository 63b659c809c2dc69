//! Main ChatRelay server coordination.
//!
//! ChatRelay owns the connection registry and the collaborators every
//! request handler needs: credential verifier, directories, token issuer.

use crate::auth::{CredentialVerifier, JwtVerifier, SigningKey, TokenIssuer};
use crate::config::{Config, ConfigError};
use crate::directory::{RoomDirectory, SqliteDirectory, UserDirectory};
use crate::registry::ConnectionRegistry;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total upgrade requests received on the relay endpoint.
    pub connections_total: AtomicU64,
    /// Total admissions refused (bad credential or bad parameters).
    pub admissions_rejected: AtomicU64,
    /// Total sessions that ran to completion.
    pub sessions_closed: AtomicU64,
    /// Total inbound chat messages relayed.
    pub messages_relayed: AtomicU64,
    /// Total lines queued to recipients (chat, join and leave notices).
    pub deliveries_total: AtomicU64,
    /// Total lines dropped because the recipient was already gone.
    pub deliveries_dropped: AtomicU64,
}

/// Main relay server state, shared by every handler.
pub struct ChatRelay {
    config: Config,
    registry: Arc<ConnectionRegistry>,
    verifier: Arc<dyn CredentialVerifier>,
    users: Arc<dyn UserDirectory>,
    rooms: Arc<dyn RoomDirectory>,
    issuer: TokenIssuer,
    metrics: Arc<RelayMetrics>,
}

impl std::fmt::Debug for ChatRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRelay")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("rooms_active", &self.registry.room_count())
            .finish_non_exhaustive()
    }
}

impl ChatRelay {
    /// Create a relay backed by `directory`, with a JWT verifier and issuer
    /// keyed from the configured secret.
    pub fn new(config: Config, directory: SqliteDirectory) -> Result<Self, ConfigError> {
        let key = SigningKey::from_secret(config.jwt_secret()?);
        let directory = Arc::new(directory);
        let verifier = Arc::new(JwtVerifier::new(&key, directory.clone()));
        let issuer = TokenIssuer::new(
            &key,
            Duration::from_secs(config.auth.token_ttl_minutes.saturating_mul(60)),
        );

        Ok(Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            verifier,
            users: directory.clone(),
            rooms: directory,
            issuer,
            metrics: Arc::new(RelayMetrics::default()),
        })
    }

    /// Open the configured database and build a relay on it.
    pub async fn open(config: Config) -> crate::error::Result<Self> {
        let directory = SqliteDirectory::new(&config.storage.database).await?;
        tracing::info!("Opened database {}", config.storage.database.display());
        Ok(Self::new(config, directory)?)
    }

    /// Replace the credential verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the credential verifier.
    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.verifier.as_ref()
    }

    /// Get the user directory.
    pub fn users(&self) -> &dyn UserDirectory {
        self.users.as_ref()
    }

    /// Get the room directory.
    pub fn rooms(&self) -> &dyn RoomDirectory {
        self.rooms.as_ref()
    }

    /// Get the token issuer.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Get total active sessions across all rooms.
    pub fn total_sessions(&self) -> usize {
        self.registry.session_count()
    }

    /// Get total rooms with at least one member.
    pub fn total_rooms(&self) -> usize {
        self.registry.room_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("test-secret".to_string());
        config
    }

    #[tokio::test]
    async fn new_requires_secret() {
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let err = ChatRelay::new(Config::default(), directory).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));
    }

    #[tokio::test]
    async fn issuer_and_verifier_share_key() {
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let relay = ChatRelay::new(test_config(), directory).unwrap();
        relay.users().create_user("a@example.com", "pw").await.unwrap();

        let token = relay.issuer().issue("a@example.com").unwrap();
        let identity = relay.verifier().verify(&token).await.unwrap();
        assert_eq!(identity.as_str(), "a@example.com");
    }

    struct LabelVerifier;

    #[async_trait::async_trait]
    impl CredentialVerifier for LabelVerifier {
        async fn verify(&self, credential: &str) -> crate::error::AuthResult<chat_types::Identity> {
            chat_types::Identity::new(credential)
                .map_err(|_| crate::error::AuthError::MissingSubject)
        }
    }

    #[tokio::test]
    async fn verifier_can_be_replaced() {
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let relay = ChatRelay::new(test_config(), directory)
            .unwrap()
            .with_verifier(Arc::new(LabelVerifier));

        let identity = relay.verifier().verify("guest").await.unwrap();
        assert_eq!(identity.as_str(), "guest");
        assert!(relay.verifier().verify("").await.is_err());
    }

    #[tokio::test]
    async fn token_ttl_follows_config() {
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let mut config = test_config();
        config.auth.token_ttl_minutes = 5;
        let relay = ChatRelay::new(config, directory).unwrap();
        assert_eq!(relay.issuer().ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage.database = dir.path().join("chat.db");

        let relay = ChatRelay::open(config).await.unwrap();
        assert!(dir.path().join("chat.db").exists());
        assert_eq!(relay.total_rooms(), 0);
    }

    #[tokio::test]
    async fn starts_with_no_sessions() {
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let relay = ChatRelay::new(test_config(), directory).unwrap();
        assert_eq!(relay.total_sessions(), 0);
        assert_eq!(relay.total_rooms(), 0);
    }
}
