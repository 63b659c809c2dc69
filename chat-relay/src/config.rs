//! Configuration loading for chat-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every section and field is optional; the JWT secret can also be
//! supplied through the `ROOMCHAT_JWT_SECRET` environment variable.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "ROOMCHAT_JWT_SECRET";

/// Root configuration for chat-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Token signing and verification.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Relay tuning.
    #[serde(default)]
    pub relay: RelayConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket listener (default: 0.0.0.0:8000).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Token configuration.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 shared secret used to sign and verify access tokens.
    pub jwt_secret: Option<String>,
    /// Lifetime of issued tokens in minutes (default: 30, at most one year).
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Relay tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Capacity of each session's outbound line buffer (default: 64).
    ///
    /// A broadcaster waits when a recipient's buffer is full.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Upper bound for `auth.token_ttl_minutes`: one year.
pub const MAX_TOKEN_TTL_MINUTES: u64 = 365 * 24 * 60;

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_token_ttl_minutes() -> u64 {
    30
}

fn default_database_path() -> PathBuf {
    PathBuf::from("roomchat.db")
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load the configuration used by the binary.
    ///
    /// A missing file yields the defaults. The environment secret, when set,
    /// replaces the file's. The result is validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            config.auth.jwt_secret = Some(secret);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde defaults cannot guard.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {}
            _ => return Err(ConfigError::MissingSecret),
        }

        if self.auth.token_ttl_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "auth.token_ttl_minutes",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::Invalid {
                field: "auth.token_ttl_minutes",
                reason: format!("must be at most {MAX_TOKEN_TTL_MINUTES}"),
            });
        }

        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "relay.outbound_buffer",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Signing secret, once [`Config::validate`] has passed.
    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// No signing secret in the file or the environment.
    #[error("auth.jwt_secret is not set (or set {JWT_SECRET_ENV})")]
    MissingSecret,
    /// A field holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
