//! Saved login state for roomchat.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server used when none was given and none is saved.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

const SESSION_FILE: &str = "session.json";

/// The account the CLI is logged in as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the relay's HTTP API.
    pub server: String,
    /// Account email.
    pub email: String,
    /// Bearer token from register or login.
    pub token: String,
    /// When the token was obtained (Unix seconds).
    pub saved_at: u64,
}

impl SessionConfig {
    /// Create a session record for a freshly issued token.
    pub fn new(server: &str, email: &str, token: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            email: email.to_string(),
            token: token.to_string(),
            saved_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Load the saved session from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SESSION_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Not logged in. Run 'roomchat login' or 'roomchat register' first.")?;
        serde_json::from_str(&contents).context("Invalid session file")
    }

    /// Save the session to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(SESSION_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save session")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Remove the saved session. Returns whether one existed.
    pub async fn clear(data_dir: &Path) -> Result<bool> {
        let path = data_dir.join(SESSION_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to remove session"),
        }
    }
}

/// Pick the server: explicit flag, then the saved session, then the default.
pub fn resolve_server(flag: Option<&str>, saved: Option<&SessionConfig>) -> String {
    flag.map(|s| s.trim_end_matches('/').to_string())
        .or_else(|| saved.map(|s| s.server.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER.to_string())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
