//! Register, log in, log out, show who is logged in.

use anyhow::{Context, Result};
use std::path::Path;

use crate::client::ApiClient;
use crate::config::SessionConfig;

/// Use the password given on the command line, or read one without echo.
pub fn password_or_prompt(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

/// Run the register command.
pub async fn register(data_dir: &Path, server: &str, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(server);
    let token = client.register(email, password).await?;
    SessionConfig::new(client.base(), email, &token)
        .save(data_dir)
        .await?;

    println!("Registered {} on {}", email, client.base());
    println!();
    println!("Next steps:");
    println!("  1. Create a room: roomchat rooms create <name>");
    println!("  2. Join a room:   roomchat join <room-id>");
    Ok(())
}

/// Run the login command.
pub async fn login(data_dir: &Path, server: &str, email: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(server);
    let token = client.login(email, password).await?;
    SessionConfig::new(client.base(), email, &token)
        .save(data_dir)
        .await?;

    println!("Logged in as {} on {}", email, client.base());
    Ok(())
}

/// Run the logout command.
pub async fn logout(data_dir: &Path) -> Result<()> {
    if SessionConfig::clear(data_dir).await? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

/// Run the status command.
pub async fn status(data_dir: &Path) -> Result<()> {
    println!("=== roomchat status ===");
    println!();

    match SessionConfig::load(data_dir).await {
        Ok(session) => {
            println!("Account:");
            println!("  Email:  {}", session.email);
            println!("  Server: {}", session.server);
            println!("  Login:  {}", format_timestamp(session.saved_at));
        }
        Err(_) => {
            println!("Account: NOT LOGGED IN");
            println!();
            println!("Run 'roomchat register' or 'roomchat login' first.");
        }
    }
    Ok(())
}

/// Format a Unix timestamp as a human-readable age.
fn format_timestamp(ts: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let diff = now.saturating_sub(ts);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SERVER;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_login() {
        let dir = tempdir().unwrap();
        assert!(status(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn status_with_session() {
        let dir = tempdir().unwrap();
        SessionConfig::new(DEFAULT_SERVER, "alice@example.com", "t")
            .save(dir.path())
            .await
            .unwrap();
        assert!(status(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let dir = tempdir().unwrap();
        SessionConfig::new(DEFAULT_SERVER, "alice@example.com", "t")
            .save(dir.path())
            .await
            .unwrap();

        logout(dir.path()).await.unwrap();
        logout(dir.path()).await.unwrap();
        assert!(SessionConfig::load(dir.path()).await.is_err());
    }

    #[test]
    fn password_flag_skips_prompt() {
        assert_eq!(
            password_or_prompt(Some("hunter2".to_string())).unwrap(),
            "hunter2"
        );
    }

    #[test]
    fn empty_password_rejected() {
        let err = password_or_prompt(Some(String::new())).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn format_timestamp_works() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120).contains("minutes"));
        assert!(format_timestamp(now - 7200).contains("hours"));
        assert!(format_timestamp(now - 172800).contains("days"));
    }
}
