//! Thin client for the relay's JSON API.

use anyhow::{Context, Result};
use chat_types::RoomId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A room as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    /// Room id, also the relay room key.
    pub id: RoomId,
    /// Room name.
    pub name: String,
    /// Owner's user id.
    pub owner_id: i64,
    /// Connected sessions (only on single-room lookups).
    #[serde(default)]
    pub online: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client bound to one server and, optionally, one token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create an anonymous client for `base` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Base URL of the server.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Register an account; returns its token.
    pub async fn register(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/register"))
            .json(&Credentials { email, password })
            .send()
            .await
            .context("Failed to reach server")?;
        let body: TokenResponse = parse(response).await?;
        Ok(body.token)
    }

    /// Log in; returns a fresh token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/login"))
            .json(&Credentials { email, password })
            .send()
            .await
            .context("Failed to reach server")?;
        let body: TokenResponse = parse(response).await?;
        Ok(body.token)
    }

    /// Rooms owned by the caller.
    pub async fn my_rooms(&self) -> Result<Vec<RoomInfo>> {
        let response = self.authed(self.http.get(self.url("/api/rooms"))).await?;
        parse(response).await
    }

    /// Rooms whose name contains `query`.
    pub async fn search_rooms(&self, query: &str) -> Result<Vec<RoomInfo>> {
        let request = self
            .http
            .get(self.url("/api/rooms/search"))
            .query(&[("query", query)]);
        let response = self.authed(request).await?;
        parse(response).await
    }

    /// Create a room owned by the caller.
    pub async fn create_room(&self, name: &str) -> Result<RoomInfo> {
        let request = self
            .http
            .post(self.url("/api/rooms"))
            .json(&serde_json::json!({ "name": name }));
        let response = self.authed(request).await?;
        parse(response).await
    }

    /// Look up one room, with its online count.
    pub async fn room(&self, room_id: RoomId) -> Result<RoomInfo> {
        let path = format!("/api/rooms/{}", room_id);
        let response = self.authed(self.http.get(self.url(&path))).await?;
        parse(response).await
    }

    /// Whether a room exists, without fetching it.
    pub async fn room_exists(&self, room_id: RoomId) -> Result<bool> {
        let path = format!("/api/rooms/{}", room_id);
        let response = self.authed(self.http.head(self.url(&path))).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await.map(|_| true)
    }

    /// Delete a room the caller owns.
    pub async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        let path = format!("/api/rooms/{}", room_id);
        let response = self.authed(self.http.delete(self.url(&path))).await?;
        check(response).await.map(|_| ())
    }

    /// WebSocket URL of the relay endpoint for `room_id`.
    pub fn relay_url(&self, room_id: RoomId, token: &str) -> String {
        relay_url(&self.base, room_id, token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn authed(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self
            .token
            .as_deref()
            .context("Not logged in. Run 'roomchat login' first.")?;
        request
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach server")
    }
}

/// Map an `http(s)://` base to the relay's `ws(s)://` endpoint.
pub fn relay_url(base: &str, room_id: RoomId, token: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws/{}?token={}", base, room_id, token)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    anyhow::bail!("{} ({})", error_message(&text), status)
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    check(response)
        .await?
        .json()
        .await
        .context("Unexpected response from server")
}

/// Pull the message out of an `{"error": ...}` body, or use the body as is.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "request failed".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
