//! Health check endpoint.
//!
//! Reports live session counts and whether the directory database answers.
//! An unreachable database turns the status to `degraded` and the response
//! to 503, so load balancers stop routing registrations and logins here.

use crate::server::ChatRelay;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the process start time; later calls keep the first value.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// `ok` or `unavailable`.
    pub database: &'static str,
    /// Relay version.
    pub version: &'static str,
    /// Sessions currently admitted.
    pub sessions: usize,
    /// Rooms with at least one member.
    pub rooms: usize,
    /// Seconds since [`init_start_time`].
    pub uptime_seconds: u64,
}

impl HealthStatus {
    fn collect(relay: &ChatRelay, database_ok: bool) -> Self {
        Self {
            status: if database_ok { "ok" } else { "degraded" },
            database: if database_ok { "ok" } else { "unavailable" },
            version: env!("CARGO_PKG_VERSION"),
            sessions: relay.total_sessions(),
            rooms: relay.total_rooms(),
            uptime_seconds: START_TIME
                .get()
                .map(|start| start.elapsed().as_secs())
                .unwrap_or(0),
        }
    }
}

/// `GET /health`
pub async fn health_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
) -> (StatusCode, Json<HealthStatus>) {
    let database_ok = match relay.rooms().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check: directory unreachable: {}", e);
            false
        }
    };

    let code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(HealthStatus::collect(&relay, database_ok)))
}
