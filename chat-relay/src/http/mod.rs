//! HTTP endpoints for chat-relay.
//!
//! Serves the WebSocket relay endpoint, the JSON account/room API, health
//! checks and metrics from one router.

pub mod api;
pub mod health;
mod metrics;

use crate::protocol::relay_handler;
use crate::server::ChatRelay;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

pub use api::{ApiError, AuthUser};
pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<ChatRelay>) -> Router {
    let mut router = Router::new()
        .route("/ws/:room_id", get(relay_handler))
        .route("/api/register", post(api::register))
        .route("/api/login", post(api::login))
        .route("/api/rooms", get(api::list_rooms).post(api::create_room))
        .route("/api/rooms/search", get(api::search_rooms))
        .route(
            "/api/rooms/:room_id",
            get(api::get_room)
                .head(api::room_exists)
                .delete(api::delete_room),
        )
        .route("/health", get(health::health_handler));

    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(relay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::directory::SqliteDirectory;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    async fn test_relay(config: Config) -> Arc<ChatRelay> {
        let mut config = config;
        config.auth.jwt_secret = Some("test-secret".to_string());
        let directory = SqliteDirectory::in_memory().await.unwrap();
        Arc::new(ChatRelay::new(config, directory).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let relay = test_relay(Config::default()).await;
        let app = build_router(relay);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let relay = test_relay(Config::default()).await;
        let app = build_router(relay);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_can_be_disabled() {
        let mut config = Config::default();
        config.http.metrics_enabled = false;
        let relay = test_relay(config).await;
        let app = build_router(relay);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn relay_endpoint_requires_upgrade() {
        let relay = test_relay(Config::default()).await;
        let app = build_router(relay.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ws/7?token=whatever")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(relay.total_sessions(), 0);
    }
}
