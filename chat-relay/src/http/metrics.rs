//! Prometheus metrics endpoint.

use crate::server::ChatRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Gauges reflect the registry right now; counters are monotonic since startup.
pub async fn metrics_handler(Extension(relay): Extension<Arc<ChatRelay>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay),
    )
}

fn render(relay: &ChatRelay) -> String {
    let m = relay.metrics();

    let sessions = relay.total_sessions();
    let rooms = relay.total_rooms();

    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let rejected = m.admissions_rejected.load(Ordering::Relaxed);
    let closed = m.sessions_closed.load(Ordering::Relaxed);
    let messages = m.messages_relayed.load(Ordering::Relaxed);
    let deliveries = m.deliveries_total.load(Ordering::Relaxed);
    let dropped = m.deliveries_dropped.load(Ordering::Relaxed);

    format!(
        r#"# HELP roomchat_sessions_active Number of connected sessions
# TYPE roomchat_sessions_active gauge
roomchat_sessions_active {sessions}

# HELP roomchat_rooms_active Number of rooms with at least one member
# TYPE roomchat_rooms_active gauge
roomchat_rooms_active {rooms}

# HELP roomchat_info Server information
# TYPE roomchat_info gauge
roomchat_info{{version="{version}"}} 1

# HELP roomchat_connections_total Total upgrade requests on the relay endpoint
# TYPE roomchat_connections_total counter
roomchat_connections_total {conns_total}

# HELP roomchat_admissions_rejected_total Total admissions refused with a policy-violation close
# TYPE roomchat_admissions_rejected_total counter
roomchat_admissions_rejected_total {rejected}

# HELP roomchat_sessions_closed_total Total sessions ended
# TYPE roomchat_sessions_closed_total counter
roomchat_sessions_closed_total {closed}

# HELP roomchat_messages_relayed_total Total chat messages relayed
# TYPE roomchat_messages_relayed_total counter
roomchat_messages_relayed_total {messages}

# HELP roomchat_deliveries_total Total lines queued to room members
# TYPE roomchat_deliveries_total counter
roomchat_deliveries_total {deliveries}

# HELP roomchat_deliveries_dropped_total Total lines dropped for departed members
# TYPE roomchat_deliveries_dropped_total counter
roomchat_deliveries_dropped_total {dropped}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
