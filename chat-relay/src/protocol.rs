//! WebSocket relay endpoint: `GET /ws/{room_id}?token={credential}`.
//!
//! Admission happens once, before any session exists. A refused request is
//! still upgraded so the refusal can be delivered as a close frame with code
//! 1008; it never reaches the registry.

use crate::error::AdmissionError;
use crate::server::ChatRelay;
use crate::session::{Inbound, Session};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::response::Response;
use axum::Extension;
use chat_types::{Identity, RoomId};
use futures::{future, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// WebSocket close code for a refused admission (policy violation).
pub const POLICY_VIOLATION: u16 = 1008;

/// How long a refused peer gets to acknowledge the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Query parameters of the relay endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct AdmissionParams {
    /// Bearer credential.
    pub token: Option<String>,
}

/// Upgrade handler for the relay endpoint.
///
/// Path and query decoding failures are taken as values so they end in the
/// same policy-violation close as a bad credential, not in an HTTP 400.
pub async fn relay_handler(
    Extension(relay): Extension<Arc<ChatRelay>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<AdmissionParams>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Response {
    relay.metrics().connections_total.fetch_add(1, Ordering::Relaxed);

    let admission = match (path, query) {
        (Ok(Path(room)), Ok(Query(params))) => {
            admit(&relay, &room, params.token.as_deref()).await
        }
        (Err(rejection), _) => Err(AdmissionError::Malformed(rejection.body_text())),
        (_, Err(rejection)) => Err(AdmissionError::Malformed(rejection.body_text())),
    };
    if let Err(e) = &admission {
        tracing::warn!("Admission refused: {}", e);
        relay
            .metrics()
            .admissions_rejected
            .fetch_add(1, Ordering::Relaxed);
    }

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok((room_id, identity)) => serve(relay, socket, room_id, identity).await,
            Err(_) => reject(socket).await,
        }
    })
}

/// Parse the request parameters and verify the credential.
pub async fn admit(
    relay: &ChatRelay,
    room: &str,
    token: Option<&str>,
) -> Result<(RoomId, Identity), AdmissionError> {
    let room_id: RoomId = room.parse()?;
    let token = token.ok_or(AdmissionError::MissingToken)?;
    let identity = relay.verifier().verify(token).await?;
    Ok((room_id, identity))
}

async fn serve(relay: Arc<ChatRelay>, socket: WebSocket, room_id: RoomId, identity: Identity) {
    let session = Session::new(
        relay.registry().clone(),
        relay.metrics().clone(),
        room_id,
        identity,
        relay.config().relay.outbound_buffer,
    );

    let (sink, stream) = socket.split();
    let inbound = stream.map(|message| message.map(classify));
    let outbound =
        sink.with(|line: String| future::ready(Ok::<_, axum::Error>(Message::Text(line))));

    session.run(inbound, outbound).await;
}

async fn reject(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: POLICY_VIOLATION,
        reason: "policy violation".into(),
    };
    if socket.send(Message::Close(Some(frame))).await.is_err() {
        return;
    }

    // Wait for the peer's close reply so the handshake completes cleanly.
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(_)) = socket.recv().await {}
    })
    .await;
}

fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Text(text),
        Message::Close(_) => Inbound::Close,
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => Inbound::Other,
    }
}
