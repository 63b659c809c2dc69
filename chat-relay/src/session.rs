//! Per-connection session management.
//!
//! A Session is created only after admission succeeded. It joins its room,
//! relays every inbound text frame to the room, and leaves exactly once when
//! the connection ends.
//!
//! The transport is split in two. Outbound lines go through a bounded channel
//! drained by a writer task; inbound frames are read by the session loop. The
//! first of the two to finish is the single "session closed" event that
//! triggers the leave.

use crate::registry::{ConnectionRegistry, Delivery, SessionHandle};
use crate::server::RelayMetrics;
use chat_types::{Identity, RoomId, SessionId};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One inbound unit, as far as the relay cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message to relay.
    Text(String),
    /// The peer asked to close.
    Close,
    /// Anything else (binary, ping, pong); ignored.
    Other,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed, or the inbound stream ended.
    ClientClosed,
    /// Reading from the transport failed.
    ReadFailed,
    /// Writing to the transport failed.
    WriteFailed,
}

/// A per-connection session.
pub struct Session {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<RelayMetrics>,
    room_id: RoomId,
    handle: SessionHandle,
    outbound_rx: mpsc::Receiver<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.handle.id())
            .field("identity", self.handle.identity())
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session for an admitted identity.
    ///
    /// `outbound_buffer` is the number of lines that may queue for this
    /// session before broadcasters wait on it.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        metrics: Arc<RelayMetrics>,
        room_id: RoomId,
        identity: Identity,
        outbound_buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(outbound_buffer.max(1));
        let handle = SessionHandle::new(registry.next_session_id(), identity, tx);
        Self {
            registry,
            metrics,
            room_id,
            handle,
            outbound_rx: rx,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    /// Identity the session was admitted with.
    pub fn identity(&self) -> &Identity {
        self.handle.identity()
    }

    /// Room the session belongs to.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Run the session until the connection ends.
    ///
    /// Joins the room (announcing it to the others), relays inbound text,
    /// and leaves the room once on the way out.
    pub async fn run<S, E, K>(self, mut inbound: S, outbound: K) -> SessionEnd
    where
        S: Stream<Item = Result<Inbound, E>> + Unpin,
        E: Display,
        K: Sink<String> + Unpin + Send + 'static,
        K::Error: Display,
    {
        let Session {
            registry,
            metrics,
            room_id,
            handle,
            outbound_rx,
        } = self;

        tracing::info!(
            "Session {} admitted: identity={} room={}",
            handle.id(),
            handle.identity(),
            room_id
        );

        let mut writer = tokio::spawn(forward_outbound(handle.id(), outbound_rx, outbound));

        let joined = registry.admit(room_id, handle.clone()).await;
        record(&metrics, joined);

        let end = loop {
            tokio::select! {
                next = inbound.next() => match next {
                    Some(Ok(Inbound::Text(text))) => {
                        let delivery = registry.broadcast(room_id, handle.identity(), &text).await;
                        metrics.messages_relayed.fetch_add(1, Ordering::Relaxed);
                        record(&metrics, delivery);
                    }
                    Some(Ok(Inbound::Other)) => {}
                    Some(Ok(Inbound::Close)) | None => break SessionEnd::ClientClosed,
                    Some(Err(e)) => {
                        tracing::debug!("Session {} read failed: {}", handle.id(), e);
                        break SessionEnd::ReadFailed;
                    }
                },
                _ = &mut writer => break SessionEnd::WriteFailed,
            }
        };

        registry.leave(room_id, &handle).await;
        writer.abort();
        metrics.sessions_closed.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Session {} closed ({:?}): identity={} room={}",
            handle.id(),
            end,
            handle.identity(),
            room_id
        );

        end
    }
}

/// Drain queued lines into the transport until a write fails.
///
/// Returning is the writer's liveness signal to the session loop.
async fn forward_outbound<K>(id: SessionId, mut rx: mpsc::Receiver<String>, mut sink: K)
where
    K: Sink<String> + Unpin,
    K::Error: Display,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = sink.send(line).await {
            tracing::debug!("Session {} write failed: {}", id, e);
            return;
        }
    }
}

fn record(metrics: &RelayMetrics, delivery: Delivery) {
    metrics
        .deliveries_total
        .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
    metrics
        .deliveries_dropped
        .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
}
