//! Connection registry: which sessions are in which room.
//!
//! The registry is the only owner of the room → members mapping. Each room's
//! member list is mutated under its DashMap shard lock through the entry API,
//! so concurrent joins and leaves on one room never lose an update and an
//! emptied room disappears in the same critical section that emptied it.
//! Rooms on other shards are not blocked.
//!
//! Delivery never happens under the lock: broadcasts snapshot the member
//! list first, then await each recipient's outbound buffer in turn.

use chat_types::{Identity, RelayFrame, RoomId, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Registry-side handle to one admitted session.
///
/// Handles are compared by [`SessionId`], never by identity: one user may
/// hold several sessions in the same room.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    identity: Identity,
    outbound: mpsc::Sender<String>,
}

impl SessionHandle {
    /// Create a handle delivering into `outbound`.
    pub fn new(id: SessionId, identity: Identity, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id,
            identity,
            outbound,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Identity the session was admitted with.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue a line for this session.
    ///
    /// Waits while the buffer is full. Returns `false` if the session's
    /// receiving side is gone; the session cleans itself up, so the caller
    /// only drops the line.
    async fn deliver(&self, line: String) -> bool {
        self.outbound.send(line).await.is_ok()
    }
}

/// Outcome of delivering one line to a set of members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose buffer accepted the line.
    pub delivered: usize,
    /// Recipients that were already gone.
    pub dropped: usize,
}

/// Process-wide room → members mapping.
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// Members per room, in join order.
    rooms: DashMap<RoomId, Vec<SessionHandle>>,
    /// Source of session identifiers.
    next_session_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh session identifier.
    pub fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append a session to a room, creating the room if needed.
    ///
    /// Not idempotent: call exactly once per admitted session.
    pub fn join(&self, room_id: RoomId, handle: SessionHandle) {
        let id = handle.id;
        let mut members = self.rooms.entry(room_id).or_default();
        members.push(handle);

        tracing::debug!(
            "Joined: room={} session={} (members: {})",
            room_id,
            id,
            members.len()
        );
    }

    /// Join a room and announce it to the members already there.
    pub async fn admit(&self, room_id: RoomId, handle: SessionHandle) -> Delivery {
        let id = handle.id;
        let line = RelayFrame::Joined {
            identity: handle.identity.clone(),
        }
        .to_line();

        self.join(room_id, handle);

        let others: Vec<SessionHandle> = self
            .snapshot(room_id)
            .into_iter()
            .filter(|member| member.id != id)
            .collect();
        deliver_all(&others, line).await
    }

    /// Send `"{sender}: {text}"` to every member of the room, sender included.
    pub async fn broadcast(&self, room_id: RoomId, sender: &Identity, text: &str) -> Delivery {
        let line = RelayFrame::Chat {
            identity: sender.clone(),
            text: text.to_string(),
        }
        .to_line();

        let members = self.snapshot(room_id);
        deliver_all(&members, line).await
    }

    /// Remove a session from a room and tell the remaining members.
    ///
    /// Removing a session that is not there is a no-op and sends nothing,
    /// so a repeated leave never produces a second notice. Returns whether
    /// the session was present.
    pub async fn leave(&self, room_id: RoomId, handle: &SessionHandle) -> bool {
        let remaining = match self.rooms.entry(room_id) {
            Entry::Occupied(mut entry) => {
                let members = entry.get_mut();
                let Some(index) = members.iter().position(|m| m.id == handle.id) else {
                    return false;
                };
                members.remove(index);

                if members.is_empty() {
                    entry.remove();
                    tracing::debug!("Room {} is empty, removed", room_id);
                    Vec::new()
                } else {
                    members.clone()
                }
            }
            Entry::Vacant(_) => return false,
        };

        tracing::debug!(
            "Left: room={} session={} (remaining: {})",
            room_id,
            handle.id,
            remaining.len()
        );

        let line = RelayFrame::Left {
            identity: handle.identity.clone(),
        }
        .to_line();
        deliver_all(&remaining, line).await;
        true
    }

    /// Identities of a room's members, in join order.
    pub fn members(&self, room_id: RoomId) -> Vec<Identity> {
        self.rooms
            .get(&room_id)
            .map(|members| members.iter().map(|m| m.identity.clone()).collect())
            .unwrap_or_default()
    }

    /// Session ids of a room's members, in join order.
    pub fn member_ids(&self, room_id: RoomId) -> Vec<SessionId> {
        self.rooms
            .get(&room_id)
            .map(|members| members.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    /// Number of sessions in a room.
    pub fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the registry has an entry for the room.
    pub fn contains_room(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of sessions across all rooms.
    pub fn session_count(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }

    /// Copy of a room's member list, taken under the shard lock.
    fn snapshot(&self, room_id: RoomId) -> Vec<SessionHandle> {
        self.rooms
            .get(&room_id)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }
}

/// Deliver one line to each target in order; a gone recipient is skipped.
async fn deliver_all(targets: &[SessionHandle], line: String) -> Delivery {
    let mut outcome = Delivery::default();
    for target in targets {
        if target.deliver(line.clone()).await {
            outcome.delivered += 1;
        } else {
            tracing::debug!("Dropped line for closed session {}", target.id);
            outcome.dropped += 1;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity(label: &str) -> Identity {
        Identity::new(label).unwrap()
    }

    fn member(registry: &ConnectionRegistry, label: &str) -> (SessionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        (
            SessionHandle::new(registry.next_session_id(), identity(label), tx),
            rx,
        )
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn session_ids_are_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.next_session_id();
        let b = registry.next_session_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn join_creates_room_lazily() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        assert!(!registry.contains_room(room));

        let (a, _rx) = member(&registry, "a");
        registry.join(room, a.clone());

        assert!(registry.contains_room(room));
        assert_eq!(registry.member_ids(room), vec![a.id()]);
    }

    #[tokio::test]
    async fn join_is_not_idempotent() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        let (a, _rx) = member(&registry, "a");

        registry.join(room, a.clone());
        registry.join(room, a.clone());

        assert_eq!(registry.member_count(room), 2);
    }

    #[tokio::test]
    async fn same_user_may_hold_two_sessions() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        let (first, mut first_rx) = member(&registry, "alice");
        let (second, mut second_rx) = member(&registry, "alice");

        registry.join(room, first.clone());
        registry.join(room, second.clone());
        assert_eq!(registry.member_count(room), 2);

        registry.broadcast(room, &identity("alice"), "hi").await;
        assert_eq!(drain(&mut first_rx), vec!["alice: hi"]);
        assert_eq!(drain(&mut second_rx), vec!["alice: hi"]);

        registry.leave(room, &first).await;
        assert_eq!(registry.member_ids(room), vec![second.id()]);
        assert_eq!(drain(&mut second_rx), vec!["alice left room"]);
    }

    #[tokio::test]
    async fn admit_announces_to_others_only() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(3);
        let (a, mut a_rx) = member(&registry, "a");
        let (b, mut b_rx) = member(&registry, "b");

        let first = registry.admit(room, a).await;
        assert_eq!(first.delivered, 0);

        let second = registry.admit(room, b).await;
        assert_eq!(second.delivered, 1);

        assert_eq!(drain(&mut a_rx), vec!["b joined room"]);
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member_including_sender() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(7);
        let mut receivers = Vec::new();
        for label in ["a", "b", "c", "d"] {
            let (handle, rx) = member(&registry, label);
            registry.join(room, handle);
            receivers.push(rx);
        }

        let outcome = registry.broadcast(room, &identity("a"), "hello").await;
        assert_eq!(
            outcome,
            Delivery {
                delivered: 4,
                dropped: 0
            }
        );

        for rx in receivers.iter_mut() {
            assert_eq!(drain(rx), vec!["a: hello"]);
        }
    }

    #[tokio::test]
    async fn broadcast_to_unknown_room_delivers_nothing() {
        let registry = ConnectionRegistry::new();
        let outcome = registry
            .broadcast(RoomId::new(404), &identity("a"), "anyone?")
            .await;
        assert_eq!(outcome, Delivery::default());
        assert!(!registry.contains_room(RoomId::new(404)));
    }

    #[tokio::test]
    async fn broadcast_skips_closed_recipient() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        let (a, mut a_rx) = member(&registry, "a");
        let (b, b_rx) = member(&registry, "b");
        let (c, mut c_rx) = member(&registry, "c");
        registry.join(room, a);
        registry.join(room, b.clone());
        registry.join(room, c);

        drop(b_rx);
        let outcome = registry.broadcast(room, &identity("a"), "still there?").await;

        assert_eq!(
            outcome,
            Delivery {
                delivered: 2,
                dropped: 1
            }
        );
        assert_eq!(drain(&mut a_rx), vec!["a: still there?"]);
        assert_eq!(drain(&mut c_rx), vec!["a: still there?"]);
        // A failed send is not a leave: b stays until its own session leaves.
        assert_eq!(registry.member_count(room), 3);
    }

    #[tokio::test]
    async fn leave_notifies_remaining_members_once() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        let (a, mut a_rx) = member(&registry, "a");
        let (b, mut b_rx) = member(&registry, "b");
        registry.join(room, a.clone());
        registry.join(room, b.clone());

        assert!(registry.leave(room, &b).await);
        assert!(!registry.leave(room, &b).await);

        assert_eq!(drain(&mut a_rx), vec!["b left room"]);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(registry.member_ids(room), vec![a.id()]);
    }

    #[tokio::test]
    async fn leave_of_absent_session_is_noop() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(1);
        let (a, mut a_rx) = member(&registry, "a");
        let (stranger, _rx) = member(&registry, "stranger");
        registry.join(room, a);

        assert!(!registry.leave(room, &stranger).await);
        assert!(!registry.leave(RoomId::new(2), &stranger).await);
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(registry.member_count(room), 1);
    }

    #[tokio::test]
    async fn join_leave_sequence_matches_live_set() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(5);
        let handles: Vec<_> = (0..6)
            .map(|i| member(&registry, &format!("u{i}")))
            .collect();

        for (handle, _) in &handles {
            registry.join(room, handle.clone());
        }
        for index in [4, 0, 2] {
            registry.leave(room, &handles[index].0).await;
        }

        let expected: Vec<SessionId> = [1, 3, 5].iter().map(|&i| handles[i].0.id()).collect();
        assert_eq!(registry.member_ids(room), expected);

        for index in [1, 3, 5] {
            registry.leave(room, &handles[index].0).await;
        }
        assert!(!registry.contains_room(room));
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn room_seven_scenario() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(7);
        let (a, mut a_rx) = member(&registry, "A");
        let (b, mut b_rx) = member(&registry, "B");
        let (c, mut c_rx) = member(&registry, "C");
        registry.admit(room, a.clone()).await;
        registry.admit(room, b.clone()).await;
        registry.admit(room, c.clone()).await;
        drain(&mut a_rx);
        drain(&mut b_rx);
        drain(&mut c_rx);

        registry.broadcast(room, a.identity(), "hi").await;
        assert_eq!(drain(&mut a_rx), vec!["A: hi"]);
        assert_eq!(drain(&mut b_rx), vec!["A: hi"]);
        assert_eq!(drain(&mut c_rx), vec!["A: hi"]);

        registry.leave(room, &b).await;
        assert_eq!(drain(&mut a_rx), vec!["B left room"]);
        assert_eq!(drain(&mut c_rx), vec!["B left room"]);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(
            registry.members(room),
            vec![identity("A"), identity("C")]
        );
    }

    #[tokio::test]
    async fn room_nine_scenario() {
        let registry = ConnectionRegistry::new();
        let room = RoomId::new(9);
        let (d, _d_rx) = member(&registry, "D");
        registry.admit(room, d.clone()).await;

        registry.leave(room, &d).await;
        assert!(!registry.contains_room(room));

        let (e, _e_rx) = member(&registry, "E");
        registry.admit(room, e.clone()).await;
        assert_eq!(registry.member_ids(room), vec![e.id()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_are_not_lost() {
        let registry = Arc::new(ConnectionRegistry::new());
        let room = RoomId::new(11);

        let mut tasks = Vec::new();
        let mut receivers = Vec::new();
        for i in 0..64 {
            let (handle, rx) = member(&registry, &format!("u{i}"));
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.join(room, handle);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.member_count(room), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_join_and_leave_keeps_room_consistent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let room = RoomId::new(12);

        let mut tasks = Vec::new();
        let mut receivers = Vec::new();
        for i in 0..32 {
            let (handle, rx) = member(&registry, &format!("u{i}"));
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.join(room, handle.clone());
                tokio::task::yield_now().await;
                registry.leave(room, &handle).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.member_count(room), 0);
        assert!(!registry.contains_room(room));
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let registry = ConnectionRegistry::new();
        let (a, mut a_rx) = member(&registry, "a");
        let (b, mut b_rx) = member(&registry, "b");
        registry.join(RoomId::new(1), a);
        registry.join(RoomId::new(2), b);

        registry.broadcast(RoomId::new(1), &identity("a"), "one").await;

        assert_eq!(drain(&mut a_rx), vec!["a: one"]);
        assert!(drain(&mut b_rx).is_empty());
        assert_eq!(registry.room_count(), 2);
        assert_eq!(registry.session_count(), 2);
    }
}
