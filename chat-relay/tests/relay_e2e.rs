//! End-to-end tests against a real listener.

use futures::{SinkExt, StreamExt};
use roomchat_relay::config::Config;
use roomchat_relay::directory::SqliteDirectory;
use roomchat_relay::http::build_router;
use roomchat_relay::server::ChatRelay;
use chat_types::RoomId;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    relay: Arc<ChatRelay>,
    addr: SocketAddr,
}

impl TestServer {
    async fn start() -> Self {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("e2e-secret".to_string());
        let directory = SqliteDirectory::in_memory().await.unwrap();
        let relay = Arc::new(ChatRelay::new(config, directory).unwrap());

        for email in ["alice@example.com", "bob@example.com", "carol@example.com"] {
            relay.users().create_user(email, "pw").await.unwrap();
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(relay.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { relay, addr }
    }

    fn token(&self, email: &str) -> String {
        self.relay.issuer().issue(email).unwrap()
    }

    async fn connect(&self, room: &str, token: Option<&str>) -> Client {
        let url = match token {
            Some(token) => format!("ws://{}/ws/{}?token={}", self.addr, room, token),
            None => format!("ws://{}/ws/{}", self.addr, room),
        };
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn join(&self, room: i64, email: &str) -> Client {
        let before = self.relay.registry().member_count(RoomId::new(room));
        let ws = self.connect(&room.to_string(), Some(&self.token(email))).await;
        self.wait_for_members(room, before + 1).await;
        ws
    }

    async fn wait_for_members(&self, room: i64, count: usize) {
        for _ in 0..400 {
            if self.relay.registry().member_count(RoomId::new(room)) == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("room {room} never reached {count} members");
    }
}

async fn next_message(ws: &mut Client) -> Message {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match message {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_text(ws: &mut Client) -> String {
    match next_message(ws).await {
        Message::Text(text) => text,
        other => panic!("expected text, got {other:?}"),
    }
}

async fn expect_policy_close(ws: &mut Client) {
    match next_message(ws).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1008),
        other => panic!("expected close 1008, got {other:?}"),
    }
}

#[tokio::test]
async fn bad_token_closes_with_policy_violation() {
    let server = TestServer::start().await;
    let mut ws = server.connect("7", Some("not-a-token")).await;

    expect_policy_close(&mut ws).await;
    assert_eq!(server.relay.total_sessions(), 0);
    assert!(!server.relay.registry().contains_room(RoomId::new(7)));
}

#[tokio::test]
async fn missing_token_and_bad_room_are_refused_alike() {
    let server = TestServer::start().await;

    let mut ws = server.connect("7", None).await;
    expect_policy_close(&mut ws).await;

    let token = server.token("alice@example.com");
    let mut ws = server.connect("lobby", Some(&token)).await;
    expect_policy_close(&mut ws).await;

    assert_eq!(server.relay.total_sessions(), 0);
}

#[tokio::test]
async fn undecodable_query_is_refused_with_close() {
    let server = TestServer::start().await;
    let token = server.token("alice@example.com");

    // A repeated `token` cannot be decoded into the admission parameters.
    let url = format!("ws://{}/ws/7?token={}&token={}", server.addr, token, token);
    let (mut ws, _) = connect_async(url).await.unwrap();
    expect_policy_close(&mut ws).await;

    assert_eq!(server.relay.total_sessions(), 0);
    assert_eq!(
        server
            .relay
            .metrics()
            .admissions_rejected
            .load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn refused_peer_sees_no_notices() {
    let server = TestServer::start().await;
    let mut alice = server.join(7, "alice@example.com").await;

    let mut intruder = server.connect("7", Some("forged")).await;
    expect_policy_close(&mut intruder).await;

    alice.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "alice@example.com: ping");
    assert_eq!(server.relay.registry().member_count(RoomId::new(7)), 1);
}

#[tokio::test]
async fn room_join_chat_leave_flow() {
    let server = TestServer::start().await;

    let mut alice = server.join(7, "alice@example.com").await;
    let mut bob = server.join(7, "bob@example.com").await;
    assert_eq!(next_text(&mut alice).await, "bob@example.com joined room");

    bob.send(Message::Text("hi".into())).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "bob@example.com: hi");
    assert_eq!(next_text(&mut bob).await, "bob@example.com: hi");

    bob.close(None).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "bob@example.com left room");
    server.wait_for_members(7, 1).await;

    alice.close(None).await.unwrap();
    server.wait_for_members(7, 0).await;
    assert!(!server.relay.registry().contains_room(RoomId::new(7)));
}

#[tokio::test]
async fn rooms_are_isolated() {
    let server = TestServer::start().await;

    let mut alice = server.join(1, "alice@example.com").await;
    let mut carol = server.join(2, "carol@example.com").await;

    alice.send(Message::Text("only room one".into())).await.unwrap();
    assert_eq!(next_text(&mut alice).await, "alice@example.com: only room one");

    carol.send(Message::Text("room two".into())).await.unwrap();
    assert_eq!(next_text(&mut carol).await, "carol@example.com: room two");

    let stray = tokio::time::timeout(Duration::from_millis(100), alice.next()).await;
    assert!(stray.is_err(), "room 1 received {stray:?}");
}

#[tokio::test]
async fn dropped_connection_triggers_leave() {
    let server = TestServer::start().await;

    let mut alice = server.join(9, "alice@example.com").await;
    let bob = server.join(9, "bob@example.com").await;
    assert_eq!(next_text(&mut alice).await, "bob@example.com joined room");

    drop(bob);
    assert_eq!(next_text(&mut alice).await, "bob@example.com left room");
    server.wait_for_members(9, 1).await;
}
