//! Interactive chat: stdin lines go to the room, room lines go to stdout.

use anyhow::{Context, Result};
use chat_types::RoomId;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::client::ApiClient;

/// Close code the relay sends when it refuses a token.
const POLICY_VIOLATION: u16 = 1008;

/// What a relay frame means to the terminal.
#[derive(Debug, PartialEq, Eq)]
enum Incoming {
    Line(String),
    Refused,
    Closed,
    Ignore,
}

/// Run the join command until stdin ends or the relay closes.
///
/// `client` must carry the token; the room is looked up before connecting
/// because the relay admits any room id.
pub async fn run(client: &ApiClient, token: &str, room_id: RoomId) -> Result<()> {
    if !client.room_exists(room_id).await? {
        anyhow::bail!("Room {} does not exist", room_id);
    }

    let url = client.relay_url(room_id, token);
    let (ws, _) = connect_async(url.as_str())
        .await
        .context("Failed to connect to relay")?;
    let (mut sink, mut stream) = ws.split();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("Connected to room {}. Type to chat, Ctrl-D to leave.", room_id);

    loop {
        tokio::select! {
            line = stdin.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => sink
                    .send(Message::Text(line))
                    .await
                    .context("Failed to send message")?,
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(message)) => match classify(message) {
                    Incoming::Line(text) => println!("{}", text),
                    Incoming::Refused => anyhow::bail!(
                        "The relay refused the token. Run 'roomchat login' again."
                    ),
                    Incoming::Closed => break,
                    Incoming::Ignore => {}
                },
                Some(Err(e)) => return Err(e).context("Connection to relay lost"),
                None => break,
            },
        }
    }

    println!("Left room {}.", room_id);
    Ok(())
}

fn classify(message: Message) -> Incoming {
    match message {
        Message::Text(text) => Incoming::Line(text),
        Message::Close(Some(frame)) if u16::from(frame.code) == POLICY_VIOLATION => {
            Incoming::Refused
        }
        Message::Close(_) => Incoming::Closed,
        _ => Incoming::Ignore,
    }
}
