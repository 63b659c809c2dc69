//! Server-to-client frame grammar.
//!
//! The relay speaks plain UTF-8 text with no envelope. There are exactly
//! three kinds of server frame:
//!
//! | Frame    | Text                       |
//! |----------|----------------------------|
//! | Joined   | `{identity} joined room`   |
//! | Chat     | `{identity}: {text}`       |
//! | Left     | `{identity} left room`     |
//!
//! Client-to-server frames are raw text, one message per frame.

use std::fmt;

use crate::Identity;

/// A frame sent by the relay to room members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// A new session was admitted to the room.
    Joined {
        /// Who joined.
        identity: Identity,
    },
    /// A message submitted by a member, echoed to everyone including the sender.
    Chat {
        /// Who sent it.
        identity: Identity,
        /// The raw text as received.
        text: String,
    },
    /// A session left the room.
    Left {
        /// Who left.
        identity: Identity,
    },
}

impl RelayFrame {
    /// Render the frame as the line delivered over the wire.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RelayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayFrame::Joined { identity } => write!(f, "{identity} joined room"),
            RelayFrame::Chat { identity, text } => write!(f, "{identity}: {text}"),
            RelayFrame::Left { identity } => write!(f, "{identity} left room"),
        }
    }
}
