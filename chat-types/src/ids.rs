//! Identity and addressing types for roomchat.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ChatError;

/// Identifier of a chat room.
///
/// Assigned by the room directory. The relay never checks that a room
/// exists: an unknown id is simply a room with no members yet.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(i64);

impl RoomId {
    /// Create a RoomId from its numeric value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this RoomId.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl FromStr for RoomId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ChatError::InvalidRoomId(s.to_string()))
    }
}

impl From<i64> for RoomId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.0)
    }
}

/// Process-unique identifier of one admitted connection.
///
/// Two connections of the same user get different SessionIds, which is
/// what makes them distinct members of a room.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a SessionId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this SessionId.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Display label of an authenticated user (their email).
///
/// Resolved once when a connection is admitted and frozen for the
/// lifetime of that session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an Identity, rejecting empty labels.
    pub fn new(label: impl Into<String>) -> Result<Self, ChatError> {
        let label = label.into();
        if label.is_empty() {
            return Err(ChatError::EmptyIdentity);
        }
        Ok(Self(label))
    }

    /// Borrow the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}
