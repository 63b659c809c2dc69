//! User and room directories.
//!
//! The relay itself only needs one lookup from here: a user by email, to
//! resolve a credential. The rest backs registration, login and room
//! management over the HTTP API.

mod password;
mod sqlite;

pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};
pub use sqlite::SqliteDirectory;

use crate::error::StorageError;
use async_trait::async_trait;
use chat_types::RoomId;
use serde::Serialize;

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    /// Directory-assigned identifier.
    pub id: i64,
    /// Login and display label.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// A chat room record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    /// Directory-assigned identifier, used as the relay room key.
    pub id: RoomId,
    /// Human-readable name.
    pub name: String,
    /// User who created the room.
    pub owner_id: i64,
}

/// Lookup and registration of users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Register a user, hashing the password.
    ///
    /// Fails with [`StorageError::EmailTaken`] if the email is already used.
    async fn create_user(&self, email: &str, password: &str) -> Result<User, StorageError>;

    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Return the user if the email exists and the password matches.
    async fn check_password(&self, email: &str, password: &str)
        -> Result<Option<User>, StorageError>;
}

/// Authoritative record of which rooms exist and who owns them.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Create a room owned by `owner_id`.
    async fn create_room(&self, name: &str, owner_id: i64) -> Result<Room, StorageError>;

    /// Whether a room with this id exists.
    async fn room_exists(&self, room_id: RoomId) -> Result<bool, StorageError>;

    /// Get a room by id.
    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, StorageError>;

    /// Rooms owned by a user, oldest first.
    async fn rooms_owned_by(&self, owner_id: i64) -> Result<Vec<Room>, StorageError>;

    /// Rooms whose name contains `query` (case-sensitive), oldest first.
    async fn search_rooms(&self, query: &str) -> Result<Vec<Room>, StorageError>;

    /// Delete a room if `owner_id` owns it.
    ///
    /// Returns `false` when the room does not exist or belongs to someone else.
    async fn delete_room(&self, room_id: RoomId, owner_id: i64) -> Result<bool, StorageError>;

    /// Round-trip to the backing store.
    async fn ping(&self) -> Result<(), StorageError>;
}
