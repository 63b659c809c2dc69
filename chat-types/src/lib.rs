//! # chat-types
//!
//! Shared types for the roomchat relay and its clients.
//!
//! - [`RoomId`], [`SessionId`], [`Identity`] - Identity and addressing types
//! - [`RelayFrame`] - The three server-to-client text frames
//! - [`ChatError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod ids;

pub use error::ChatError;
pub use frame::RelayFrame;
pub use ids::{Identity, RoomId, SessionId};
