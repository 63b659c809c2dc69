//! # chat-relay
//!
//! Real-time room relay for roomchat.
//!
//! This crate implements a relay server that:
//! - Admits WebSocket connections after a one-time bearer credential check
//! - Tracks which sessions are connected to which chat room
//! - Fans each inbound message out to every member of the room (sender included)
//! - Announces joins and departures to the other members
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐   GET /ws/{room}?token=…    ┌── Client B
//!            │                              │
//!        ┌───┴──────────────────────────────┴───┐
//!        │              chat-relay              │
//!        │  ┌────────────────────────────────┐  │
//!        │  │ ConnectionRegistry             │  │
//!        │  │   room -> [session, session…]  │  │
//!        │  └────────────────────────────────┘  │
//!        │  ┌──────────────┐ ┌───────────────┐  │
//!        │  │ JwtVerifier  │ │ SQLite users/ │  │
//!        │  │              │ │ rooms         │  │
//!        │  └──────────────┘ └───────────────┘  │
//!        └──────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Plain text frames, no envelope:
//! - `{identity} joined room` (to the other members, on admission)
//! - `{identity}: {text}` (to every member, on each inbound frame)
//! - `{identity} left room` (to the remaining members, on disconnect)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
