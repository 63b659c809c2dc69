//! CLI command implementations.

pub mod account;
pub mod join;
pub mod rooms;
