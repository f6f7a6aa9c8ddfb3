//! # banter-core
//!
//! Core domain types for the banter message relay.
//!
//! - Branded identifiers (`conn_*`, `reply_*`) with UUIDv7 payloads
//! - The immutable [`Message`] value relayed between connections
//! - The per-connection lifecycle [`ConnectionState`] machine
//! - JSON wire frames exchanged with clients ([`ClientFrame`], [`ServerFrame`])
//!
//! This crate is transport-free: nothing here knows about sockets, HTTP, or
//! how frames move. The relay and server crates build on these types.

#![deny(unsafe_code)]

pub mod ids;
pub mod message;
pub mod state;
pub mod wire;

pub use ids::{ConnectionId, ReplyId};
pub use message::{BOT_SENDER_ID, Message, Origin, epoch_millis};
pub use state::ConnectionState;
pub use wire::{ClientFrame, ConnectedPayload, ErrorPayload, SendMessagePayload, ServerFrame};
