//! # banter-relay
//!
//! The relay core: who is connected, and what happens to an inbound message.
//!
//! - [`ConnectionRegistry`] — authoritative set of live connections with
//!   lock-isolated broadcast fan-out and slow-client eviction
//! - [`MessageRelay`] — per-message business logic: validation, fan-out,
//!   and a cancellable delayed bot reply
//!
//! Transport-free by construction: the registry sees only per-connection
//! outbound channels, never sockets. The server crate owns the sockets and
//! feeds connect/disconnect/message events into this crate.

#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod registry;
pub mod relay;

pub use connection::Connection;
pub use error::RelayError;
pub use registry::ConnectionRegistry;
pub use relay::{DEFAULT_REPLY_DELAY, MessageRelay, RelayConfig, default_bot_responses};
