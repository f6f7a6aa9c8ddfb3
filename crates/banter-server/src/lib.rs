//! # banter-server
//!
//! Axum HTTP + `WebSocket` front end for the relay.
//!
//! - `/ws` gateway: session lifecycle, heartbeat, frame dispatch
//! - `/health` and `/metrics` endpoints
//! - Configuration from file + `BANTER_*` environment overrides
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
