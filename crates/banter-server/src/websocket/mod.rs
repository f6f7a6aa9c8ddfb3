//! WebSocket session handling: frame dispatch, liveness, per-connection loop.

pub mod handler;
pub mod heartbeat;
pub mod session;
