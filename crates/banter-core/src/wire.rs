//! JSON wire frames exchanged over a connection.
//!
//! Frames are externally tagged as `{"type": ..., "payload": ...}` with
//! camelCase names throughout. Body validation (non-empty after trim) is the
//! relay's job, not the codec's: any well-formed frame parses.

use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;
use crate::message::{Message, epoch_millis};

/// Frames a client may send to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Submit a chat message body for relay to the other connections.
    SendMessage(SendMessagePayload),
}

/// Payload of [`ClientFrame::SendMessage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Raw message text as typed by the user.
    pub body: String,
}

/// Frames the server may push to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Handshake acknowledgement carrying the assigned connection id.
    Connected(ConnectedPayload),
    /// A relayed chat message (user or bot authored).
    Message(Message),
    /// A per-connection error report; never fatal to the session.
    Error(ErrorPayload),
}

/// Payload of [`ServerFrame::Connected`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    /// Id assigned to this connection for its lifetime.
    pub connection_id: ConnectionId,
    /// Registration time, epoch milliseconds.
    pub timestamp: i64,
}

/// Payload of [`ServerFrame::Error`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Human-readable description of what was rejected.
    pub message: String,
}

impl ServerFrame {
    /// Handshake frame for a freshly registered connection.
    pub fn connected(id: &ConnectionId) -> Self {
        ServerFrame::Connected(ConnectedPayload {
            connection_id: id.clone(),
            timestamp: epoch_millis(),
        })
    }

    /// Error frame with the given description.
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error(ErrorPayload {
            message: message.into(),
        })
    }
}
