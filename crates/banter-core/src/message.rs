//! The relayed chat message value.
//!
//! A [`Message`] is constructed once, broadcast, and dropped. It is never
//! persisted and never mutated after construction. Timestamps are epoch
//! milliseconds, matching what clients render directly.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ConnectionId;

/// Sender id carried by bot-authored messages.
///
/// Not a real connection id: no connection with this id is ever registered,
/// so clients can key "is this mine" checks off their own id safely.
pub const BOT_SENDER_ID: &str = "SERVER_BOT";

/// Current time as epoch milliseconds.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// A connected client.
    User,
    /// The automated responder.
    Bot,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::User => f.write_str("user"),
            Origin::Bot => f.write_str("bot"),
        }
    }
}

/// A single chat message as delivered to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Connection id of the author, or [`BOT_SENDER_ID`].
    pub sender_id: String,
    /// Message text. Validated non-empty (after trim) by the relay.
    pub body: String,
    /// Construction time, epoch milliseconds.
    pub timestamp: i64,
    /// Author kind.
    pub origin: Origin,
}

impl Message {
    /// Build a user message stamped with the current time.
    pub fn user(sender: &ConnectionId, body: impl Into<String>) -> Self {
        Self {
            sender_id: sender.to_string(),
            body: body.into(),
            timestamp: epoch_millis(),
            origin: Origin::User,
        }
    }

    /// Build a bot message stamped with the current time.
    pub fn bot(body: impl Into<String>) -> Self {
        Self {
            sender_id: BOT_SENDER_ID.to_owned(),
            body: body.into(),
            timestamp: epoch_millis(),
            origin: Origin::Bot,
        }
    }
}
