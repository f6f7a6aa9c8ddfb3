//! Relay error taxonomy.
//!
//! Nothing here is fatal to the process. Every variant is recovered by
//! skipping the affected unit of work: a duplicate registration closes the
//! new connection, an empty message is answered with an error frame, a
//! failed delivery is dropped for that recipient only, and an unscheduled
//! reply is simply never sent.

use banter_core::ConnectionId;
use thiserror::Error;

/// Errors surfaced by the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The connection id is already registered. Ids are minted fresh per
    /// connection, so this is only reachable when a caller reuses one.
    #[error("connection {id} is already registered")]
    DuplicateConnection {
        /// The id that was registered twice.
        id: ConnectionId,
    },

    /// The message body was empty after trimming. Rejected at the boundary;
    /// nothing is broadcast.
    #[error("message body is empty")]
    EmptyMessage,

    /// Delivery to one recipient failed. Isolated per recipient: the
    /// broadcast continues to the others.
    #[error("delivery to {id} failed: {reason}")]
    Delivery {
        /// The recipient that could not be delivered to.
        id: ConnectionId,
        /// Why the outbound channel refused the message.
        reason: &'static str,
    },

    /// A bot reply could not be scheduled because the relay is shutting
    /// down. Callers log and move on; the triggering message still relays.
    #[error("reply not scheduled: relay is shutting down")]
    Scheduling,
}
