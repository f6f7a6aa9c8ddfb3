//! Connection lifecycle state machine.
//!
//! The transport drives every connection through
//! `Disconnected → Connecting → Connected → Disconnected`, with
//! `Reconnecting` as a connecting variant entered after an error. The
//! registry only distinguishes connected (registered) from everything else;
//! the table here exists so the session layer rejects and logs impossible
//! transitions instead of silently absorbing them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No live channel. Initial and terminal state.
    Disconnected,
    /// Handshake in progress for a fresh connection attempt.
    Connecting,
    /// Registered and receiving broadcasts.
    Connected,
    /// Handshake in progress after a previous error.
    Reconnecting,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected | Reconnecting | Disconnected)
                | (Connected, Reconnecting | Disconnected)
                | (Reconnecting, Connected | Connecting | Disconnected)
        )
    }

    /// Whether the connection is live from the registry's point of view.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Disconnected));
    }

    #[test]
    fn error_paths_are_legal() {
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connected));
        assert!(Reconnecting.can_transition_to(Disconnected));
    }

    #[test]
    fn skipping_handshake_is_illegal() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Reconnecting));
    }

    #[test]
    fn self_transitions_are_illegal() {
        for state in [Disconnected, Connecting, Connected, Reconnecting] {
            assert!(!state.can_transition_to(state), "self loop allowed: {state}");
        }
    }

    #[test]
    fn connected_cannot_regress_to_connecting() {
        assert!(!Connected.can_transition_to(Connecting));
    }

    #[test]
    fn only_connected_is_live() {
        assert!(Connected.is_connected());
        assert!(!Disconnected.is_connected());
        assert!(!Connecting.is_connected());
        assert!(!Reconnecting.is_connected());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Connected.to_string(), "connected");
        assert_eq!(Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Connected).unwrap(), "\"connected\"");
        let parsed: ConnectionState = serde_json::from_str("\"reconnecting\"").unwrap();
        assert_eq!(parsed, Reconnecting);
    }
}
