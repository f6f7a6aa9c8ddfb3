//! Per-connection relay-side state.
//!
//! A [`Connection`] is the registry's handle to one client: the outbound
//! channel plus liveness bookkeeping. The socket itself lives in the server
//! crate; its write task owns the receiving end of `tx`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use banter_core::{ConnectionId, ConnectionState, ServerFrame};

use crate::error::RelayError;

/// One registered client connection.
pub struct Connection {
    /// Unique connection id, minted at transport connect.
    pub id: ConnectionId,
    /// Send channel to the connection's socket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has shown signs of life since the last check.
    pub is_alive: AtomicBool,
    /// When the last pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
    /// Lifecycle state; transitions are validated against the state table.
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Create a new connection handle in the [`ConnectionState::Disconnected`]
    /// state. The session layer drives it through `Connecting` to `Connected`.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Enqueue a serialized frame for this connection's write task.
    ///
    /// Never blocks. A full or closed channel fails with
    /// [`RelayError::Delivery`] and increments the dropped counter; the
    /// caller decides whether the connection is worth keeping.
    pub fn send(&self, message: Arc<String>) -> Result<(), RelayError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                let reason = match err {
                    TrySendError::Full(_) => "channel full",
                    TrySendError::Closed(_) => "channel closed",
                };
                Err(RelayError::Delivery {
                    id: self.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Serialize a frame and enqueue it for this connection only.
    pub fn send_frame(&self, frame: &ServerFrame) -> Result<(), RelayError> {
        match serde_json::to_string(frame) {
            Ok(json) => self.send(Arc::new(json)),
            Err(err) => {
                warn!(conn_id = %self.id, error = %err, "failed to serialize frame");
                Err(RelayError::Delivery {
                    id: self.id.clone(),
                    reason: "serialization failed",
                })
            }
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or inbound traffic).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat supervision.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Attempt a lifecycle transition.
    ///
    /// Illegal transitions are rejected, logged, and leave the state
    /// unchanged. Returns whether the transition was applied.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            debug!(conn_id = %self.id, from = %*state, to = %next, "connection state transition");
            *state = next;
            true
        } else {
            warn!(conn_id = %self.id, from = %*state, to = %next, "rejected connection state transition");
            false
        }
    }
}
