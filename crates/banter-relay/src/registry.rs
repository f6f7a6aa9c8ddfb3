//! Message fan-out to registered connections.
//!
//! The registry is the single authority on who is connected. Mutation and
//! broadcast enumeration are mutually exclusive through the inner `RwLock`;
//! delivery itself happens after the recipient snapshot is taken, so one
//! slow recipient can never stall registration, unregistration, or delivery
//! to the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use banter_core::{ConnectionId, Message, ServerFrame};

use crate::connection::Connection;
use crate::error::RelayError;

/// Maximum total lifetime message drops before forcibly unregistering a
/// slow connection.
const MAX_TOTAL_DROPS: u64 = 100;

/// Authoritative set of live connections.
pub struct ConnectionRegistry {
    /// Registered connections indexed by connection id.
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Atomic counter tracking registrations (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection.
    ///
    /// Fails with [`RelayError::DuplicateConnection`] if the id is already
    /// present; the existing connection is left untouched. Ids are minted
    /// fresh per connection, so a duplicate indicates a transport bug.
    pub async fn register(&self, connection: Arc<Connection>) -> Result<(), RelayError> {
        let mut conns = self.connections.write().await;
        if conns.contains_key(&connection.id) {
            return Err(RelayError::DuplicateConnection {
                id: connection.id.clone(),
            });
        }
        let _ = conns.insert(connection.id.clone(), connection);
        let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        gauge!("relay_connections_active").increment(1.0);
        Ok(())
    }

    /// Unregister a connection by id.
    ///
    /// A no-op returning `None` if the id is absent: disconnects may race
    /// relay shutdown and both sides are allowed to win.
    pub async fn unregister(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut conns = self.connections.write().await;
        let removed = conns.remove(id);
        if removed.is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            gauge!("relay_connections_active").decrement(1.0);
        }
        removed
    }

    /// Broadcast a message to every registered connection except `exclude`.
    ///
    /// The message is serialized once and shared by `Arc` across all
    /// recipients, so every delivery is byte-identical. The recipient set is
    /// snapshotted under the read lock and delivery happens after the lock
    /// is released. Per-recipient failures are logged and isolated;
    /// connections past the drop threshold are unregistered afterwards.
    ///
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, message: &Message, exclude: Option<&ConnectionId>) -> usize {
        let json = match serde_json::to_string(&ServerFrame::Message(message.clone())) {
            Ok(j) => Arc::new(j),
            Err(err) => {
                warn!(origin = %message.origin, error = %err, "failed to serialize message");
                return 0;
            }
        };

        let recipients: Vec<Arc<Connection>> = {
            let conns = self.connections.read().await;
            conns
                .values()
                .filter(|c| Some(&c.id) != exclude)
                .cloned()
                .collect()
        };

        let mut delivered = 0usize;
        let mut to_remove = Vec::new();
        for conn in &recipients {
            match conn.send(Arc::clone(&json)) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    counter!("relay_broadcast_drops_total").increment(1);
                    let drops = conn.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(conn_id = %conn.id, drops, "unregistering slow connection");
                        to_remove.push(conn.id.clone());
                    } else {
                        warn!(conn_id = %conn.id, error = %err, total_drops = drops, "failed to deliver message");
                    }
                }
            }
        }
        debug!(
            origin = %message.origin,
            recipients = recipients.len(),
            delivered,
            "broadcast message"
        );

        if !to_remove.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &to_remove {
                if conns.remove(id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                    gauge!("relay_connections_active").decrement(1.0);
                }
            }
        }
        delivered
    }

    /// Number of registered connections.
    pub fn count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
