//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use banter_core::{ConnectionId, ConnectionState, ServerFrame};
use banter_relay::Connection;

use super::handler::handle_frame;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::server::AppState;

/// Bound on waiting for the forwarder to flush its close frame at teardown.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and sends the `connected` greeting
/// 2. Dispatches incoming text frames to the relay
/// 3. Forwards outbound broadcasts via the send channel, with periodic pings
/// 4. Supervises liveness and cancels the session for unresponsive clients
/// 5. Cleans up on disconnect
#[instrument(skip_all, fields(connection_id = %connection_id))]
pub async fn run_ws_session(ws: WebSocket, connection_id: ConnectionId, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Create the connection handle and its outbound channel
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(Connection::new(connection_id, send_tx));

    if let Err(err) = state.registry.register(Arc::clone(&connection)).await {
        warn!(error = %err, "registration rejected, closing socket");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }
    let _ = connection.transition(ConnectionState::Connecting);

    info!("client connected");
    counter!("ws_connections_total").increment(1);

    // The greeting goes out before the forwarder spawns, so it is always
    // the first frame on the wire.
    if let Ok(json) = serde_json::to_string(&ServerFrame::connected(&connection.id)) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }
    let _ = connection.transition(ConnectionState::Connected);

    // Cancelled by server shutdown (parent) or heartbeat timeout (here).
    let session_token = state.shutdown.token().child_token();

    // Spawn outbound forwarder with periodic Ping frames.
    let ping_every = state.config.heartbeat_interval();
    let outbound_token = session_token.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Spawn the liveness watchdog. A timeout cancels the session token,
    // which unblocks the inbound loop below.
    let watchdog_conn = Arc::clone(&connection);
    let watchdog_token = session_token.clone();
    let heartbeat_interval = state.config.heartbeat_interval();
    let heartbeat_timeout = state.config.heartbeat_timeout();
    let watchdog = tokio::spawn(async move {
        let result = run_heartbeat(
            Arc::clone(&watchdog_conn),
            heartbeat_interval,
            heartbeat_timeout,
            watchdog_token.clone(),
        )
        .await;
        if result == HeartbeatResult::TimedOut {
            counter!("ws_heartbeat_timeouts_total").increment(1);
            warn!(
                idle = ?watchdog_conn.last_pong_elapsed(),
                "client unresponsive, closing session"
            );
            watchdog_token.cancel();
        }
    });

    // Process incoming messages until the client leaves or the session
    // is cancelled.
    loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            () = session_token.cancelled() => break,
        };
        let Some(Ok(msg)) = next else { break };
        // Any well-formed inbound frame counts as liveness, not just pongs.
        connection.mark_alive();

        // Extract text from either Text or Binary frames
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_string())
                } else {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => None,
        };

        let Some(text) = text else { continue };

        let result = handle_frame(&text, &connection.id, &state.relay).await;
        if let Some(frame) = result.response {
            if let Err(err) = connection.send_frame(&frame) {
                debug!(error = %err, "failed to enqueue response frame");
            }
        }
    }

    // Clean up
    info!("client disconnected");
    counter!("ws_disconnections_total").increment(1);
    histogram!("ws_connection_duration_seconds").record(connection.age().as_secs_f64());
    session_token.cancel();
    // The forwarder answers the cancel with a close frame; give it a bounded
    // window to flush before the socket drops.
    let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut outbound).await;
    outbound.abort();
    watchdog.abort();
    let _ = connection.transition(ConnectionState::Disconnected);
    let _ = state.registry.unregister(&connection.id).await;
}
