//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Active registered connections (gauge).
pub const RELAY_CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// User messages relayed total (counter).
pub const RELAY_MESSAGES_RELAYED_TOTAL: &str = "relay_messages_relayed_total";
/// Empty message bodies rejected total (counter).
pub const RELAY_EMPTY_MESSAGES_TOTAL: &str = "relay_empty_messages_total";
/// Broadcast deliveries dropped total (counter).
pub const RELAY_BROADCAST_DROPS_TOTAL: &str = "relay_broadcast_drops_total";
/// Bot replies scheduled total (counter).
pub const RELAY_REPLIES_SCHEDULED_TOTAL: &str = "relay_replies_scheduled_total";
/// Bot replies cancelled by shutdown total (counter).
pub const RELAY_REPLIES_CANCELLED_TOTAL: &str = "relay_replies_cancelled_total";
/// Bot replies broadcast total (counter).
pub const RELAY_REPLIES_SENT_TOTAL: &str = "relay_replies_sent_total";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Inbound frames that failed to parse total (counter).
pub const WS_INVALID_FRAMES_TOTAL: &str = "ws_invalid_frames_total";
/// Connections closed by heartbeat timeout total (counter).
pub const WS_HEARTBEAT_TIMEOUTS_TOTAL: &str = "ws_heartbeat_timeouts_total";
