//! Connection liveness supervision.
//!
//! The session's outbound task sends pings; the client's pongs set the
//! connection's alive flag. This watchdog checks and clears the flag once
//! per interval and gives up after enough consecutive silent intervals.

use std::sync::Arc;
use std::time::Duration;

use banter_relay::Connection;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of a heartbeat supervision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client went silent for the full timeout window.
    TimedOut,
    /// Supervision was cancelled, the connection is still considered live.
    Cancelled,
}

/// Supervise `connection` until it times out or `cancel` fires.
///
/// A pong (or any inbound traffic) between two checks counts the interval
/// as alive. The timeout is expressed as consecutive missed intervals, so
/// a late pong only has to land before `timeout / interval` checks pass.
pub async fn run_heartbeat(
    connection: Arc<Connection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let interval_secs = interval.as_secs().max(1);
    let max_missed = u32::try_from((timeout.as_secs() / interval_secs).max(1)).unwrap_or(u32::MAX);

    let mut ticker = tokio::time::interval(interval);
    let mut missed_pongs = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.check_alive() {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    debug!(
                        connection_id = %connection.id,
                        missed_pongs,
                        max_missed,
                        "no pong since last check"
                    );
                    if missed_pongs >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
