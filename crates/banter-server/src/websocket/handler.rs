//! Inbound frame dispatch.
//!
//! Every text frame a session reads lands here: parse it as a
//! [`ClientFrame`], hand the payload to the relay, and report what (if
//! anything) should go back to the sender alone.

use banter_core::{ClientFrame, ConnectionId, ServerFrame};
use banter_relay::MessageRelay;
use metrics::counter;
use tracing::{debug, instrument, warn};

/// Outcome of dispatching one inbound frame.
#[derive(Debug)]
pub struct FrameResult {
    /// A frame to deliver to the sender only, typically an error.
    pub response: Option<ServerFrame>,
    /// Whether the payload was relayed to the registry.
    pub relayed: bool,
}

/// Parse and dispatch one raw text frame from `sender`.
///
/// Malformed frames and rejected payloads never tear down the session;
/// the sender gets an [`ServerFrame::Error`] and the connection stays up.
#[instrument(skip_all, fields(connection_id = %sender))]
pub async fn handle_frame(text: &str, sender: &ConnectionId, relay: &MessageRelay) -> FrameResult {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(err) => {
            counter!("ws_invalid_frames_total").increment(1);
            warn!(error = %err, "received unparseable frame");
            return FrameResult {
                response: Some(ServerFrame::error(format!("invalid frame: {err}"))),
                relayed: false,
            };
        }
    };

    match frame {
        ClientFrame::SendMessage(payload) => {
            match relay.handle_incoming(sender, &payload.body).await {
                Ok(()) => FrameResult {
                    response: None,
                    relayed: true,
                },
                Err(err) => {
                    debug!(error = %err, "relay rejected message");
                    FrameResult {
                        response: Some(ServerFrame::error(err.to_string())),
                        relayed: false,
                    }
                }
            }
        }
    }
}
