//! Inbound message handling and the delayed bot reply.
//!
//! One [`MessageRelay`] serves every connection. An inbound body is
//! validated, fanned out through the registry, and answered by a bot
//! message after a configurable delay. Pending replies are real task
//! handles: shutdown cancels them race-free and waits for them to finish,
//! so no reply can fire into a torn-down relay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use banter_core::{ConnectionId, Message, ReplyId};

use crate::error::RelayError;
use crate::registry::ConnectionRegistry;

/// Delay before the bot reply fires when none is configured.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

/// How long `shutdown` waits for cancelled reply tasks to wind down.
const REPLY_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The stock bot response set.
pub fn default_bot_responses() -> Vec<String> {
    [
        "Salut! Cum pot să te ajut?",
        "Bună ziua! Mulțumesc pentru mesaj.",
        "Hey! Sunt bot-ul de test.",
        "Interesant mesaj! Continuă...",
        "Am primit mesajul tău și îl procesez...",
        "Bip bop! Sunt aici să ajut!",
    ]
    .map(str::to_owned)
    .to_vec()
}

/// Tuning knobs for [`MessageRelay`].
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Delay between a user message and its bot reply.
    pub reply_delay: Duration,
    /// Bodies the bot picks from, uniformly at random. Must be non-empty;
    /// an empty list falls back to [`default_bot_responses`].
    pub bot_responses: Vec<String>,
    /// Deliver a sender's message back to itself. Off by default so clients
    /// never need to filter their own echo.
    pub echo_to_sender: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reply_delay: DEFAULT_REPLY_DELAY,
            bot_responses: default_bot_responses(),
            echo_to_sender: false,
        }
    }
}

/// Business logic for inbound messages.
pub struct MessageRelay {
    registry: Arc<ConnectionRegistry>,
    reply_delay: Duration,
    responses: Arc<[String]>,
    echo_to_sender: bool,
    /// Scheduled-but-unfired bot replies.
    pending: Arc<Mutex<HashMap<ReplyId, JoinHandle<()>>>>,
    /// Cancelled exactly once, on shutdown; observed by every pending reply.
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

impl MessageRelay {
    /// Create a relay over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>, config: RelayConfig) -> Self {
        let responses = if config.bot_responses.is_empty() {
            warn!("configured bot response set is empty, using defaults");
            default_bot_responses()
        } else {
            config.bot_responses
        };
        Self {
            registry,
            reply_delay: config.reply_delay,
            responses: responses.into(),
            echo_to_sender: config.echo_to_sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Handle one inbound message body from `sender`.
    ///
    /// Validates the body, broadcasts it to every other connection (the
    /// sender too when `echo_to_sender` is set), and schedules the delayed
    /// bot reply. A reply that cannot be scheduled because the relay is
    /// shutting down is dropped silently; a missed bot reply is not worth
    /// surfacing to the sender.
    pub async fn handle_incoming(&self, sender: &ConnectionId, body: &str) -> Result<(), RelayError> {
        if body.trim().is_empty() {
            counter!("relay_empty_messages_total").increment(1);
            return Err(RelayError::EmptyMessage);
        }

        let message = Message::user(sender, body);
        let exclude = if self.echo_to_sender { None } else { Some(sender) };
        let delivered = self.registry.broadcast(&message, exclude).await;
        counter!("relay_messages_relayed_total").increment(1);
        debug!(sender = %sender, delivered, "relayed user message");

        if let Err(err) = self.schedule_reply() {
            debug!(error = %err, "skipping bot reply");
        }
        Ok(())
    }

    /// Schedule a bot reply to fire after the configured delay.
    fn schedule_reply(&self) -> Result<ReplyId, RelayError> {
        if self.shutting_down.load(Ordering::Relaxed) {
            return Err(RelayError::Scheduling);
        }

        let id = ReplyId::new();
        let reply_id = id.clone();
        let registry = Arc::clone(&self.registry);
        let responses = Arc::clone(&self.responses);
        let pending = Arc::clone(&self.pending);
        let cancel = self.cancel.clone();
        let delay = self.reply_delay;

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    counter!("relay_replies_cancelled_total").increment(1);
                    debug!(reply_id = %reply_id, "bot reply cancelled before firing");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
            // The token may be cancelled in the same instant the timer
            // fires; never broadcast after shutdown.
            if cancel.is_cancelled() {
                counter!("relay_replies_cancelled_total").increment(1);
                debug!(reply_id = %reply_id, "bot reply cancelled at fire time");
                return;
            }

            // Invariant: responses is never empty.
            let Some(body) = responses.choose(&mut rand::rng()) else {
                return;
            };
            let message = Message::bot(body.clone());
            let delivered = registry.broadcast(&message, None).await;
            counter!("relay_replies_sent_total").increment(1);
            debug!(reply_id = %reply_id, delivered, "bot reply broadcast");
            let _ = pending.lock().remove(&reply_id);
        });

        {
            let mut pending = self.pending.lock();
            // Sweep replies that already fired so the map stays bounded.
            pending.retain(|_, handle| !handle.is_finished());
            // A near-zero delay can fire (and self-remove) before this
            // insert runs; a finished handle must not enter the map.
            if !handle.is_finished() {
                let _ = pending.insert(id.clone(), handle);
            }
        }
        counter!("relay_replies_scheduled_total").increment(1);
        debug!(reply_id = %id, delay = ?delay, "scheduled bot reply");
        Ok(id)
    }

    /// Number of scheduled-but-unfired bot replies. Observability only.
    pub fn pending_replies(&self) -> usize {
        self.pending.lock().len()
    }

    /// Shut the relay down.
    ///
    /// Idempotent. Cancels every pending reply and waits (bounded) for the
    /// reply tasks to finish. Messages handled after shutdown are still
    /// relayed; they just schedule no reply.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::Relaxed) {
            return;
        }
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, handle)| handle).collect()
        };
        if handles.is_empty() {
            info!("relay shut down, no pending replies");
            return;
        }

        info!(pending = handles.len(), "relay shutting down, cancelling pending replies");
        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(REPLY_JOIN_TIMEOUT, drain).await.is_err() {
            warn!("timed out waiting for cancelled replies to finish");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use banter_core::BOT_SENDER_ID;
    use tokio::sync::mpsc;
    use tokio::task::yield_now;
    use tokio::time::advance;

    use crate::connection::Connection;

    async fn register(
        registry: &Arc<ConnectionRegistry>,
        id: &str,
    ) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(32);
        let conn = Arc::new(Connection::new(ConnectionId::from_raw(id), tx));
        registry.register(conn).await.unwrap();
        rx
    }

    fn relay_with(config: RelayConfig) -> (Arc<ConnectionRegistry>, MessageRelay) {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = MessageRelay::new(Arc::clone(&registry), config);
        (registry, relay)
    }

    fn parse(raw: &Arc<String>) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    /// Poll the paused runtime until spawned tasks settle.
    async fn settle() {
        for _ in 0..20 {
            yield_now().await;
        }
    }

    // ── validation ──────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx = register(&registry, "conn_a").await;

        let sender = ConnectionId::from_raw("conn_b");
        let err = relay.handle_incoming(&sender, "").await.unwrap_err();
        assert_matches!(err, RelayError::EmptyMessage);
        assert!(rx.try_recv().is_err());
        assert_eq!(relay.pending_replies(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_body_is_rejected() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx = register(&registry, "conn_a").await;

        let sender = ConnectionId::from_raw("conn_b");
        let err = relay.handle_incoming(&sender, "  \t\n  ").await.unwrap_err();
        assert_matches!(err, RelayError::EmptyMessage);
        assert!(rx.try_recv().is_err());
    }

    // ── fan-out ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn relays_to_others_but_not_sender() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_a = register(&registry, "conn_a").await;
        let mut rx_b = register(&registry, "conn_b").await;
        let mut rx_c = register(&registry, "conn_c").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hello").await.unwrap();

        assert!(rx_a.try_recv().is_err(), "sender must not receive its own echo");
        let frame = parse(&rx_b.try_recv().unwrap());
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["payload"]["senderId"], "conn_a");
        assert_eq!(frame["payload"]["body"], "hello");
        assert_eq!(frame["payload"]["origin"], "user");
        assert!(rx_c.try_recv().is_ok());
    }

    #[tokio::test]
    async fn echo_to_sender_restores_legacy_fanout() {
        let config = RelayConfig {
            echo_to_sender: true,
            ..RelayConfig::default()
        };
        let (registry, relay) = relay_with(config);
        let mut rx_a = register(&registry, "conn_a").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "echo me").await.unwrap();

        let frame = parse(&rx_a.try_recv().unwrap());
        assert_eq!(frame["payload"]["body"], "echo me");
    }

    #[tokio::test]
    async fn fifo_per_sender() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "first").await.unwrap();
        relay.handle_incoming(&sender, "second").await.unwrap();

        assert_eq!(parse(&rx_b.try_recv().unwrap())["payload"]["body"], "first");
        assert_eq!(parse(&rx_b.try_recv().unwrap())["payload"]["body"], "second");
    }

    #[tokio::test]
    async fn concurrent_senders_both_relayed() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_c = register(&registry, "conn_c").await;

        let a = ConnectionId::from_raw("conn_a");
        let b = ConnectionId::from_raw("conn_b");
        let (ra, rb) = tokio::join!(
            relay.handle_incoming(&a, "from a"),
            relay.handle_incoming(&b, "from b"),
        );
        ra.unwrap();
        rb.unwrap();

        // No cross-sender ordering guarantee, but both must arrive.
        let bodies: Vec<String> = (0..2)
            .map(|_| parse(&rx_c.try_recv().unwrap())["payload"]["body"].as_str().unwrap().to_owned())
            .collect();
        assert!(bodies.contains(&"from a".to_owned()));
        assert!(bodies.contains(&"from b".to_owned()));
    }

    // ── bot reply scheduling ────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn bot_reply_fires_after_delay_for_everyone() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_a = register(&registry, "conn_a").await;
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap(); // drain the user message

        // Let the reply task register its timer before advancing the clock.
        settle().await;
        advance(DEFAULT_REPLY_DELAY).await;
        settle().await;

        // The reply reaches the original sender too.
        let frame_a = parse(&rx_a.try_recv().unwrap());
        let frame_b = parse(&rx_b.try_recv().unwrap());
        for frame in [&frame_a, &frame_b] {
            assert_eq!(frame["type"], "message");
            assert_eq!(frame["payload"]["senderId"], BOT_SENDER_ID);
            assert_eq!(frame["payload"]["origin"], "bot");
        }
        let body = frame_a["payload"]["body"].as_str().unwrap();
        assert!(default_bot_responses().iter().any(|r| r == body), "unexpected reply: {body}");
    }

    #[tokio::test(start_paused = true)]
    async fn bot_reply_does_not_fire_early() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap();
        settle().await;

        advance(DEFAULT_REPLY_DELAY - Duration::from_millis(1)).await;
        settle().await;
        assert!(rx_b.try_recv().is_err(), "reply fired before the delay elapsed");

        advance(Duration::from_millis(1)).await;
        settle().await;
        let frame = parse(&rx_b.try_recv().unwrap());
        assert_eq!(frame["payload"]["origin"], "bot");
    }

    #[tokio::test(start_paused = true)]
    async fn bot_reply_body_comes_from_configured_set() {
        let config = RelayConfig {
            bot_responses: vec!["the only answer".to_owned()],
            ..RelayConfig::default()
        };
        let (registry, relay) = relay_with(config);
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap();
        settle().await;

        advance(DEFAULT_REPLY_DELAY).await;
        settle().await;
        let frame = parse(&rx_b.try_recv().unwrap());
        assert_eq!(frame["payload"]["body"], "the only answer");
    }

    #[tokio::test(start_paused = true)]
    async fn one_reply_per_inbound_message() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap();
        assert_eq!(relay.pending_replies(), 1);
        settle().await;

        advance(DEFAULT_REPLY_DELAY).await;
        settle().await;
        assert!(rx_b.try_recv().is_ok(), "expected exactly one bot reply");
        assert!(rx_b.try_recv().is_err(), "got more than one bot reply");
        assert_eq!(relay.pending_replies(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_delay_reply_leaves_no_pending_entry() {
        let config = RelayConfig {
            reply_delay: Duration::ZERO,
            ..RelayConfig::default()
        };
        let (registry, relay) = relay_with(config);
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap(); // drain the user message
        let reply = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
            .await
            .expect("bot reply never arrived")
            .unwrap();
        assert_eq!(parse(&reply)["payload"]["origin"], "bot");

        // The fired reply may not linger in the pending map, even when the
        // task finishes before schedule_reply records its handle.
        let mut cleared = false;
        for _ in 0..500 {
            if relay.pending_replies() == 0 {
                cleared = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cleared, "fired reply left an entry in the pending map");
    }

    #[tokio::test]
    async fn empty_response_set_falls_back_to_defaults() {
        let config = RelayConfig {
            bot_responses: Vec::new(),
            ..RelayConfig::default()
        };
        let (_registry, relay) = relay_with(config);
        assert_eq!(relay.responses.len(), default_bot_responses().len());
    }

    // ── shutdown ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_reply() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_b = register(&registry, "conn_b").await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "hi").await.unwrap();
        let _ = rx_b.try_recv().unwrap();
        assert_eq!(relay.pending_replies(), 1);

        relay.shutdown().await;
        assert_eq!(relay.pending_replies(), 0);

        advance(DEFAULT_REPLY_DELAY * 2).await;
        settle().await;
        assert!(rx_b.try_recv().is_err(), "cancelled reply still fired");
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (_registry, relay) = relay_with(RelayConfig::default());
        relay.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn messages_after_shutdown_relay_without_reply() {
        let (registry, relay) = relay_with(RelayConfig::default());
        let mut rx_b = register(&registry, "conn_b").await;

        relay.shutdown().await;

        let sender = ConnectionId::from_raw("conn_a");
        relay.handle_incoming(&sender, "still there?").await.unwrap();

        let frame = parse(&rx_b.try_recv().unwrap());
        assert_eq!(frame["payload"]["body"], "still there?");
        assert_eq!(relay.pending_replies(), 0);

        advance(DEFAULT_REPLY_DELAY * 2).await;
        settle().await;
        assert!(rx_b.try_recv().is_err(), "reply scheduled after shutdown");
    }

    // ── config ──────────────────────────────────────────────────────

    #[test]
    fn default_config_matches_reference_deployment() {
        let config = RelayConfig::default();
        assert_eq!(config.reply_delay, Duration::from_millis(1000));
        assert_eq!(config.bot_responses.len(), 6);
        assert!(!config.echo_to_sender);
    }
}
