//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a config file path is given, overlay its values (missing keys keep
//!    their defaults)
//! 3. Apply `BANTER_*` environment variable overrides (highest priority)
//!
//! Environment overrides use strict parsing: integers must be valid and in
//! range, booleans accept `true`/`1`/`yes`/`on` and friends. Invalid values
//! are logged and ignored so a typo never silently changes the port to 0.

use std::path::Path;
use std::time::Duration;

use banter_relay::{RelayConfig, default_bot_responses};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Error loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON or has wrongly typed fields.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `3001`, `0` for auto-assign).
    pub port: u16,
    /// Delay before the bot reply fires, in milliseconds.
    pub reply_delay_ms: u64,
    /// Bodies the bot reply picks from. An empty list falls back to the
    /// built-in set.
    pub bot_responses: Vec<String>,
    /// Deliver a sender's message back to itself.
    pub echo_to_sender: bool,
    /// Interval between server-initiated Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a client that has shown no signs of life for this long, in
    /// seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound queue capacity, in messages.
    pub send_queue_capacity: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long graceful shutdown waits for tasks before giving up, in
    /// seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            reply_delay_ms: 1000,
            bot_responses: default_bot_responses(),
            echo_to_sender: false,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_capacity: 1024,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration, overlaying the file at `path` (if given) and then
    /// `BANTER_*` environment variables over the defaults.
    ///
    /// A path that cannot be read or parsed is an error; the caller asked
    /// for that file explicitly. `None` skips straight to defaults + env.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                debug!(?path, "loading config from file");
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Address string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bot reply delay as a [`Duration`].
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Heartbeat ping interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Heartbeat liveness timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Graceful shutdown budget as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// The relay-facing slice of this configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            reply_delay: self.reply_delay(),
            bot_responses: self.bot_responses.clone(),
            echo_to_sender: self.echo_to_sender,
        }
    }
}

/// Apply `BANTER_*` environment variable overrides.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    if let Some(v) = read_env_string("BANTER_HOST") {
        config.host = v;
    }
    if let Some(v) = read_env_u16("BANTER_PORT", 0, 65535) {
        config.port = v;
    }
    if let Some(v) = read_env_u64("BANTER_REPLY_DELAY_MS", 0, 3_600_000) {
        config.reply_delay_ms = v;
    }
    if let Some(v) = read_env_bool("BANTER_ECHO_TO_SENDER") {
        config.echo_to_sender = v;
    }
    if let Some(v) = read_env_u64("BANTER_HEARTBEAT_INTERVAL_SECS", 1, 3600) {
        config.heartbeat_interval_secs = v;
    }
    if let Some(v) = read_env_u64("BANTER_HEARTBEAT_TIMEOUT_SECS", 1, 86_400) {
        config.heartbeat_timeout_secs = v;
    }
    if let Some(v) = read_env_usize("BANTER_SEND_QUEUE_CAPACITY", 1, 1_000_000) {
        config.send_queue_capacity = v;
    }
    if let Some(v) = read_env_usize("BANTER_MAX_MESSAGE_SIZE", 1024, 64 * 1024 * 1024) {
        config.max_message_size = v;
    }
    if let Some(v) = read_env_u64("BANTER_SHUTDOWN_TIMEOUT_SECS", 1, 600) {
        config.shutdown_timeout_secs = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
