// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Autovia service layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Autovia configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutoviaConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Outbound request queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Realtime chat session settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Conversation storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Marketplace API backend settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "autovia".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Outbound request queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of actions in flight at once.
    ///
    /// The queue is a deliberate backpressure mechanism against a
    /// rate-limited backend; widen this only with care.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Base backoff delay in milliseconds; attempt N waits `base * 2^N`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Hard cap on a single backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Retry ceiling used when the caller does not specify one.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Per-attempt timeout in seconds for queued actions.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            default_max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    8
}

/// Realtime chat session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// WebSocket endpoint of the realtime backend. `None` leaves the session
    /// permanently degraded (persistence only), which is a supported mode.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// How long `join_conversation` waits for a connection before giving up.
    #[serde(default = "default_join_wait_secs")]
    pub join_wait_secs: u64,

    /// Seconds after which an unclosed typing indicator auto-expires.
    #[serde(default = "default_typing_expiry_secs")]
    pub typing_expiry_secs: u64,

    /// Maximum pending (undelivered) messages buffered per conversation.
    #[serde(default = "default_pending_messages_cap")]
    pub pending_messages_cap: usize,

    /// Maximum number of conversations with pending buffers.
    #[serde(default = "default_pending_conversations_cap")]
    pub pending_conversations_cap: usize,

    /// Maximum entries in the presence cache.
    #[serde(default = "default_presence_cap")]
    pub presence_cap: usize,

    /// Maximum transport reconnection attempts before staying degraded.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Base reconnection delay in milliseconds (doubles per attempt).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            join_wait_secs: default_join_wait_secs(),
            typing_expiry_secs: default_typing_expiry_secs(),
            pending_messages_cap: default_pending_messages_cap(),
            pending_conversations_cap: default_pending_conversations_cap(),
            presence_cap: default_presence_cap(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
        }
    }
}

fn default_join_wait_secs() -> u64 {
    5
}

fn default_typing_expiry_secs() -> u64 {
    4
}

fn default_pending_messages_cap() -> usize {
    64
}

fn default_pending_conversations_cap() -> usize {
    256
}

fn default_presence_cap() -> usize {
    512
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

/// Conversation storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend to use: `sqlite` (durable) or `memory` (development).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Path to the SQLite database file (ignored by the memory backend).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Whether to enable WAL journal mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_database_path() -> String {
    "autovia.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Marketplace API backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the JSON-over-HTTP marketplace backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
