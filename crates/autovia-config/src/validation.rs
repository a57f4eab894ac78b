// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as known backend names, ordered backoff bounds, and
//! non-zero timeouts.

use crate::diagnostic::ConfigError;
use crate::model::AutoviaConfig;

/// Backends the storage layer knows how to open.
pub const KNOWN_BACKENDS: &[&str] = &["sqlite", "memory"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &AutoviaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !KNOWN_BACKENDS.contains(&config.storage.backend.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "storage.backend `{}` is not supported (expected one of: {})",
                config.storage.backend,
                KNOWN_BACKENDS.join(", ")
            ),
        });
    }

    if config.storage.backend == "sqlite" && config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty for the sqlite backend"
                .to_string(),
        });
    }

    if config.queue.max_concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.max_concurrency must be at least 1".to_string(),
        });
    }

    if config.queue.base_delay_ms > config.queue.max_delay_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.base_delay_ms ({}) must not exceed queue.max_delay_ms ({})",
                config.queue.base_delay_ms, config.queue.max_delay_ms
            ),
        });
    }

    if config.queue.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.request_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.realtime.typing_expiry_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "realtime.typing_expiry_secs must be at least 1".to_string(),
        });
    }

    if config.realtime.pending_messages_cap == 0
        || config.realtime.pending_conversations_cap == 0
        || config.realtime.presence_cap == 0
    {
        errors.push(ConfigError::Validation {
            message: "realtime caps (pending_messages_cap, pending_conversations_cap, presence_cap) must be at least 1"
                .to_string(),
        });
    }

    if let Some(ref url) = config.realtime.ws_url
        && !(url.starts_with("ws://") || url.starts_with("wss://"))
    {
        errors.push(ConfigError::Validation {
            message: format!("realtime.ws_url `{url}` must start with ws:// or wss://"),
        });
    }

    if !(config.api.base_url.starts_with("http://") || config.api.base_url.starts_with("https://"))
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "api.base_url `{}` must start with http:// or https://",
                config.api.base_url
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
