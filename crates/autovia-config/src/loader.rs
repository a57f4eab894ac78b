// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./autovia.toml` > `~/.config/autovia/autovia.toml` > `/etc/autovia/autovia.toml`
//! with environment variable overrides via `AUTOVIA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::AutoviaConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/autovia/autovia.toml` (system-wide)
/// 3. `~/.config/autovia/autovia.toml` (user XDG config)
/// 4. `./autovia.toml` (local directory)
/// 5. `AUTOVIA_*` environment variables
pub fn load_config() -> Result<AutoviaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<AutoviaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutoviaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AutoviaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AutoviaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AutoviaConfig::default()))
        .merge(Toml::file("/etc/autovia/autovia.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("autovia/autovia.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("autovia.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `AUTOVIA_QUEUE_MAX_CONCURRENCY` must map
/// to `queue.max_concurrency`, not `queue.max.concurrency`.
fn env_provider() -> Env {
    Env::prefixed("AUTOVIA_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: AUTOVIA_STORAGE_DATABASE_PATH -> "storage_database_path"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("realtime_", "realtime.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("api_", "api.", 1);
        mapped.into()
    })
}
