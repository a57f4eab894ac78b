// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `autovia check` command implementation.
//!
//! The configuration was already loaded and validated by `main`; this prints
//! a human-readable summary of what `serve` would run with.

use autovia_config::AutoviaConfig;

pub fn run_check(config: &AutoviaConfig) {
    println!("configuration ok");
    println!();
    println!("service:  {} (log level {})", config.service.name, config.service.log_level);
    println!(
        "queue:    concurrency {}, backoff {}ms..{}ms, {} retries, {}s timeout",
        config.queue.max_concurrency,
        config.queue.base_delay_ms,
        config.queue.max_delay_ms,
        config.queue.default_max_retries,
        config.queue.request_timeout_secs,
    );
    match &config.realtime.ws_url {
        Some(url) => println!("realtime: {url}"),
        None => println!("realtime: not configured (persistence-only mode)"),
    }
    match config.storage.backend.as_str() {
        "sqlite" => println!("storage:  sqlite at {}", config.storage.database_path),
        other => println!("storage:  {other}"),
    }
    println!("api:      {}", config.api.base_url);
}
