// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `autovia serve` command implementation.
//!
//! Composition root for the service: opens the configured conversation
//! store, builds the request queue and the realtime chat session, probes
//! the marketplace backend, and runs until a shutdown signal arrives. All
//! components are explicitly constructed, owned instances -- no module
//! singletons -- so teardown is a plain sequence of shutdown calls.

use std::sync::Arc;
use std::time::Duration;

use autovia_config::AutoviaConfig;
use autovia_core::types::SenderRole;
use autovia_core::{AutoviaError, ServiceAdapter, Transport};
use autovia_queue::{ApiClient, EnqueueOptions, RequestQueue};
use autovia_realtime::{ChatSession, OfflineTransport, WsTransport};
use tracing::{info, warn};

use crate::shutdown;

/// How long shutdown waits for pending queue work to settle.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `autovia serve` command.
pub async fn run_serve(config: AutoviaConfig) -> Result<(), AutoviaError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting autovia serve");

    // Storage backend, selected once from configuration.
    let store = autovia_storage::open_store(&config.storage).await?;

    // Outbound request queue and its HTTP client.
    let queue = RequestQueue::new(config.queue.clone());
    let api = ApiClient::new(
        &config.api,
        Duration::from_secs(config.queue.request_timeout_secs),
    )?;

    // Live transport: WebSocket when configured, otherwise the offline
    // transport (the session runs persistence-only).
    let transport: Arc<dyn Transport> = if config.realtime.ws_url.is_some() {
        Arc::new(WsTransport::new(&config.realtime)?)
    } else {
        info!("realtime.ws_url not set, chat runs in persistence-only mode");
        Arc::new(OfflineTransport::new())
    };

    let session = ChatSession::new(Arc::clone(&store), transport, config.realtime.clone());
    // A failed transport is a degraded success by design; serve never aborts
    // on it.
    session.connect(&config.service.name, SenderRole::System).await?;

    // One-shot backend reachability probe through the queue (no retries --
    // this is informational, not load-bearing).
    probe_backend(&queue, api.clone()).await;

    let cancel = shutdown::install_signal_handler();
    info!("autovia service ready");

    cancel.cancelled().await;
    info!("shutting down");

    session.disconnect().await;
    shutdown::drain_queue(&queue, DRAIN_TIMEOUT).await;
    queue.shutdown().await;
    store.shutdown().await?;

    info!("autovia stopped");
    Ok(())
}

/// Enqueue a single health probe against the marketplace backend.
async fn probe_backend(queue: &RequestQueue, api: ApiClient) {
    let result = queue
        .enqueue(
            move || {
                let api = api.clone();
                async move { api.get_json("/health").await }
            },
            EnqueueOptions {
                id: Some("startup-health-probe".into()),
                max_retries: Some(0),
                ..EnqueueOptions::default()
            },
        )
        .await;

    match result {
        Ok(_) => info!("marketplace backend reachable"),
        Err(e) => warn!(error = %e, "marketplace backend probe failed (continuing)"),
    }
}

/// Initialize the tracing subscriber from config, honoring `RUST_LOG`.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
