// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation persistence for the Autovia service layer.
//!
//! Two interchangeable backends implement `ConversationStore`: WAL-mode
//! SQLite with embedded migrations and a single-writer concurrency model via
//! `tokio-rusqlite`, and a process-local in-memory store for development.
//! The backend is selected once at startup via [`open_store`].

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;

use std::sync::Arc;

use autovia_config::model::StorageConfig;
use autovia_core::{AutoviaError, ConversationStore};
use tracing::info;

pub use adapter::SqliteConversationStore;
pub use database::Database;
pub use memory::MemoryStore;

/// Open and initialize the configured storage backend.
///
/// The strategy is fixed at startup: callers hold the returned trait object
/// and never re-select per call.
pub async fn open_store(
    config: &StorageConfig,
) -> Result<Arc<dyn ConversationStore>, AutoviaError> {
    let store: Arc<dyn ConversationStore> = match config.backend.as_str() {
        "sqlite" => Arc::new(SqliteConversationStore::new(config.clone())),
        "memory" => Arc::new(MemoryStore::new()),
        other => {
            return Err(AutoviaError::Config(format!(
                "unknown storage backend `{other}`"
            )));
        }
    };
    store.initialize().await?;
    info!(backend = %config.backend, "conversation store ready");
    Ok(store)
}
