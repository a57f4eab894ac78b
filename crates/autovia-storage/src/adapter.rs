// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use autovia_config::model::StorageConfig;
use autovia_core::types::{ChatMessage, Conversation, ConversationId, Participant};
use autovia_core::{
    AdapterType, AutoviaError, ConversationStore, HealthStatus, ServiceAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`ConversationStore::initialize`].
pub struct SqliteConversationStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteConversationStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, AutoviaError> {
        self.db.get().ok_or_else(|| AutoviaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl ServiceAdapter for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn initialize(&self) -> Result<(), AutoviaError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| AutoviaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite conversation store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), AutoviaError> {
        self.db()?.close().await
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AutoviaError> {
        queries::conversations::create(self.db()?, conversation).await
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AutoviaError> {
        queries::conversations::find_by_id(self.db()?, id).await
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: &ChatMessage,
    ) -> Result<(), AutoviaError> {
        queries::messages::append(self.db()?, id, message).await
    }

    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, AutoviaError> {
        queries::messages::list(self.db()?, id, limit).await
    }

    async fn mark_read(
        &self,
        id: &ConversationId,
        side: Participant,
    ) -> Result<(), AutoviaError> {
        queries::conversations::mark_read(self.db()?, id, side).await
    }

    async fn flag(&self, id: &ConversationId, reason: &str) -> Result<(), AutoviaError> {
        queries::conversations::flag(self.db()?, id, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autovia_core::types::SenderRole;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            backend: "sqlite".to_string(),
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn implements_service_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("adapter.db");
        let store = SqliteConversationStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Store);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteConversationStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteConversationStore::new(make_config(db_path.to_str().unwrap()));
        assert!(store.health_check().await.is_err());
    }

    #[tokio::test]
    async fn full_conversation_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteConversationStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        let conv = Conversation::new("Jane@Example.com", "lst-9");
        store.create(&conv).await.unwrap();

        let found = store.find_by_id(&conv.id).await.unwrap().unwrap();
        assert_eq!(found.customer_key, "jane_example_com");

        let m1 = ChatMessage::text(SenderRole::Customer, "still for sale?");
        let m2 = ChatMessage::text(SenderRole::Seller, "yes, come by");
        store.append_message(&conv.id, &m1).await.unwrap();
        store.append_message(&conv.id, &m2).await.unwrap();

        let messages = store.messages(&conv.id, None).await.unwrap();
        assert_eq!(messages.len(), 2);

        store.mark_read(&conv.id, Participant::Customer).await.unwrap();
        let updated = store.find_by_id(&conv.id).await.unwrap().unwrap();
        assert!(!updated.customer_unread);

        store.flag(&conv.id, "suspicious pricing").await.unwrap();
        let flagged = store.find_by_id(&conv.id).await.unwrap().unwrap();
        assert!(flagged.flagged);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = SqliteConversationStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
