// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation store for development and tests.
//!
//! Mirrors the SQLite backend's observable behavior exactly (same unread
//! semantics, same `NotFound` cases) so code written against the trait works
//! unchanged in either mode. Nothing survives process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use autovia_core::types::{ChatMessage, Conversation, ConversationId, Participant, SenderRole};
use autovia_core::{
    AdapterType, AutoviaError, ConversationStore, HealthStatus, ServiceAdapter,
};

struct StoredConversation {
    conversation: Conversation,
    messages: Vec<ChatMessage>,
}

/// Development-mode conversation store backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, StoredConversation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations held (test helper).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the store holds no conversations.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl ServiceAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        debug!("memory store shutdown (contents discarded)");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn initialize(&self) -> Result<(), AutoviaError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AutoviaError> {
        Ok(())
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AutoviaError> {
        let mut inner = self.inner.lock().await;
        let key = conversation.id.as_str().to_string();
        if inner.contains_key(&key) {
            return Err(AutoviaError::Storage {
                source: format!("conversation already exists: {key}").into(),
            });
        }
        inner.insert(
            key,
            StoredConversation {
                conversation: conversation.clone(),
                messages: Vec::new(),
            },
        );
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AutoviaError> {
        let inner = self.inner.lock().await;
        Ok(inner.get(id.as_str()).map(|s| s.conversation.clone()))
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: &ChatMessage,
    ) -> Result<(), AutoviaError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(id.as_str()).ok_or_else(|| AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        })?;

        stored.messages.push(message.clone());
        stored.conversation.last_message_at = message.sent_at.clone();
        match message.sender {
            SenderRole::Customer => stored.conversation.seller_unread = true,
            SenderRole::Seller => stored.conversation.customer_unread = true,
            SenderRole::System => {}
        }
        Ok(())
    }

    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, AutoviaError> {
        let inner = self.inner.lock().await;
        let Some(stored) = inner.get(id.as_str()) else {
            return Ok(Vec::new());
        };
        let mut messages = stored.messages.clone();
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        if let Some(lim) = limit {
            messages.truncate(lim.max(0) as usize);
        }
        Ok(messages)
    }

    async fn mark_read(
        &self,
        id: &ConversationId,
        side: Participant,
    ) -> Result<(), AutoviaError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(id.as_str()).ok_or_else(|| AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        })?;

        let other_sender = match side {
            Participant::Customer => {
                stored.conversation.customer_unread = false;
                SenderRole::Seller
            }
            Participant::Seller => {
                stored.conversation.seller_unread = false;
                SenderRole::Customer
            }
        };
        for message in &mut stored.messages {
            if message.sender == other_sender {
                message.is_read = true;
            }
        }
        Ok(())
    }

    async fn flag(&self, id: &ConversationId, reason: &str) -> Result<(), AutoviaError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.get_mut(id.as_str()).ok_or_else(|| AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        })?;
        stored.conversation.flagged = true;
        stored.conversation.flag_reason = Some(reason.to_string());
        Ok(())
    }
}
