// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store wrapper with scriptable failures.
//!
//! Wraps the in-memory store and fails the next N operations with a
//! transient storage error, for exercising the paths where durable
//! persistence itself is unavailable.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use autovia_core::types::{ChatMessage, Conversation, ConversationId, Participant};
use autovia_core::{
    AdapterType, AutoviaError, ConversationStore, HealthStatus, ServiceAdapter,
};
use autovia_storage::MemoryStore;

/// Memory-backed store that can be told to fail upcoming writes.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failures_remaining: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` append operations with a transient storage error.
    pub fn fail_next_appends(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ServiceAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn initialize(&self) -> Result<(), AutoviaError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), AutoviaError> {
        self.inner.close().await
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AutoviaError> {
        self.inner.create(conversation).await
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AutoviaError> {
        self.inner.find_by_id(id).await
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: &ChatMessage,
    ) -> Result<(), AutoviaError> {
        if self.take_failure() {
            return Err(AutoviaError::Storage {
                source: "scripted append failure".into(),
            });
        }
        self.inner.append_message(id, message).await
    }

    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, AutoviaError> {
        self.inner.messages(id, limit).await
    }

    async fn mark_read(
        &self,
        id: &ConversationId,
        side: Participant,
    ) -> Result<(), AutoviaError> {
        self.inner.mark_read(id, side).await
    }

    async fn flag(&self, id: &ConversationId, reason: &str) -> Result<(), AutoviaError> {
        self.inner.flag(id, reason).await
    }
}
