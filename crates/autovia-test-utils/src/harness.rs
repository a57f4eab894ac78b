// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete service stack with an in-memory store,
//! a mock transport, a chat session, and a request queue, all sized with
//! test-friendly timings. Tests are independent: each harness owns its own
//! instances, never module-level singletons.

use std::sync::Arc;

use autovia_config::model::{QueueConfig, RealtimeConfig};
use autovia_core::types::{ChatMessage, Conversation, SenderRole};
use autovia_core::{AutoviaError, ConversationStore};
use autovia_queue::RequestQueue;
use autovia_realtime::ChatSession;
use autovia_storage::MemoryStore;

use crate::mock_transport::MockTransport;

/// Builder for creating isolated test environments.
pub struct TestHarnessBuilder {
    queue_config: QueueConfig,
    realtime_config: RealtimeConfig,
    fail_connect: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            queue_config: QueueConfig {
                max_concurrency: 1,
                base_delay_ms: 10,
                max_delay_ms: 200,
                default_max_retries: 3,
                request_timeout_secs: 8,
            },
            realtime_config: RealtimeConfig {
                join_wait_secs: 1,
                typing_expiry_secs: 1,
                ..RealtimeConfig::default()
            },
            fail_connect: false,
        }
    }

    /// Override the queue configuration.
    pub fn with_queue_config(mut self, config: QueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    /// Override the realtime configuration.
    pub fn with_realtime_config(mut self, config: RealtimeConfig) -> Self {
        self.realtime_config = config;
        self
    }

    /// Make the mock transport refuse connections (degraded-mode testing).
    pub fn with_failing_transport(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Build the harness.
    pub fn build(self) -> TestHarness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::new());
        if self.fail_connect {
            transport.set_fail_connect(true);
        }

        let session = ChatSession::new(
            Arc::clone(&store) as Arc<dyn ConversationStore>,
            Arc::clone(&transport) as Arc<dyn autovia_core::Transport>,
            self.realtime_config,
        );
        let queue = RequestQueue::new(self.queue_config);

        TestHarness {
            store,
            transport,
            session,
            queue,
        }
    }
}

/// A complete test environment with mock backends.
pub struct TestHarness {
    /// In-memory conversation store.
    pub store: Arc<MemoryStore>,
    /// Scriptable mock transport.
    pub transport: Arc<MockTransport>,
    /// Chat session wired to the store and transport above.
    pub session: ChatSession,
    /// Request queue with fast test timings.
    pub queue: RequestQueue,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Create and persist a conversation, returning it.
    pub async fn seed_conversation(
        &self,
        customer_email: &str,
        listing_id: &str,
    ) -> Result<Conversation, AutoviaError> {
        let conversation = Conversation::new(customer_email, listing_id);
        self.store.create(&conversation).await?;
        Ok(conversation)
    }

    /// Convenience: a plain customer text message.
    pub fn customer_message(&self, text: &str) -> ChatMessage {
        ChatMessage::text(SenderRole::Customer, text)
    }
}
