// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation buffers of messages awaiting live delivery.
//!
//! Messages land here when the transport is down at send time; they are
//! drained on reconnect. The durable copy is already persisted, so dropping
//! a buffered message only loses its live delivery, not the message.
//! Bounded on both axes (per conversation and number of conversations),
//! oldest dropped first.

use std::collections::{HashMap, VecDeque};

use autovia_core::types::{ChatMessage, ConversationId};
use tracing::warn;

pub struct PendingMessages {
    queues: HashMap<ConversationId, VecDeque<ChatMessage>>,
    order: VecDeque<ConversationId>,
    per_conversation_cap: usize,
    conversations_cap: usize,
}

impl PendingMessages {
    pub fn new(per_conversation_cap: usize, conversations_cap: usize) -> Self {
        Self {
            queues: HashMap::new(),
            order: VecDeque::new(),
            per_conversation_cap: per_conversation_cap.max(1),
            conversations_cap: conversations_cap.max(1),
        }
    }

    /// Buffer a message for later replay.
    pub fn push(&mut self, conversation_id: ConversationId, message: ChatMessage) {
        if !self.queues.contains_key(&conversation_id) {
            if self.queues.len() >= self.conversations_cap
                && let Some(evicted) = self.order.pop_front()
            {
                let dropped = self.queues.remove(&evicted).map(|q| q.len()).unwrap_or(0);
                warn!(
                    conversation_id = %evicted,
                    dropped,
                    "pending buffer limit reached, dropped oldest conversation's buffer"
                );
            }
            self.order.push_back(conversation_id.clone());
        }

        let queue = self.queues.entry(conversation_id.clone()).or_default();
        if queue.len() >= self.per_conversation_cap {
            queue.pop_front();
            warn!(
                conversation_id = %conversation_id,
                "per-conversation pending cap reached, dropped oldest buffered message"
            );
        }
        queue.push_back(message);
    }

    /// Drain every buffer for a replay pass.
    pub fn take_all(&mut self) -> Vec<(ConversationId, Vec<ChatMessage>)> {
        let mut drained = Vec::new();
        for conversation_id in self.order.drain(..) {
            if let Some(queue) = self.queues.remove(&conversation_id) {
                drained.push((conversation_id, queue.into_iter().collect()));
            }
        }
        drained
    }

    /// Buffered message count for one conversation.
    pub fn len_for(&self, conversation_id: &ConversationId) -> usize {
        self.queues.get(conversation_id).map_or(0, VecDeque::len)
    }

    /// Total buffered messages across all conversations.
    pub fn total(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
