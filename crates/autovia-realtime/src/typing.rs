// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiry timers for typing indicators.
//!
//! One timer per (conversation, role). Re-arming replaces the previous
//! timer, an explicit stop cancels it, and `clear` aborts everything so
//! `disconnect` leaves no dangling timers.

use std::collections::HashMap;

use autovia_core::types::{ConversationId, SenderRole};
use tokio::task::JoinHandle;

pub type TypingKey = (ConversationId, SenderRole);

#[derive(Default)]
pub struct TypingTimers {
    timers: HashMap<TypingKey, JoinHandle<()>>,
}

impl TypingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an expiry timer, aborting any previous one for the same key.
    pub fn arm(&mut self, key: TypingKey, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel the timer for a key (explicit typing stop).
    pub fn cancel(&mut self, key: &TypingKey) {
        if let Some(handle) = self.timers.remove(key) {
            handle.abort();
        }
    }

    /// Remove a timer entry without aborting -- called by the timer itself
    /// when it fires.
    pub fn complete(&mut self, key: &TypingKey) {
        self.timers.remove(key);
    }

    /// Abort every armed timer.
    pub fn clear(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for TypingTimers {
    fn drop(&mut self) {
        self.clear();
    }
}
