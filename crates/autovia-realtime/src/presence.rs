// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded in-memory presence cache.
//!
//! Fed by inbound presence events and read by pure lookups; never
//! authoritative. Bounded so a long-lived session cannot grow without limit:
//! when full, the oldest-inserted entry is evicted first.

use std::collections::{HashMap, VecDeque};

use autovia_core::types::{PresenceKey, UserPresence};
use tracing::debug;

pub struct PresenceCache {
    entries: HashMap<PresenceKey, UserPresence>,
    order: VecDeque<PresenceKey>,
    cap: usize,
}

impl PresenceCache {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// Insert or refresh a presence snapshot, evicting the oldest entry when full.
    pub fn update(&mut self, key: PresenceKey, presence: UserPresence) {
        if self.entries.insert(key.clone(), presence).is_none() {
            if self.entries.len() > self.cap
                && let Some(evicted) = self.order.pop_front()
            {
                self.entries.remove(&evicted);
                debug!(identity = %evicted.identity, "presence cache full, evicted oldest entry");
            }
            self.order.push_back(key);
        }
    }

    pub fn get(&self, key: &PresenceKey) -> Option<UserPresence> {
        self.entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
