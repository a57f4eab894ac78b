// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue task model: deferred, priority-ordered, retryable units of work.

use std::sync::Arc;

use autovia_core::AutoviaError;
use futures::future::BoxFuture;

/// The asynchronous operation wrapped by a queue task.
///
/// Must be re-invocable: the queue calls it once per attempt. Actions speak
/// JSON, matching the JSON-over-HTTP backend the service layer wraps.
pub type ActionFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<serde_json::Value, AutoviaError>> + Send + Sync>;

/// Options accepted by [`crate::RequestQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Dedup/correlation key. Concurrent tasks sharing an id collapse into
    /// one execution. Defaults to a fresh UUID (no dedup).
    pub id: Option<String>,
    /// Higher runs first among ready tasks. Defaults to 0.
    pub priority: i32,
    /// Retry ceiling for transient failures. Defaults to the configured
    /// `default_max_retries`. Set to `Some(0)` for non-idempotent actions.
    pub max_retries: Option<u32>,
}

impl EnqueueOptions {
    /// Options with a dedup id and default priority/retries.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Lifecycle phase of a pending task.
///
/// `queued -> running -> {settled | retry-scheduled -> queued}`. Settled
/// tasks are removed from the pending table, so no phase represents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Queued,
    Running,
    RetryScheduled,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::Queued => write!(f, "queued"),
            TaskPhase::Running => write!(f, "running"),
            TaskPhase::RetryScheduled => write!(f, "retry-scheduled"),
        }
    }
}

/// A task pending in the queue.
pub(crate) struct QueueTask {
    pub id: String,
    pub priority: i32,
    pub max_retries: u32,
    /// Current attempt, starting at 0 and incremented on each retry.
    pub attempt: u32,
    /// Submission sequence number, for FIFO ordering within a priority class.
    pub seq: u64,
    pub action: ActionFn,
}

/// Heap entry for the ready queue.
///
/// Max-heap ordering: higher priority first, then lower submission sequence
/// (FIFO within a priority class).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReadyEntry {
    pub priority: i32,
    pub seq: u64,
    pub task_id: String,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
