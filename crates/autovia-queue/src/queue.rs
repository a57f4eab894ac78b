// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound request queue.
//!
//! Serializes network calls from a single process so a burst of UI-triggered
//! requests does not overwhelm a rate-limited backend. Among ready tasks,
//! strictly higher priority runs first, FIFO within a priority class. Tasks
//! sharing a dedup id collapse into one execution whose result fans out to
//! every caller. Transient failures retry with exponential backoff; 429/503
//! surface immediately so the caller can decide on a fallback.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use autovia_config::model::QueueConfig;
use autovia_core::AutoviaError;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::backoff_delay;
use crate::task::{ActionFn, EnqueueOptions, QueueTask, ReadyEntry, TaskPhase};

/// Handle to the request queue. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    cancel: CancellationToken,
}

/// A task pending in the queue, together with its attached waiters.
struct PendingEntry {
    task: QueueTask,
    phase: TaskPhase,
    waiters: Vec<oneshot::Sender<Result<Value, AutoviaError>>>,
}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<ReadyEntry>,
    /// Pending-task table keyed by dedup id. Tasks stay here through
    /// retry-scheduled phases so late callers can still attach.
    pending: HashMap<String, PendingEntry>,
    next_seq: u64,
    running: usize,
    closed: bool,
}

impl RequestQueue {
    /// Creates the queue and spawns its dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: QueueConfig) -> Self {
        let inner = Arc::new(QueueInner {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
        });

        let dispatcher = Arc::clone(&inner);
        tokio::spawn(async move {
            loop {
                dispatcher.dispatch_ready().await;
                tokio::select! {
                    _ = dispatcher.cancel.cancelled() => break,
                    _ = dispatcher.notify.notified() => {}
                }
            }
            debug!("queue dispatcher stopped");
        });

        Self { inner }
    }

    /// Enqueues an action and awaits its settled result.
    ///
    /// The action must be safe to retry, or `max_retries` must be 0: the
    /// queue provides no exactly-once guarantee. If a task with the same id
    /// is already pending or in flight, this caller attaches to that task's
    /// outcome and the action is not invoked again.
    pub async fn enqueue<F, Fut>(
        &self,
        action: F,
        options: EnqueueOptions,
    ) -> Result<Value, AutoviaError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, AutoviaError>> + Send + 'static,
    {
        let action: ActionFn = Arc::new(move || Box::pin(action()));
        self.enqueue_boxed(action, options).await
    }

    /// Like [`enqueue`](Self::enqueue), deserializing the JSON result.
    pub async fn enqueue_typed<T, F, Fut>(
        &self,
        action: F,
        options: EnqueueOptions,
    ) -> Result<T, AutoviaError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, AutoviaError>> + Send + 'static,
    {
        let value = self.enqueue(action, options).await?;
        serde_json::from_value(value)
            .map_err(|e| AutoviaError::Internal(format!("response shape mismatch: {e}")))
    }

    /// Type-erased enqueue; the attachment check and task insertion happen
    /// under one lock, so near-simultaneous callers cannot double-dispatch.
    pub async fn enqueue_boxed(
        &self,
        action: ActionFn,
        options: EnqueueOptions,
    ) -> Result<Value, AutoviaError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(AutoviaError::QueueClosed);
            }

            let id = options
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            if let Some(existing) = state.pending.get_mut(&id) {
                debug!(task_id = %id, phase = %existing.phase, "attached to pending task");
                existing.waiters.push(tx);
            } else {
                let seq = state.next_seq;
                state.next_seq += 1;
                let max_retries = options
                    .max_retries
                    .unwrap_or(self.inner.config.default_max_retries);
                let task = QueueTask {
                    id: id.clone(),
                    priority: options.priority,
                    max_retries,
                    attempt: 0,
                    seq,
                    action,
                };
                state.ready.push(ReadyEntry {
                    priority: options.priority,
                    seq,
                    task_id: id.clone(),
                });
                state.pending.insert(
                    id.clone(),
                    PendingEntry {
                        task,
                        phase: TaskPhase::Queued,
                        waiters: vec![tx],
                    },
                );
                debug!(task_id = %id, priority = options.priority, "task enqueued");
                self.inner.notify.notify_one();
            }
        }

        rx.await.map_err(|_| AutoviaError::QueueClosed)?
    }

    /// Number of tasks currently pending (queued, running, or awaiting retry).
    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Shuts the queue down: stops the dispatcher, rejects all pending
    /// waiters, and refuses further enqueues. Actions already dispatched run
    /// to completion but their results are discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let drained: Vec<(String, PendingEntry)> = {
            let mut state = self.inner.state.lock().await;
            state.closed = true;
            state.ready.clear();
            state.pending.drain().collect()
        };
        for (id, entry) in drained {
            debug!(task_id = %id, "pending task aborted by shutdown");
            for tx in entry.waiters {
                let _ = tx.send(Err(AutoviaError::QueueClosed));
            }
        }
        info!("request queue shut down");
    }
}

impl QueueInner {
    /// Dispatches ready tasks while concurrency slots are free.
    async fn dispatch_ready(self: &Arc<Self>) {
        loop {
            let task_id = {
                let mut state = self.state.lock().await;
                if state.closed || state.running >= self.config.max_concurrency.max(1) {
                    return;
                }
                let Some(entry) = state.ready.pop() else {
                    return;
                };
                if !state.pending.contains_key(&entry.task_id) {
                    // Settled by shutdown while still queued.
                    continue;
                }
                state.running += 1;
                entry.task_id
            };

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                QueueInner::run_task(inner, task_id).await;
            });
        }
    }

    /// Runs one attempt of a task and routes the outcome: settle, or
    /// schedule a retry after backoff.
    async fn run_task(inner: Arc<QueueInner>, task_id: String) {
        let (action, attempt, max_retries) = {
            let mut state = inner.state.lock().await;
            match state.pending.get_mut(&task_id) {
                Some(entry) => {
                    entry.phase = TaskPhase::Running;
                    (
                        entry.task.action.clone(),
                        entry.task.attempt,
                        entry.task.max_retries,
                    )
                }
                None => {
                    // Shut down between dispatch and start.
                    state.running = state.running.saturating_sub(1);
                    return;
                }
            }
        };

        debug!(task_id = %task_id, attempt, "task running");

        let timeout = Duration::from_secs(inner.config.request_timeout_secs);
        let result = match tokio::time::timeout(timeout, (action)()).await {
            Ok(result) => result,
            Err(_) => Err(AutoviaError::Timeout { duration: timeout }),
        };

        match result {
            Ok(value) => {
                inner.settle(&task_id, Ok(value)).await;
            }
            Err(err) if err.is_rate_limited() => {
                warn!(
                    task_id = %task_id,
                    status = err.status(),
                    "backend rate limited; surfacing without retry"
                );
                inner.settle(&task_id, Err(err)).await;
            }
            Err(err) if err.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(
                    Duration::from_millis(inner.config.base_delay_ms),
                    attempt,
                    Duration::from_millis(inner.config.max_delay_ms),
                );
                warn!(
                    task_id = %task_id,
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure; retry scheduled"
                );
                {
                    let mut state = inner.state.lock().await;
                    if let Some(entry) = state.pending.get_mut(&task_id) {
                        entry.task.attempt += 1;
                        entry.phase = TaskPhase::RetryScheduled;
                    }
                }
                let requeue = Arc::clone(&inner);
                let id = task_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut state = requeue.state.lock().await;
                    if state.closed {
                        return;
                    }
                    let Some(entry) = state.pending.get_mut(&id) else {
                        return;
                    };
                    entry.phase = TaskPhase::Queued;
                    let priority = entry.task.priority;
                    let seq = entry.task.seq;
                    state.ready.push(ReadyEntry {
                        priority,
                        seq,
                        task_id: id,
                    });
                    requeue.notify.notify_one();
                });
            }
            Err(err) => {
                debug!(task_id = %task_id, error = %err, "permanent failure or retries exhausted");
                inner.settle(&task_id, Err(err)).await;
            }
        }

        {
            let mut state = inner.state.lock().await;
            state.running = state.running.saturating_sub(1);
        }
        inner.notify.notify_one();
    }

    /// Removes the task and fans its result out to every attached waiter.
    async fn settle(&self, task_id: &str, result: Result<Value, AutoviaError>) {
        let waiters = {
            let mut state = self.state.lock().await;
            match state.pending.remove(task_id) {
                Some(entry) => entry.waiters,
                None => return,
            }
        };
        let count = waiters.len();
        for tx in waiters {
            let shared = match &result {
                Ok(value) => Ok(value.clone()),
                Err(err) => Err(err.duplicate()),
            };
            // A caller that stopped awaiting just ignores its result.
            let _ = tx.send(shared);
        }
        debug!(task_id = %task_id, waiters = count, ok = result.is_ok(), "task settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> QueueConfig {
        QueueConfig {
            max_concurrency: 1,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            default_max_retries: 3,
            request_timeout_secs: 8,
        }
    }

    #[tokio::test]
    async fn resolves_with_action_result() {
        let queue = RequestQueue::new(test_config());
        let result = queue
            .enqueue(|| async { Ok(json!({"vehicles": 3})) }, EnqueueOptions::default())
            .await
            .unwrap();
        assert_eq!(result["vehicles"], 3);
    }

    #[tokio::test]
    async fn dedup_runs_action_once_and_fans_out() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            queue.enqueue(
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(json!("listing-page"))
                    }
                },
                EnqueueOptions::with_id("listings"),
            )
        };

        let (r1, r2, r3) = tokio::join!(make(), make(), make());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "action must run exactly once");
        assert_eq!(r1.unwrap(), json!("listing-page"));
        assert_eq!(r2.unwrap(), json!("listing-page"));
        assert_eq!(r3.unwrap(), json!("listing-page"));
    }

    #[tokio::test]
    async fn dedup_fans_out_failures_too() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |id: &'static str| {
            let calls = Arc::clone(&calls);
            queue.enqueue(
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(AutoviaError::Api {
                            status: 400,
                            message: "bad filter".into(),
                        })
                    }
                },
                EnqueueOptions::with_id(id),
            )
        };

        let (r1, r2) = tokio::join!(make("search"), make("search"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(r1.unwrap_err().status(), Some(400));
        assert_eq!(r2.unwrap_err().status(), Some(400));
    }

    #[tokio::test]
    async fn higher_priority_starts_first() {
        let queue = RequestQueue::new(test_config());
        let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let task = |name: &'static str, priority: i32| {
            let order = Arc::clone(&order);
            let opts = EnqueueOptions {
                priority,
                ..EnqueueOptions::default()
            };
            queue.enqueue(
                move || {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().await.push(name);
                        Ok(json!(name))
                    }
                },
                opts,
            )
        };

        let (a, b) = tokio::join!(task("low", 1), task("high", 5));
        a.unwrap();
        b.unwrap();
        assert_eq!(*order.lock().await, vec!["high", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_ceiling_is_max_retries_plus_one() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let result = queue
            .enqueue(
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(AutoviaError::Api {
                            status: 500,
                            message: "flaky".into(),
                        })
                    }
                },
                EnqueueOptions {
                    max_retries: Some(3),
                    ..EnqueueOptions::default()
                },
            )
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(calls.load(Ordering::SeqCst), 4, "initial attempt + 3 retries");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_429_is_never_retried() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let result = queue
            .enqueue(
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(AutoviaError::Api {
                            status: 429,
                            message: "slow down".into(),
                        })
                    }
                },
                EnqueueOptions {
                    max_retries: Some(5),
                    ..EnqueueOptions::default()
                },
            )
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_503_surfaces_after_single_attempt() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let result = queue
            .enqueue(
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(AutoviaError::Api {
                            status: 503,
                            message: "maintenance".into(),
                        })
                    }
                },
                EnqueueOptions::default(),
            )
            .await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_len().await, 0, "no retry left scheduled");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_on_retry() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let result = queue
            .enqueue(
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(AutoviaError::Transport {
                                message: "connection reset".into(),
                                source: None,
                            })
                        } else {
                            Ok(json!("recovered"))
                        }
                    }
                },
                EnqueueOptions::default(),
            )
            .await;

        assert_eq!(result.unwrap(), json!("recovered"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_action_times_out_as_transient() {
        let queue = RequestQueue::new(test_config());

        let result = queue
            .enqueue(
                || async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!("never"))
                },
                EnqueueOptions {
                    max_retries: Some(0),
                    ..EnqueueOptions::default()
                },
            )
            .await;

        assert!(matches!(
            result.unwrap_err(),
            AutoviaError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn permanent_4xx_is_not_retried() {
        let queue = RequestQueue::new(test_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let result = queue
            .enqueue(
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(AutoviaError::NotFound {
                            resource: "vehicle",
                            id: "v-9".into(),
                        })
                    }
                },
                EnqueueOptions::default(),
            )
            .await;

        assert!(matches!(result.unwrap_err(), AutoviaError::NotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_pending_and_new_work() {
        let queue = RequestQueue::new(test_config());

        // Occupy the single slot with a slow task, then queue another behind it.
        let slow = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .enqueue(
                        || async {
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            Ok(json!("slow"))
                        },
                        EnqueueOptions::default(),
                    )
                    .await
            })
        };
        let queued = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .enqueue(|| async { Ok(json!("queued")) }, EnqueueOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        queue.shutdown().await;

        assert!(matches!(
            queued.await.unwrap().unwrap_err(),
            AutoviaError::QueueClosed
        ));
        assert!(matches!(
            slow.await.unwrap().unwrap_err(),
            AutoviaError::QueueClosed
        ));

        let fresh = queue
            .enqueue(|| async { Ok(json!("late")) }, EnqueueOptions::default())
            .await;
        assert!(matches!(fresh.unwrap_err(), AutoviaError::QueueClosed));
    }

    #[tokio::test]
    async fn bounded_concurrency_is_respected() {
        let config = QueueConfig {
            max_concurrency: 2,
            ..test_config()
        };
        let queue = RequestQueue::new(config);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = queue.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(
                        move || {
                            let in_flight = Arc::clone(&in_flight);
                            let peak = Arc::clone(&peak);
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok(json!(null))
                            }
                        },
                        EnqueueOptions::default(),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak in-flight {} exceeded the concurrency bound",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn typed_enqueue_deserializes() {
        #[derive(serde::Deserialize)]
        struct Count {
            total: u32,
        }

        let queue = RequestQueue::new(test_config());
        let count: Count = queue
            .enqueue_typed(
                || async { Ok(json!({"total": 12})) },
                EnqueueOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(count.total, 12);
    }
}
