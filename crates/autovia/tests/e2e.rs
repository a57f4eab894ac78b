// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the assembled service stack.
//!
//! Each test creates an isolated TestHarness with an in-memory store, a mock
//! transport, a chat session, and a request queue. Tests are independent and
//! order-insensitive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autovia_core::types::{SenderRole, TransportEvent};
use autovia_core::AutoviaError;
use autovia_core::ConversationStore;
use autovia_queue::EnqueueOptions;
use autovia_test_utils::TestHarness;
use serde_json::json;
use tokio::sync::Mutex;

// ---- Scenario 1: dedup plus priority ordering ----

#[tokio::test]
async fn duplicate_ids_collapse_and_priority_wins() {
    let harness = TestHarness::builder().build();
    let executions = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let task = |id: &'static str, priority: i32| {
        let executions = Arc::clone(&executions);
        let order = Arc::clone(&order);
        harness.queue.enqueue(
            move || {
                let executions = Arc::clone(&executions);
                let order = Arc::clone(&order);
                async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    order.lock().await.push(id);
                    Ok(json!(id))
                }
            },
            EnqueueOptions {
                id: Some(id.to_string()),
                priority,
                ..EnqueueOptions::default()
            },
        )
    };

    // Three tasks, ids a, b, a: the duplicate "a" attaches to the first.
    let (r1, r2, r3) = tokio::join!(task("a", 1), task("b", 5), task("a", 1));

    assert_eq!(executions.load(Ordering::SeqCst), 2, "exactly two executions");
    assert_eq!(r1.unwrap(), json!("a"));
    assert_eq!(r2.unwrap(), json!("b"));
    assert_eq!(r3.unwrap(), json!("a"));

    let order = order.lock().await;
    assert_eq!(*order, vec!["b", "a"], "priority 5 starts before priority 1");
}

// ---- Scenario 2: send with transport down ----

#[tokio::test]
async fn offline_send_persists_once_and_buffers() {
    let harness = TestHarness::builder().build();
    let conversation = harness
        .seed_conversation("jane@example.com", "lst-12")
        .await
        .unwrap();

    let outcome = harness
        .session
        .send_message(&conversation.id, harness.customer_message("still there?"))
        .await;

    assert!(outcome.success);
    assert!(outcome.error.is_none());
    let persisted = harness.store.messages(&conversation.id, None).await.unwrap();
    assert_eq!(persisted.len(), 1, "store append called exactly once");
    assert_eq!(harness.session.pending_len(&conversation.id).await, 1);
}

// ---- Scenario 3: 503 surfaces without retry ----

#[tokio::test]
async fn unavailable_backend_surfaces_after_one_attempt() {
    let harness = TestHarness::builder().build();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in = Arc::clone(&attempts);

    let result = harness
        .queue
        .enqueue(
            move || {
                let attempts = Arc::clone(&attempts_in);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AutoviaError::Api {
                        status: 503,
                        message: "backend unavailable".into(),
                    })
                }
            },
            EnqueueOptions {
                max_retries: Some(4),
                ..EnqueueOptions::default()
            },
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_rate_limited());
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "no scheduled retry");
    assert_eq!(harness.queue.pending_len().await, 0);
}

// ---- Full degraded-then-recovered chat flow ----

#[tokio::test]
async fn degraded_chat_recovers_and_replays() {
    let harness = TestHarness::builder().with_failing_transport().build();
    let conversation = harness
        .seed_conversation("buyer@example.com", "lst-3")
        .await
        .unwrap();

    // Degraded connect still reports success.
    let connected = harness
        .session
        .connect("buyer@example.com", SenderRole::Customer)
        .await
        .unwrap();
    assert!(connected);

    // Messages persist and buffer while the live channel is down.
    for text in ["first", "second", "third"] {
        let outcome = harness
            .session
            .send_message(&conversation.id, harness.customer_message(text))
            .await;
        assert!(outcome.success);
    }
    assert_eq!(harness.session.pending_len(&conversation.id).await, 3);
    assert_eq!(
        harness.store.messages(&conversation.id, None).await.unwrap().len(),
        3
    );

    // Transport recovers; the next connect replays the buffer.
    harness.transport.set_fail_connect(false);
    harness
        .session
        .connect("buyer@example.com", SenderRole::Customer)
        .await
        .unwrap();

    assert_eq!(harness.session.pending_len(&conversation.id).await, 0);
    let live = harness
        .transport
        .emitted_count(|e| matches!(e, TransportEvent::NewMessage { .. }))
        .await;
    assert_eq!(live, 3, "all buffered messages replayed live");
}

// ---- Queue and session tear down independently ----

#[tokio::test]
async fn shutdown_sequence_is_clean() {
    let harness = TestHarness::builder().build();
    let conversation = harness
        .seed_conversation("buyer@example.com", "lst-8")
        .await
        .unwrap();

    harness
        .session
        .connect("buyer@example.com", SenderRole::Customer)
        .await
        .unwrap();
    harness
        .session
        .send_typing(&conversation.id, SenderRole::Customer, true)
        .await;

    harness.session.disconnect().await;
    harness.queue.shutdown().await;

    // Shut-down queue rejects new work without hanging.
    let result = harness
        .queue
        .enqueue(|| async { Ok(json!("late")) }, EnqueueOptions::default())
        .await;
    assert!(matches!(result.unwrap_err(), AutoviaError::QueueClosed));

    // No typing auto-expiry fires after disconnect.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let typing_false = harness
        .transport
        .emitted_count(|e| matches!(e, TransportEvent::Typing { is_typing: false, .. }))
        .await;
    assert_eq!(typing_false, 0);
}

// ---- Harness isolation ----

#[tokio::test]
async fn harnesses_are_fully_isolated() {
    let h1 = TestHarness::builder().build();
    let h2 = TestHarness::builder().build();

    let c1 = h1.seed_conversation("a@x.io", "lst-1").await.unwrap();
    assert!(h1.store.find_by_id(&c1.id).await.unwrap().is_some());
    assert!(h2.store.find_by_id(&c1.id).await.unwrap().is_none());
}
