// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the realtime chat session over mock backends.
//!
//! Persistence must never depend on transport availability, pending buffers
//! must replay on reconnect, and every timer must be cleaned up on
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use autovia_config::model::RealtimeConfig;
use autovia_core::types::{
    Conversation, ConversationId, DeliveryStatus, SenderRole, TransportEvent,
};
use autovia_core::{ChatMessage, ConversationStore, Transport};
use autovia_realtime::{ChatEvent, ChatSession, ConnectionState};
use autovia_storage::MemoryStore;
use autovia_test_utils::MockTransport;
use tokio::sync::broadcast;

fn test_config() -> RealtimeConfig {
    RealtimeConfig {
        join_wait_secs: 2,
        typing_expiry_secs: 4,
        ..RealtimeConfig::default()
    }
}

async fn setup() -> (ChatSession, Arc<MockTransport>, Arc<MemoryStore>, Conversation) {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(MockTransport::new());
    let conversation = Conversation::new("jane@example.com", "lst-1");
    store.create(&conversation).await.unwrap();

    let session = ChatSession::new(
        Arc::clone(&store) as Arc<dyn ConversationStore>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        test_config(),
    );
    (session, transport, store, conversation)
}

/// Await the first broadcast event matching the predicate.
async fn wait_for_event(
    rx: &mut broadcast::Receiver<ChatEvent>,
    predicate: impl Fn(&ChatEvent) -> bool,
) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event did not arrive")
}

fn is_new_message(event: &TransportEvent) -> bool {
    matches!(event, TransportEvent::NewMessage { .. })
}

// ---- Persistence independent of transport ----

#[tokio::test]
async fn send_while_disconnected_persists_and_buffers() {
    let (session, transport, store, conversation) = setup().await;

    let message = ChatMessage::text(SenderRole::Customer, "is the van still available?");
    let outcome = session.send_message(&conversation.id, message).await;

    assert!(outcome.success, "durable persistence defines success");
    assert!(outcome.error.is_none());
    assert_eq!(store.messages(&conversation.id, None).await.unwrap().len(), 1);
    assert_eq!(session.pending_len(&conversation.id).await, 1);
    assert!(transport.emitted_events().await.is_empty());
}

#[tokio::test]
async fn transient_store_failure_fails_the_send() {
    use autovia_test_utils::FlakyStore;

    let store = Arc::new(FlakyStore::new());
    let transport = Arc::new(MockTransport::new());
    let conversation = Conversation::new("jane@example.com", "lst-1");
    store.create(&conversation).await.unwrap();
    let session = ChatSession::new(
        Arc::clone(&store) as Arc<dyn ConversationStore>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        test_config(),
    );

    store.fail_next_appends(1);
    let outcome = session
        .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, "hi"))
        .await;
    assert!(!outcome.success, "persistence failure fails the send");
    assert_eq!(
        session.pending_len(&conversation.id).await,
        0,
        "unpersisted messages are not buffered for live replay"
    );

    // The store recovered; the next send goes through.
    let outcome = session
        .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, "hi again"))
        .await;
    assert!(outcome.success);
}

#[tokio::test]
async fn send_to_missing_conversation_fails() {
    let (session, _transport, store, _conversation) = setup().await;

    let ghost = ConversationId::new("ghost@nowhere.io", "lst-404");
    let outcome = session
        .send_message(&ghost, ChatMessage::text(SenderRole::Customer, "hello?"))
        .await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("not found"));
    assert_eq!(session.pending_len(&ghost).await, 0);
    assert!(store.messages(&ghost, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn connected_send_emits_live_and_tracks_delivery() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    let message = ChatMessage::text(SenderRole::Customer, "can I come by at 5?");
    let message_id = message.id.clone();
    let outcome = session.send_message(&conversation.id, message).await;

    assert!(outcome.success);
    assert_eq!(session.pending_len(&conversation.id).await, 0);
    assert_eq!(transport.emitted_count(is_new_message).await, 1);
    assert_eq!(
        session.delivery_status(&message_id).await,
        Some(DeliveryStatus::Sent)
    );
}

#[tokio::test]
async fn emit_failure_still_succeeds_and_buffers() {
    let (session, transport, store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    transport.set_fail_emit(true);

    let outcome = session
        .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, "ping"))
        .await;

    assert!(outcome.success);
    assert_eq!(session.pending_len(&conversation.id).await, 1);
    assert_eq!(store.messages(&conversation.id, None).await.unwrap().len(), 1);
}

// ---- Connection semantics ----

#[tokio::test]
async fn degraded_connect_reports_success() {
    let (session, transport, store, conversation) = setup().await;
    transport.set_fail_connect(true);

    let connected = session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    assert!(connected, "transport failure must not fail the connect call");
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    // Persistence keeps working in degraded mode.
    let outcome = session
        .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, "hi"))
        .await;
    assert!(outcome.success);
    assert_eq!(store.messages(&conversation.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_connects_collapse_to_one_attempt() {
    let (session, transport, _store, _conversation) = setup().await;
    transport.set_connect_delay(Duration::from_millis(50));

    let (a, b) = tokio::join!(
        session.connect("jane@example.com", SenderRole::Customer),
        session.connect("jane@example.com", SenderRole::Customer),
    );

    assert!(a.unwrap());
    assert!(b.unwrap());
    assert_eq!(transport.connect_attempts(), 1, "one underlying attempt");
    assert_eq!(session.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn connect_is_idempotent_once_connected() {
    let (session, transport, _store, _conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    assert_eq!(transport.connect_attempts(), 1);
}

// ---- Pending replay ----

#[tokio::test]
async fn connect_replays_buffered_messages() {
    let (session, transport, _store, conversation) = setup().await;

    for text in ["first", "second"] {
        let outcome = session
            .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, text))
            .await;
        assert!(outcome.success);
    }
    assert_eq!(session.pending_len(&conversation.id).await, 2);

    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    assert_eq!(session.pending_len(&conversation.id).await, 0);
    assert_eq!(transport.emitted_count(is_new_message).await, 2);
}

#[tokio::test]
async fn reconnect_event_replays_buffered_messages() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    let mut events = session.subscribe();

    // Simulate a transport-level drop.
    transport.set_connected(false);
    let outcome = session
        .send_message(&conversation.id, ChatMessage::text(SenderRole::Customer, "offline msg"))
        .await;
    assert!(outcome.success);
    assert_eq!(session.pending_len(&conversation.id).await, 1);

    // Transport recovers on its own and announces it.
    transport.set_connected(true);
    transport.inject_event(TransportEvent::Connected).await;

    let replayed = wait_for_event(&mut events, |e| {
        matches!(e, ChatEvent::PendingReplayed { .. })
    })
    .await;
    let ChatEvent::PendingReplayed { count, .. } = replayed else {
        unreachable!();
    };
    assert_eq!(count, 1);
    assert_eq!(session.pending_len(&conversation.id).await, 0);
    assert_eq!(transport.emitted_count(is_new_message).await, 1);
}

// ---- Typing indicators ----

#[tokio::test(start_paused = true)]
async fn typing_auto_expires_exactly_once() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    session
        .send_typing(&conversation.id, SenderRole::Customer, true)
        .await;

    let typing_false = |e: &TransportEvent| {
        matches!(e, TransportEvent::Typing { is_typing: false, .. })
    };
    assert_eq!(transport.emitted_count(typing_false).await, 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.emitted_count(typing_false).await, 1);

    // No second expiry later.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.emitted_count(typing_false).await, 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_stop_cancels_auto_expiry() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    session
        .send_typing(&conversation.id, SenderRole::Customer, true)
        .await;
    session
        .send_typing(&conversation.id, SenderRole::Customer, false)
        .await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    let typing_false = |e: &TransportEvent| {
        matches!(e, TransportEvent::Typing { is_typing: false, .. })
    };
    // Only the explicit stop, no auto-expiry duplicate.
    assert_eq!(transport.emitted_count(typing_false).await, 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_aborts_typing_timers() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    session
        .send_typing(&conversation.id, SenderRole::Customer, true)
        .await;
    session.disconnect().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let typing_false = |e: &TransportEvent| {
        matches!(e, TransportEvent::Typing { is_typing: false, .. })
    };
    assert_eq!(
        transport.emitted_count(typing_false).await,
        0,
        "no dangling timer may fire after disconnect"
    );
}

// ---- Joins ----

#[tokio::test(start_paused = true)]
async fn join_before_connect_gives_up_silently() {
    let (session, transport, _store, conversation) = setup().await;

    // Returns after the bounded wait instead of hanging.
    session.join_conversation(&conversation.id).await;

    let is_join = |e: &TransportEvent| matches!(e, TransportEvent::Join { .. });
    assert_eq!(transport.emitted_count(is_join).await, 0);
}

#[tokio::test]
async fn join_completes_once_connection_is_established() {
    let (session, transport, _store, conversation) = setup().await;
    let session = Arc::new(session);

    let joiner = {
        let session = Arc::clone(&session);
        let id = conversation.id.clone();
        tokio::spawn(async move { session.join_conversation(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    joiner.await.unwrap();

    let is_join = |e: &TransportEvent| matches!(e, TransportEvent::Join { .. });
    assert_eq!(transport.emitted_count(is_join).await, 1);
}

#[tokio::test]
async fn join_when_connected_emits_immediately() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    session.join_conversation(&conversation.id).await;

    let is_join = |e: &TransportEvent| matches!(e, TransportEvent::Join { .. });
    assert_eq!(transport.emitted_count(is_join).await, 1);
}

// ---- Presence ----

#[tokio::test]
async fn inbound_presence_updates_the_cache() {
    let (session, transport, _store, _conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    let mut events = session.subscribe();

    transport
        .inject_event(TransportEvent::Presence {
            identity: "Seller@Dealership.com".into(),
            role: SenderRole::Seller,
            is_online: true,
            last_seen: "2026-03-01T12:00:00Z".into(),
        })
        .await;

    wait_for_event(&mut events, |e| matches!(e, ChatEvent::PresenceChanged { .. })).await;

    let presence = session
        .presence("seller@dealership.com", SenderRole::Seller)
        .await
        .expect("presence cached under the normalized key");
    assert!(presence.is_online);
    assert_eq!(presence.last_seen, "2026-03-01T12:00:00Z");

    assert!(
        session
            .presence("seller@dealership.com", SenderRole::Customer)
            .await
            .is_none(),
        "presence is keyed by role too"
    );
}

// ---- Delivery tracking ----

#[tokio::test]
async fn delivery_status_advances_and_ignores_regressions() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();
    let mut events = session.subscribe();

    let message = ChatMessage::text(SenderRole::Customer, "tracked");
    let message_id = message.id.clone();
    session.send_message(&conversation.id, message).await;

    transport
        .inject_event(TransportEvent::DeliveryUpdate {
            message_id: message_id.clone(),
            status: DeliveryStatus::Delivered,
        })
        .await;
    wait_for_event(&mut events, |e| {
        matches!(e, ChatEvent::DeliveryUpdated { status: DeliveryStatus::Delivered, .. })
    })
    .await;

    transport
        .inject_event(TransportEvent::DeliveryUpdate {
            message_id: message_id.clone(),
            status: DeliveryStatus::Read,
        })
        .await;
    wait_for_event(&mut events, |e| {
        matches!(e, ChatEvent::DeliveryUpdated { status: DeliveryStatus::Read, .. })
    })
    .await;

    // A stale regression must be ignored. Use a typing event as a fence to
    // know the pump has processed past it.
    transport
        .inject_event(TransportEvent::DeliveryUpdate {
            message_id: message_id.clone(),
            status: DeliveryStatus::Delivered,
        })
        .await;
    transport
        .inject_event(TransportEvent::Typing {
            conversation_id: conversation.id.clone(),
            role: SenderRole::Seller,
            is_typing: true,
        })
        .await;
    wait_for_event(&mut events, |e| matches!(e, ChatEvent::Typing { .. })).await;

    assert_eq!(
        session.delivery_status(&message_id).await,
        Some(DeliveryStatus::Read)
    );
}

// ---- Read receipts ----

#[tokio::test]
async fn mark_read_emits_receipt_when_connected() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    let message = ChatMessage::text(SenderRole::Seller, "seen this?");
    session
        .mark_read(&conversation.id, vec![message.id.clone()], SenderRole::Customer)
        .await;

    let is_receipt = |e: &TransportEvent| matches!(e, TransportEvent::ReadReceipt { .. });
    assert_eq!(transport.emitted_count(is_receipt).await, 1);
}

#[tokio::test]
async fn mark_read_is_a_noop_while_disconnected() {
    let (session, transport, _store, conversation) = setup().await;

    let message = ChatMessage::text(SenderRole::Seller, "seen this?");
    session
        .mark_read(&conversation.id, vec![message.id], SenderRole::Customer)
        .await;

    assert!(transport.emitted_events().await.is_empty());
}

// ---- Multi-subscriber events ----

#[tokio::test]
async fn multiple_subscribers_each_receive_events() {
    let (session, transport, _store, conversation) = setup().await;
    session.connect("jane@example.com", SenderRole::Customer).await.unwrap();

    let mut first = session.subscribe();
    let mut second = session.subscribe();

    transport
        .inject_event(TransportEvent::NewMessage {
            conversation_id: conversation.id.clone(),
            message: ChatMessage::text(SenderRole::Seller, "hello both"),
        })
        .await;

    let a = wait_for_event(&mut first, |e| matches!(e, ChatEvent::MessageReceived { .. })).await;
    let b = wait_for_event(&mut second, |e| matches!(e, ChatEvent::MessageReceived { .. })).await;

    for event in [a, b] {
        let ChatEvent::MessageReceived { message, .. } = event else {
            unreachable!();
        };
        assert_eq!(message.text, "hello both");
    }
}
