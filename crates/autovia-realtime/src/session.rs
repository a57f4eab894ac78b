// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client realtime chat session.
//!
//! Maintains a best-effort live channel for message delivery, typing
//! indicators, read receipts, and presence, while guaranteeing that message
//! persistence always happens independently of the channel: the send path
//! never blocks on transport availability, and a transport-establishment
//! failure is reported as a degraded success. That degraded mode is a
//! product decision, not an error to surface.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use autovia_config::model::RealtimeConfig;
use autovia_core::types::{
    ChatMessage, ConversationId, DeliveryStatus, MessageId, PresenceKey, SenderRole,
    TransportEvent, UserPresence,
};
use autovia_core::{normalize_key, ConversationStore, Transport};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::{ChatEvent, ConnectionState};
use crate::pending::PendingMessages;
use crate::presence::PresenceCache;
use crate::typing::TypingTimers;

/// Capacity of the broadcast event stream handed to subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of [`ChatSession::send_message`].
///
/// `success: true` means "durably recorded", not "delivered live". The send
/// path never returns `Err`; UI code branches on this shape instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// State shared between the session handle and its event pump task.
struct SessionInner {
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    config: RealtimeConfig,
    state_tx: watch::Sender<ConnectionState>,
    presence: Mutex<PresenceCache>,
    pending: Mutex<PendingMessages>,
    typing: Mutex<TypingTimers>,
    delivery: Mutex<HashMap<MessageId, DeliveryStatus>>,
    joined: Mutex<HashSet<ConversationId>>,
    events_tx: broadcast::Sender<ChatEvent>,
}

/// A realtime chat session over a durable store and a live transport.
///
/// All state (presence cache, pending buffers, delivery tracking) is owned
/// by the session instance; construct one per client via [`ChatSession::new`]
/// and tear it down with [`ChatSession::disconnect`].
pub struct ChatSession {
    inner: Arc<SessionInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Serializes connection attempts so concurrent `connect` calls collapse
    /// into one underlying transport attempt.
    connect_guard: Mutex<()>,
}

impl ChatSession {
    /// Builds a session over the given store and transport.
    ///
    /// Nothing connects until [`connect`](Self::connect) is called; sending
    /// works before that in degraded (persistence-only) mode.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn Transport>,
        config: RealtimeConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(SessionInner {
            presence: Mutex::new(PresenceCache::new(config.presence_cap)),
            pending: Mutex::new(PendingMessages::new(
                config.pending_messages_cap,
                config.pending_conversations_cap,
            )),
            typing: Mutex::new(TypingTimers::new()),
            delivery: Mutex::new(HashMap::new()),
            joined: Mutex::new(HashSet::new()),
            store,
            transport,
            config,
            state_tx,
            events_tx,
        });
        Self {
            inner,
            pump: Mutex::new(None),
            connect_guard: Mutex::new(()),
        }
    }

    /// Establishes the live channel.
    ///
    /// Idempotent: calling while connected is a no-op returning `true`. A
    /// re-entrant call while an attempt is outstanding waits for that
    /// attempt instead of opening a second channel. Transport failure is
    /// non-fatal: the session stays in degraded persistence-only mode and
    /// the call still returns `Ok(true)`.
    pub async fn connect(&self, identity: &str, role: SenderRole) -> Result<bool, autovia_core::AutoviaError> {
        let _guard = self.connect_guard.lock().await;
        if *self.inner.state_tx.borrow() == ConnectionState::Connected {
            debug!("connect: already connected");
            return Ok(true);
        }

        self.inner.set_state(ConnectionState::Connecting);

        match self.inner.transport.connect().await {
            Ok(()) => {
                self.inner.set_state(ConnectionState::Connected);
                self.start_pump().await;

                let announce = TransportEvent::Presence {
                    identity: normalize_key(identity),
                    role,
                    is_online: true,
                    last_seen: chrono::Utc::now().to_rfc3339(),
                };
                if let Err(e) = self.inner.transport.emit(announce).await {
                    warn!(error = %e, "presence announcement failed");
                }

                self.inner.replay_pending().await;
                self.inner.rejoin_all().await;
                info!(identity = %normalize_key(identity), role = %role, "live channel connected");
                Ok(true)
            }
            Err(e) => {
                // Chat still works through the durable store, so the caller
                // is told "connected" in the degraded sense.
                warn!(error = %e, "live channel unavailable, continuing in degraded mode");
                self.inner.set_state(ConnectionState::Disconnected);
                Ok(true)
            }
        }
    }

    /// Sends a chat message: durable persistence first, live delivery after.
    ///
    /// If the channel is down (or the emit fails) the message is buffered in
    /// the per-conversation pending queue for replay on reconnect, and the
    /// call still succeeds -- persistence is the success criterion.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        message: ChatMessage,
    ) -> SendOutcome {
        if let Err(e) = self
            .inner
            .store
            .append_message(conversation_id, &message)
            .await
        {
            error!(conversation_id = %conversation_id, error = %e, "message persistence failed");
            return SendOutcome::failed(e.to_string());
        }

        if self.inner.transport.is_connected() {
            self.inner
                .delivery
                .lock()
                .await
                .insert(message.id.clone(), DeliveryStatus::Sending);

            let message_id = message.id.clone();
            let event = TransportEvent::NewMessage {
                conversation_id: conversation_id.clone(),
                message: message.clone(),
            };
            match self.inner.transport.emit(event).await {
                Ok(()) => {
                    self.inner
                        .delivery
                        .lock()
                        .await
                        .insert(message_id.clone(), DeliveryStatus::Sent);
                    let _ = self.inner.events_tx.send(ChatEvent::DeliveryUpdated {
                        message_id,
                        status: DeliveryStatus::Sent,
                    });
                }
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "live emit failed, message buffered for replay"
                    );
                    self.inner.delivery.lock().await.remove(&message_id);
                    self.inner
                        .pending
                        .lock()
                        .await
                        .push(conversation_id.clone(), message);
                }
            }
        } else {
            debug!(conversation_id = %conversation_id, "transport offline, message buffered for replay");
            self.inner
                .pending
                .lock()
                .await
                .push(conversation_id.clone(), message);
        }

        SendOutcome::ok()
    }

    /// Subscribes the channel to a conversation's event stream.
    ///
    /// Callable before `connect`: waits up to the configured join window for
    /// a connection, then gives up silently (the conversation is re-joined
    /// on the next successful connect). Never hangs the caller.
    pub async fn join_conversation(&self, conversation_id: &ConversationId) {
        self.inner
            .joined
            .lock()
            .await
            .insert(conversation_id.clone());

        if self.inner.transport.is_connected() {
            if let Err(e) = self
                .inner
                .transport
                .emit(TransportEvent::Join {
                    conversation_id: conversation_id.clone(),
                })
                .await
            {
                warn!(conversation_id = %conversation_id, error = %e, "join emit failed");
            }
            return;
        }

        // Wait for the connection; the connect path emits the join for every
        // registered conversation, so nothing further to do on success.
        let mut state_rx = self.inner.state_tx.subscribe();
        let wait = Duration::from_secs(self.inner.config.join_wait_secs);
        let connected = tokio::time::timeout(wait, async {
            loop {
                if *state_rx.borrow_and_update() == ConnectionState::Connected {
                    break;
                }
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if connected.is_err() {
            debug!(
                conversation_id = %conversation_id,
                "join wait timed out, will join on reconnect"
            );
        }
    }

    /// Emits a transient typing indicator.
    ///
    /// A `true` auto-expires to `false` after the configured window unless
    /// explicitly cleared, so a caller that forgets to stop typing cannot
    /// leave a stuck indicator.
    pub async fn send_typing(
        &self,
        conversation_id: &ConversationId,
        role: SenderRole,
        is_typing: bool,
    ) {
        if self.inner.transport.is_connected()
            && let Err(e) = self
                .inner
                .transport
                .emit(TransportEvent::Typing {
                    conversation_id: conversation_id.clone(),
                    role,
                    is_typing,
                })
                .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "typing emit failed");
        }

        let key = (conversation_id.clone(), role);
        if is_typing {
            let inner = Arc::clone(&self.inner);
            let conversation_id = conversation_id.clone();
            let expiry = Duration::from_secs(self.inner.config.typing_expiry_secs);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(expiry).await;
                inner
                    .typing
                    .lock()
                    .await
                    .complete(&(conversation_id.clone(), role));
                if inner.transport.is_connected()
                    && let Err(e) = inner
                        .transport
                        .emit(TransportEvent::Typing {
                            conversation_id: conversation_id.clone(),
                            role,
                            is_typing: false,
                        })
                        .await
                {
                    warn!(error = %e, "typing auto-expiry emit failed");
                }
                let _ = inner.events_tx.send(ChatEvent::Typing {
                    conversation_id,
                    role,
                    is_typing: false,
                });
            });
            self.inner.typing.lock().await.arm(key, handle);
        } else {
            self.inner.typing.lock().await.cancel(&key);
        }
    }

    /// Emits a read receipt for a batch of messages.
    ///
    /// No durable side effect; persistence of read state is a store concern.
    pub async fn mark_read(
        &self,
        conversation_id: &ConversationId,
        message_ids: Vec<MessageId>,
        role: SenderRole,
    ) {
        if !self.inner.transport.is_connected() {
            debug!(conversation_id = %conversation_id, "transport offline, read receipt skipped");
            return;
        }
        if let Err(e) = self
            .inner
            .transport
            .emit(TransportEvent::ReadReceipt {
                conversation_id: conversation_id.clone(),
                message_ids,
                role,
            })
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "read receipt emit failed");
        }
    }

    /// Pure lookup into the presence cache. No network effect.
    pub async fn presence(&self, identity: &str, role: SenderRole) -> Option<UserPresence> {
        self.inner
            .presence
            .lock()
            .await
            .get(&PresenceKey::new(identity, role))
    }

    /// Last observed live-delivery status for an outbound message.
    pub async fn delivery_status(&self, message_id: &MessageId) -> Option<DeliveryStatus> {
        self.inner.delivery.lock().await.get(message_id).copied()
    }

    /// Multi-subscriber stream of session events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Current connection FSM state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Buffered pending messages for a conversation.
    pub async fn pending_len(&self, conversation_id: &ConversationId) -> usize {
        self.inner.pending.lock().await.len_for(conversation_id)
    }

    /// Tears the session down: stops the event pump, aborts every typing
    /// timer, clears delivery tracking, and disconnects the transport.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        self.inner.typing.lock().await.clear();
        self.inner.delivery.lock().await.clear();
        if let Err(e) = self.inner.transport.disconnect().await {
            warn!(error = %e, "transport disconnect error");
        }
        self.inner.set_state(ConnectionState::Disconnected);
        info!("chat session disconnected");
    }

    /// Spawns the inbound event pump if it is not already running.
    async fn start_pump(&self) {
        let mut pump = self.pump.lock().await;
        if let Some(handle) = pump.as_ref()
            && !handle.is_finished()
        {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *pump = Some(tokio::spawn(async move {
            loop {
                match inner.transport.recv().await {
                    Ok(event) => inner.handle_event(event).await,
                    Err(e) => {
                        debug!(error = %e, "transport receive ended, stopping event pump");
                        inner.set_state(ConnectionState::Disconnected);
                        break;
                    }
                }
            }
        }));
    }
}

impl SessionInner {
    /// Transitions the FSM and broadcasts the change.
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        let _ = self.events_tx.send(ChatEvent::Connection(state));
    }

    /// Handles one inbound transport event.
    async fn handle_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                debug!("transport reconnected");
                self.set_state(ConnectionState::Connected);
                self.replay_pending().await;
                self.rejoin_all().await;
            }
            TransportEvent::Disconnected { reason } => {
                warn!(
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "transport dropped"
                );
                self.set_state(ConnectionState::Disconnected);
            }
            TransportEvent::NewMessage {
                conversation_id,
                message,
            } => {
                let _ = self.events_tx.send(ChatEvent::MessageReceived {
                    conversation_id,
                    message,
                });
            }
            TransportEvent::Typing {
                conversation_id,
                role,
                is_typing,
            } => {
                let _ = self.events_tx.send(ChatEvent::Typing {
                    conversation_id,
                    role,
                    is_typing,
                });
            }
            TransportEvent::ReadReceipt {
                conversation_id,
                message_ids,
                role,
            } => {
                let _ = self.events_tx.send(ChatEvent::ReadReceipt {
                    conversation_id,
                    message_ids,
                    role,
                });
            }
            TransportEvent::Presence {
                identity,
                role,
                is_online,
                last_seen,
            } => {
                let presence = UserPresence {
                    is_online,
                    last_seen,
                };
                self.presence
                    .lock()
                    .await
                    .update(PresenceKey::new(&identity, role), presence.clone());
                let _ = self.events_tx.send(ChatEvent::PresenceChanged {
                    identity,
                    role,
                    presence,
                });
            }
            TransportEvent::DeliveryUpdate { message_id, status } => {
                let mut delivery = self.delivery.lock().await;
                let accept = match delivery.get(&message_id) {
                    Some(current) => current.advances_to(status),
                    None => true,
                };
                if accept {
                    delivery.insert(message_id.clone(), status);
                    drop(delivery);
                    let _ = self
                        .events_tx
                        .send(ChatEvent::DeliveryUpdated { message_id, status });
                } else {
                    debug!(message_id = %message_id, status = %status, "ignoring delivery status regression");
                }
            }
            TransportEvent::Join { conversation_id } => {
                debug!(conversation_id = %conversation_id, "ignoring inbound join echo");
            }
        }
    }

    /// Replays every buffered message after a (re)connect.
    ///
    /// Best effort: a failed emit is logged and dropped from live delivery;
    /// the durable copy was persisted at send time.
    async fn replay_pending(self: &Arc<Self>) {
        let drained = self.pending.lock().await.take_all();
        for (conversation_id, messages) in drained {
            let count = messages.len();
            let mut delivered = 0usize;
            for message in messages {
                let event = TransportEvent::NewMessage {
                    conversation_id: conversation_id.clone(),
                    message,
                };
                match self.transport.emit(event).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(
                            conversation_id = %conversation_id,
                            error = %e,
                            "pending replay emit failed"
                        );
                    }
                }
            }
            info!(conversation_id = %conversation_id, count, delivered, "pending buffer replayed");
            let _ = self.events_tx.send(ChatEvent::PendingReplayed {
                conversation_id,
                count,
            });
        }
    }

    /// Re-subscribes every joined conversation after a (re)connect.
    async fn rejoin_all(self: &Arc<Self>) {
        let joined: Vec<ConversationId> = self.joined.lock().await.iter().cloned().collect();
        for conversation_id in joined {
            if let Err(e) = self
                .transport
                .emit(TransportEvent::Join {
                    conversation_id: conversation_id.clone(),
                })
                .await
            {
                warn!(conversation_id = %conversation_id, error = %e, "re-join emit failed");
            }
        }
    }
}
