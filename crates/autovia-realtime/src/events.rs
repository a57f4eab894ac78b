// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection FSM states and the multi-subscriber chat event stream.

use autovia_core::types::{
    ConversationId, DeliveryStatus, MessageId, SenderRole, UserPresence,
};
use autovia_core::ChatMessage;

/// States of the live-channel connection FSM.
///
/// `disconnected -> connecting -> connected`, with `connected ->
/// disconnected` on transport drop. Two callers holding `connecting`
/// concurrently collapse into one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Events broadcast to every session subscriber.
///
/// Multiple consumers can subscribe concurrently; a late or slow subscriber
/// never clobbers another's registration.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Connection FSM transition.
    Connection(ConnectionState),
    /// A message arrived over the live channel.
    MessageReceived {
        conversation_id: ConversationId,
        message: ChatMessage,
    },
    /// A participant's typing state changed (including auto-expiry).
    Typing {
        conversation_id: ConversationId,
        role: SenderRole,
        is_typing: bool,
    },
    /// A batch of messages was marked read by a participant.
    ReadReceipt {
        conversation_id: ConversationId,
        message_ids: Vec<MessageId>,
        role: SenderRole,
    },
    /// A user's presence snapshot changed.
    PresenceChanged {
        identity: String,
        role: SenderRole,
        presence: UserPresence,
    },
    /// Live delivery status of an outbound message advanced.
    DeliveryUpdated {
        message_id: MessageId,
        status: DeliveryStatus,
    },
    /// A conversation's pending buffer was replayed after reconnect.
    PendingReplayed {
        conversation_id: ConversationId,
        count: usize,
    },
}
