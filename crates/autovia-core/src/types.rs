// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Autovia service layer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::keys::normalize_key;

/// Unique identifier for a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh random message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a conversation: a composite of the normalized customer key
/// and the listing id.
///
/// The same (customer, listing) pair always maps to the same id regardless of
/// how the email was capitalized or padded, and regardless of storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Build the id for a (customer email, listing id) pair.
    pub fn new(customer_email: &str, listing_id: &str) -> Self {
        Self(format!(
            "{}__{}",
            normalize_key(customer_email),
            listing_id.trim()
        ))
    }

    /// Wrap an already-composed id (e.g. read back from storage).
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of roles a chat participant can have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Customer,
    Seller,
    System,
}

/// A side of a conversation that carries its own read flag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Customer,
    Seller,
}

/// Delivery status of a chat message on the live channel.
///
/// Durable persistence is tracked separately; this only describes best-effort
/// live delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Whether `next` is a legal forward transition from `self`.
    ///
    /// sending -> sent -> delivered -> read, with failed reachable from any
    /// non-terminal state. Regressions (e.g. read -> delivered) are ignored.
    pub fn advances_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, next) {
            (Sending, Sent) | (Sending, Delivered) | (Sending, Read) => true,
            (Sent, Delivered) | (Sent, Read) => true,
            (Delivered, Read) => true,
            (Sending, Failed) | (Sent, Failed) | (Delivered, Failed) => true,
            _ => false,
        }
    }
}

/// Negotiation state of a price offer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Countered,
}

/// Structured payload of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text chat.
    Text,
    /// Customer requests a test drive for the listing.
    TestDriveRequest { preferred_date: String },
    /// Price negotiation on the listing.
    Offer { price_cents: i64, status: OfferStatus },
}

/// A single chat message within a conversation.
///
/// Append-only once persisted; only `status` and `is_read` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender: SenderRole,
    pub text: String,
    /// RFC 3339 timestamp of when the sender produced the message.
    pub sent_at: String,
    pub is_read: bool,
    pub kind: MessageKind,
    pub status: DeliveryStatus,
}

impl ChatMessage {
    /// Convenience constructor for a plain text message, stamped now.
    pub fn text(sender: SenderRole, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            sender,
            text: text.into(),
            sent_at: chrono::Utc::now().to_rfc3339(),
            is_read: false,
            kind: MessageKind::Text,
            status: DeliveryStatus::Sending,
        }
    }
}

/// Conversation metadata as held by the durable store.
///
/// The message sequence itself is fetched separately; this carries the
/// per-side read flags, moderation state, and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_key: String,
    pub listing_id: String,
    pub customer_unread: bool,
    pub seller_unread: bool,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub created_at: String,
    pub last_message_at: String,
}

impl Conversation {
    /// Create a new conversation between a customer and a listing, stamped now.
    pub fn new(customer_email: &str, listing_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: ConversationId::new(customer_email, listing_id),
            customer_key: normalize_key(customer_email),
            listing_id: listing_id.trim().to_string(),
            customer_unread: false,
            seller_unread: false,
            flagged: false,
            flag_reason: None,
            created_at: now.clone(),
            last_message_at: now,
        }
    }
}

/// Best-effort presence snapshot for a user, cached from inbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPresence {
    pub is_online: bool,
    /// RFC 3339 timestamp of the last presence event for this user.
    pub last_seen: String,
}

/// Cache key for presence lookups: normalized identity plus role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresenceKey {
    pub identity: String,
    pub role: SenderRole,
}

impl PresenceKey {
    pub fn new(identity: &str, role: SenderRole) -> Self {
        Self {
            identity: normalize_key(identity),
            role,
        }
    }
}

/// Events flowing over the live channel, in both directions.
///
/// The transport is a named-event channel; this enum is the closed set of
/// event names and payloads the chat session understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransportEvent {
    /// The transport (re-)established its connection.
    Connected,
    /// The transport lost its connection.
    Disconnected { reason: Option<String> },
    /// Subscribe this client to a conversation's event stream.
    Join { conversation_id: ConversationId },
    /// A chat message for live delivery.
    NewMessage {
        conversation_id: ConversationId,
        message: ChatMessage,
    },
    /// Transient typing indicator.
    Typing {
        conversation_id: ConversationId,
        role: SenderRole,
        is_typing: bool,
    },
    /// Read receipt for a batch of messages.
    ReadReceipt {
        conversation_id: ConversationId,
        message_ids: Vec<MessageId>,
        role: SenderRole,
    },
    /// Presence update for a user.
    Presence {
        identity: String,
        role: SenderRole,
        is_online: bool,
        last_seen: String,
    },
    /// Live-delivery status change for a previously emitted message.
    DeliveryUpdate {
        message_id: MessageId,
        status: DeliveryStatus,
    },
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind the [`crate::ServiceAdapter`] trait.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Transport,
}
