// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types and row-to-domain mapping.
//!
//! The canonical domain types live in `autovia-core::types`. SQLite hands
//! back untyped text columns; the row structs here carry them out of the
//! query closures so the enum/JSON parsing can fail with a proper
//! [`AutoviaError`] instead of being squeezed through rusqlite's error type.

use std::str::FromStr;

use autovia_core::types::{
    ChatMessage, Conversation, ConversationId, DeliveryStatus, MessageId, MessageKind, SenderRole,
};
use autovia_core::AutoviaError;

/// A raw `conversations` row.
#[derive(Debug, Clone)]
pub(crate) struct ConversationRow {
    pub id: String,
    pub customer_key: String,
    pub listing_id: String,
    pub customer_unread: bool,
    pub seller_unread: bool,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub created_at: String,
    pub last_message_at: String,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: ConversationId::from_string(row.id),
            customer_key: row.customer_key,
            listing_id: row.listing_id,
            customer_unread: row.customer_unread,
            seller_unread: row.seller_unread,
            flagged: row.flagged,
            flag_reason: row.flag_reason,
            created_at: row.created_at,
            last_message_at: row.last_message_at,
        }
    }
}

/// A raw `messages` row.
#[derive(Debug, Clone)]
pub(crate) struct MessageRow {
    pub id: String,
    pub sender: String,
    pub body: String,
    pub sent_at: String,
    pub is_read: bool,
    pub kind: String,
    pub status: String,
}

impl MessageRow {
    /// Parse the text columns back into their domain enums.
    pub fn into_message(self) -> Result<ChatMessage, AutoviaError> {
        let sender = SenderRole::from_str(&self.sender).map_err(|_| AutoviaError::Storage {
            source: format!("unknown sender role `{}` in messages row", self.sender).into(),
        })?;
        let status =
            DeliveryStatus::from_str(&self.status).map_err(|_| AutoviaError::Storage {
                source: format!("unknown delivery status `{}` in messages row", self.status)
                    .into(),
            })?;
        let kind: MessageKind =
            serde_json::from_str(&self.kind).map_err(|e| AutoviaError::Storage {
                source: format!("invalid message kind payload: {e}").into(),
            })?;

        Ok(ChatMessage {
            id: MessageId(self.id),
            sender,
            text: self.body,
            sent_at: self.sent_at,
            is_read: self.is_read,
            kind,
            status,
        })
    }
}

/// Serialize the structured kind column for storage.
pub(crate) fn encode_kind(kind: &MessageKind) -> Result<String, AutoviaError> {
    serde_json::to_string(kind).map_err(|e| AutoviaError::Storage {
        source: format!("failed to encode message kind: {e}").into(),
    })
}
