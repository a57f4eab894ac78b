// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable conversation store trait, implemented by the SQLite and in-memory backends.

use async_trait::async_trait;

use crate::error::AutoviaError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::{ChatMessage, Conversation, ConversationId, Participant};

/// Durable storage for conversations and their messages.
///
/// Both backends must produce the same logical shape for the same logical id:
/// implementations normalize email-derived keys on every read and write path.
///
/// `append_message` distinguishes "conversation does not exist" (a
/// [`AutoviaError::NotFound`]) from transient failure; appending never
/// upserts the conversation.
#[async_trait]
pub trait ConversationStore: ServiceAdapter {
    /// Initializes the backend (migrations, connections).
    async fn initialize(&self) -> Result<(), AutoviaError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), AutoviaError>;

    /// Creates a conversation. Fails if one with the same id already exists.
    async fn create(&self, conversation: &Conversation) -> Result<(), AutoviaError>;

    /// Looks up a conversation by id.
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AutoviaError>;

    /// Appends a message to an existing conversation, bumping
    /// `last_message_at` and raising the other side's unread flag.
    async fn append_message(
        &self,
        id: &ConversationId,
        message: &ChatMessage,
    ) -> Result<(), AutoviaError>;

    /// Returns the conversation's messages in chronological order.
    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, AutoviaError>;

    /// Clears the unread flag for one side of the conversation and marks its
    /// messages from the other side as read.
    async fn mark_read(
        &self,
        id: &ConversationId,
        side: Participant,
    ) -> Result<(), AutoviaError>;

    /// Flags a conversation for moderation review.
    async fn flag(&self, id: &ConversationId, reason: &str) -> Result<(), AutoviaError>;
}
