// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use autovia_core::types::{Conversation, ConversationId, Participant};
use autovia_core::AutoviaError;
use rusqlite::params;

use crate::database::Database;
use crate::models::ConversationRow;

/// Insert a new conversation. Fails on a duplicate id.
pub async fn create(db: &Database, conversation: &Conversation) -> Result<(), AutoviaError> {
    let conv = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (id, customer_key, listing_id, customer_unread, seller_unread,
                  flagged, flag_reason, created_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    conv.id.as_str(),
                    conv.customer_key,
                    conv.listing_id,
                    conv.customer_unread,
                    conv.seller_unread,
                    conv.flagged,
                    conv.flag_reason,
                    conv.created_at,
                    conv.last_message_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look a conversation up by id.
pub async fn find_by_id(
    db: &Database,
    id: &ConversationId,
) -> Result<Option<Conversation>, AutoviaError> {
    let id = id.as_str().to_string();
    let row = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, customer_key, listing_id, customer_unread, seller_unread,
                        flagged, flag_reason, created_at, last_message_at
                 FROM conversations WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                Ok(ConversationRow {
                    id: row.get(0)?,
                    customer_key: row.get(1)?,
                    listing_id: row.get(2)?,
                    customer_unread: row.get(3)?,
                    seller_unread: row.get(4)?,
                    flagged: row.get(5)?,
                    flag_reason: row.get(6)?,
                    created_at: row.get(7)?,
                    last_message_at: row.get(8)?,
                })
            });
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    Ok(row.map(Conversation::from))
}

/// Clear the unread flag for one side and mark the other side's messages read.
///
/// Returns `NotFound` if the conversation does not exist.
pub async fn mark_read(
    db: &Database,
    id: &ConversationId,
    side: Participant,
) -> Result<(), AutoviaError> {
    let conv_id = id.as_str().to_string();
    let (unread_column, other_sender) = match side {
        Participant::Customer => ("customer_unread", "seller"),
        Participant::Seller => ("seller_unread", "customer"),
    };

    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                &format!("UPDATE conversations SET {unread_column} = 0 WHERE id = ?1"),
                params![conv_id],
            )?;
            if updated > 0 {
                tx.execute(
                    "UPDATE messages SET is_read = 1
                     WHERE conversation_id = ?1 AND sender = ?2",
                    params![conv_id, other_sender],
                )?;
            }
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if updated == 0 {
        return Err(AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Flag a conversation for moderation review.
///
/// Returns `NotFound` if the conversation does not exist.
pub async fn flag(db: &Database, id: &ConversationId, reason: &str) -> Result<(), AutoviaError> {
    let conv_id = id.as_str().to_string();
    let reason = reason.to_string();

    let updated = db
        .connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE conversations SET flagged = 1, flag_reason = ?2 WHERE id = ?1",
                params![conv_id, reason],
            )?;
            Ok(updated)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if updated == 0 {
        return Err(AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        });
    }
    Ok(())
}
