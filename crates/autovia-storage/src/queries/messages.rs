// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and listing operations.

use autovia_core::types::{ChatMessage, ConversationId, SenderRole};
use autovia_core::AutoviaError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{encode_kind, MessageRow};

/// Append a message to an existing conversation.
///
/// Runs in one transaction: existence check, message insert, and the
/// conversation's `last_message_at` / unread-flag update. Appending to a
/// missing conversation is `NotFound`, never an upsert.
pub async fn append(
    db: &Database,
    id: &ConversationId,
    message: &ChatMessage,
) -> Result<(), AutoviaError> {
    let conv_id = id.as_str().to_string();
    let msg = message.clone();
    let kind = encode_kind(&message.kind)?;
    // A customer message raises the seller's unread flag and vice versa.
    let unread_column = match message.sender {
        SenderRole::Customer => Some("seller_unread"),
        SenderRole::Seller => Some("customer_unread"),
        SenderRole::System => None,
    };

    let existed = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1",
                    params![conv_id],
                    |_| Ok(true),
                )
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(false),
                    other => Err(other),
                })?;

            if exists {
                tx.execute(
                    "INSERT INTO messages
                     (id, conversation_id, sender, body, sent_at, is_read, kind, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        msg.id.0,
                        conv_id,
                        msg.sender.to_string(),
                        msg.text,
                        msg.sent_at,
                        msg.is_read,
                        kind,
                        msg.status.to_string(),
                    ],
                )?;
                match unread_column {
                    Some(column) => {
                        tx.execute(
                            &format!(
                                "UPDATE conversations
                                 SET last_message_at = ?2, {column} = 1
                                 WHERE id = ?1"
                            ),
                            params![conv_id, msg.sent_at],
                        )?;
                    }
                    None => {
                        tx.execute(
                            "UPDATE conversations SET last_message_at = ?2 WHERE id = ?1",
                            params![conv_id, msg.sent_at],
                        )?;
                    }
                }
            }

            tx.commit()?;
            Ok(exists)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if !existed {
        return Err(AutoviaError::NotFound {
            resource: "conversation",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// List a conversation's messages in chronological order.
pub async fn list(
    db: &Database,
    id: &ConversationId,
    limit: Option<i64>,
) -> Result<Vec<ChatMessage>, AutoviaError> {
    let conv_id = id.as_str().to_string();
    let rows = db
        .connection()
        .call(move |conn| {
            let sql = match limit {
                Some(_) => {
                    "SELECT id, sender, body, sent_at, is_read, kind, status
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY sent_at ASC, rowid ASC LIMIT ?2"
                }
                None => {
                    "SELECT id, sender, body, sent_at, is_read, kind, status
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY sent_at ASC, rowid ASC"
                }
            };
            let mut stmt = conn.prepare(sql)?;
            let map_row = |row: &rusqlite::Row<'_>| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    sender: row.get(1)?,
                    body: row.get(2)?,
                    sent_at: row.get(3)?,
                    is_read: row.get(4)?,
                    kind: row.get(5)?,
                    status: row.get(6)?,
                })
            };

            let mut rows = Vec::new();
            match limit {
                Some(lim) => {
                    let mapped = stmt.query_map(params![conv_id, lim], map_row)?;
                    for row in mapped {
                        rows.push(row?);
                    }
                }
                None => {
                    let mapped = stmt.query_map(params![conv_id], map_row)?;
                    for row in mapped {
                        rows.push(row?);
                    }
                }
            }
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    rows.into_iter().map(MessageRow::into_message).collect()
}
