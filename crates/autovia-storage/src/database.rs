// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The [`Database`] struct IS the single writer: query modules accept
//! `&Database` and go through `connection().call()`. Do NOT create
//! additional `Connection` instances for writes.

use autovia_core::AutoviaError;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database behind a single background writer thread.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs,
    /// and runs embedded migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, AutoviaError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        // Surface migration failures through the crate error type; the
        // closure itself only ferries a pre-rendered message out.
        conn.call(|conn| Ok(migrations::run_migrations(conn).map_err(|e| e.to_string())))
            .await
            .map_err(map_tr_err)?
            .map_err(|e| AutoviaError::Storage { source: e.into() })?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the background connection.
    pub async fn close(&self) -> Result<(), AutoviaError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the crate error type.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error) -> AutoviaError {
    AutoviaError::Storage {
        source: Box::new(err),
    }
}
