// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Autovia service layer.

use thiserror::Error;

/// The primary error type used across all Autovia adapter traits and core operations.
#[derive(Debug, Error)]
pub enum AutoviaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A requested entity does not exist. Distinct from transient storage
    /// failure so callers can branch on it.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Live-channel transport errors (connection failure, emit failure, codec).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An HTTP backend responded with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The request queue has been shut down and accepts no further work.
    #[error("request queue is shut down")]
    QueueClosed,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AutoviaError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AutoviaError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate-limit class failures (429 Too Many Requests, 503 Unavailable).
    ///
    /// These are surfaced to callers without in-queue retry: piling retries
    /// onto an already-overloaded backend makes the overload worse.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(429) | Some(503))
    }

    /// Whether the request queue may retry an action that failed with this error.
    ///
    /// Timeouts, transport failures, and generic 5xx responses are transient.
    /// Rate-limit class errors, 4xx responses, and everything non-network are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AutoviaError::Timeout { .. } => true,
            AutoviaError::Transport { .. } => true,
            AutoviaError::Api { status, .. } => (500..=599).contains(status) && *status != 503,
            _ => false,
        }
    }

    /// Structural copy for fanning one failure out to multiple waiters.
    ///
    /// Boxed sources are not `Clone`; they are flattened into their message
    /// text, which is all a waiter can act on anyway.
    pub fn duplicate(&self) -> AutoviaError {
        match self {
            AutoviaError::Config(msg) => AutoviaError::Config(msg.clone()),
            AutoviaError::Storage { source } => AutoviaError::Storage {
                source: source.to_string().into(),
            },
            AutoviaError::NotFound { resource, id } => AutoviaError::NotFound {
                resource,
                id: id.clone(),
            },
            AutoviaError::Transport { message, source } => AutoviaError::Transport {
                message: message.clone(),
                source: source.as_ref().map(|s| s.to_string().into()),
            },
            AutoviaError::Api { status, message } => AutoviaError::Api {
                status: *status,
                message: message.clone(),
            },
            AutoviaError::Timeout { duration } => AutoviaError::Timeout {
                duration: *duration,
            },
            AutoviaError::QueueClosed => AutoviaError::QueueClosed,
            AutoviaError::Internal(msg) => AutoviaError::Internal(msg.clone()),
        }
    }
}
