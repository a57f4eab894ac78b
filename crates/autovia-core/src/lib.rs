// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Autovia service layer.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Autovia workspace. The storage and
//! transport backends implement traits defined here.

pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::AutoviaError;
pub use keys::normalize_key;
pub use types::{
    AdapterType, ChatMessage, Conversation, ConversationId, DeliveryStatus, HealthStatus,
    MessageId, MessageKind, Participant, SenderRole, TransportEvent, UserPresence,
};

// Re-export adapter traits at crate root.
pub use traits::{ConversationStore, ServiceAdapter, Transport};
