// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime chat for the Autovia service layer.
//!
//! [`ChatSession`] multiplexes a live transport for message delivery, typing
//! indicators, read receipts, and presence, with durable persistence always
//! independent of transport availability. [`WsTransport`] is the production
//! WebSocket transport; tests use the mock transport from
//! `autovia-test-utils`.

pub mod events;
pub mod offline;
pub mod pending;
pub mod presence;
pub mod session;
pub mod typing;
pub mod ws;

pub use events::{ChatEvent, ConnectionState};
pub use offline::OfflineTransport;
pub use session::{ChatSession, SendOutcome};
pub use ws::WsTransport;
