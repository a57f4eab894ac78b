// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-channel transport trait for real-time chat delivery.

use async_trait::async_trait;

use crate::error::AutoviaError;
use crate::traits::adapter::ServiceAdapter;
use crate::types::TransportEvent;

/// A bidirectional named-event channel used for best-effort live delivery.
///
/// The transport is distinct from durable storage: nothing user-visible may
/// depend on it being available. Implementations use interior mutability so a
/// shared handle can connect and emit concurrently; reconnection policy
/// (bounded attempts) is the transport's own concern.
#[async_trait]
pub trait Transport: ServiceAdapter {
    /// Establishes the channel. Must be safe to call on an already-connected
    /// transport (no-op).
    async fn connect(&self) -> Result<(), AutoviaError>;

    /// Tears the channel down. Subsequent `recv` calls return an error.
    async fn disconnect(&self) -> Result<(), AutoviaError>;

    /// Emits an event to the other side. Fails if not connected.
    async fn emit(&self, event: TransportEvent) -> Result<(), AutoviaError>;

    /// Receives the next inbound event, waiting until one arrives.
    async fn recv(&self) -> Result<TransportEvent, AutoviaError>;

    /// Whether the channel is currently established.
    fn is_connected(&self) -> bool;
}
