// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by the storage and transport backends.

use async_trait::async_trait;

use crate::error::AutoviaError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for swappable Autovia backends.
///
/// Every backend (conversation store, live transport) implements this trait,
/// which provides identity, lifecycle, and health check capabilities.
#[async_trait]
pub trait ServiceAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the type of adapter (store or transport).
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, AutoviaError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), AutoviaError>;
}
