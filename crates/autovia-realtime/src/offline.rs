// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! No-op transport for deployments without a realtime endpoint.
//!
//! Connecting always fails, which the chat session treats as its supported
//! degraded mode: message persistence keeps working, live delivery is
//! buffered until a real transport exists.

use async_trait::async_trait;
use autovia_core::types::{AdapterType, HealthStatus, TransportEvent};
use autovia_core::{AutoviaError, ServiceAdapter, Transport};

/// Transport used when `realtime.ws_url` is not configured.
#[derive(Default)]
pub struct OfflineTransport;

impl OfflineTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceAdapter for OfflineTransport {
    fn name(&self) -> &str {
        "offline"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        Ok(HealthStatus::Degraded("no realtime endpoint configured".into()))
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for OfflineTransport {
    async fn connect(&self) -> Result<(), AutoviaError> {
        Err(AutoviaError::Transport {
            message: "no realtime endpoint configured".into(),
            source: None,
        })
    }

    async fn disconnect(&self) -> Result<(), AutoviaError> {
        Ok(())
    }

    async fn emit(&self, _event: TransportEvent) -> Result<(), AutoviaError> {
        Err(AutoviaError::Transport {
            message: "no realtime endpoint configured".into(),
            source: None,
        })
    }

    async fn recv(&self) -> Result<TransportEvent, AutoviaError> {
        // Nothing ever arrives; park until the caller is dropped.
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_always_fails() {
        let transport = OfflineTransport::new();
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn health_is_degraded() {
        let transport = OfflineTransport::new();
        assert!(matches!(
            transport.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
