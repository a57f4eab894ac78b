// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock live-channel transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with injectable inbound events and
//! captured outbound events for assertion in tests. Connection behavior is
//! scriptable: connect failure, connect latency, and forced connected-flag
//! changes to simulate transport drops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use autovia_core::types::{AdapterType, HealthStatus, TransportEvent};
use autovia_core::{AutoviaError, ServiceAdapter, Transport};

/// A scriptable mock transport.
///
/// Two queues drive it:
/// - **inbound**: events injected via [`inject_event`](Self::inject_event)
///   are returned by `recv()`
/// - **emitted**: events passed to `emit()` are captured and retrievable via
///   [`emitted_events`](Self::emitted_events)
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_emit: AtomicBool,
    connect_delay_ms: AtomicU64,
    connect_attempts: AtomicUsize,
    emitted: Mutex<Vec<TransportEvent>>,
    inbound: Mutex<VecDeque<TransportEvent>>,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `emit` calls fail even while connected.
    pub fn set_fail_emit(&self, fail: bool) {
        self.fail_emit.store(fail, Ordering::SeqCst);
    }

    /// Delay `connect` by the given duration (to exercise overlapping calls).
    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Force the connected flag without going through connect/disconnect,
    /// simulating a transport-level drop or recovery.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of times `connect` was called.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Inject an inbound event; the next `recv()` returns it.
    pub async fn inject_event(&self, event: TransportEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// All events emitted through this transport, in order.
    pub async fn emitted_events(&self) -> Vec<TransportEvent> {
        self.emitted.lock().await.clone()
    }

    /// Count of emitted events matching a predicate.
    pub async fn emitted_count(&self, predicate: impl Fn(&TransportEvent) -> bool) -> usize {
        self.emitted.lock().await.iter().filter(|e| predicate(e)).count()
    }

    /// Clear the captured emitted events.
    pub async fn clear_emitted(&self) {
        self.emitted.lock().await.clear();
    }
}

#[async_trait]
impl ServiceAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), AutoviaError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(AutoviaError::Transport {
                message: "mock connect refused".into(),
                source: None,
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AutoviaError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), AutoviaError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(AutoviaError::Transport {
                message: "mock transport not connected".into(),
                source: None,
            });
        }
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(AutoviaError::Transport {
                message: "mock emit refused".into(),
                source: None,
            });
        }
        self.emitted.lock().await.push(event);
        Ok(())
    }

    async fn recv(&self) -> Result<TransportEvent, AutoviaError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            self.notify.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
