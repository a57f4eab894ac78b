// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for hosted environments.
//!
//! Events are JSON text frames of [`TransportEvent`]. The transport owns its
//! reconnection policy: on socket drop it pushes a `Disconnected` event to
//! the session, retries with exponential delay up to a bounded attempt
//! count, and pushes `Connected` when the socket is back so the session can
//! replay pending messages and re-join conversations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autovia_config::model::RealtimeConfig;
use autovia_core::types::{AdapterType, HealthStatus, TransportEvent};
use autovia_core::{AutoviaError, ServiceAdapter, Transport};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why the socket pump stopped.
enum PumpExit {
    /// `disconnect()` closed the outbound channel.
    LocalClose,
    /// The socket dropped or errored.
    SocketDropped(Option<String>),
}

/// WebSocket-backed [`Transport`].
pub struct WsTransport {
    url: String,
    reconnect_max_attempts: u32,
    reconnect_base_delay: Duration,
    connected: Arc<AtomicBool>,
    inbound_tx: mpsc::Sender<TransportEvent>,
    inbound_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    outbound_tx: Mutex<Option<mpsc::Sender<Message>>>,
    io_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Creates a transport for the configured endpoint.
    ///
    /// Requires `realtime.ws_url` to be set.
    pub fn new(config: &RealtimeConfig) -> Result<Self, AutoviaError> {
        let url = config.ws_url.clone().ok_or_else(|| {
            AutoviaError::Config("realtime.ws_url is required for the WebSocket transport".into())
        })?;

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        Ok(Self {
            url,
            reconnect_max_attempts: config.reconnect_max_attempts,
            reconnect_base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            connected: Arc::new(AtomicBool::new(false)),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx: Mutex::new(None),
            io_handle: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ServiceAdapter for WsTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, AutoviaError> {
        if self.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("socket not connected".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), AutoviaError> {
        self.disconnect().await
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), AutoviaError> {
        if self.is_connected() {
            return Ok(());
        }

        let (ws, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            AutoviaError::Transport {
                message: format!("websocket connect failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        *self.outbound_tx.lock().await = Some(outbound_tx);
        self.connected.store(true, Ordering::SeqCst);

        let io = IoTask {
            url: self.url.clone(),
            inbound_tx: self.inbound_tx.clone(),
            connected: Arc::clone(&self.connected),
            max_attempts: self.reconnect_max_attempts,
            base_delay: self.reconnect_base_delay,
        };
        *self.io_handle.lock().await = Some(tokio::spawn(io.run(ws, outbound_rx)));

        info!(url = %self.url, "websocket connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AutoviaError> {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the sender lets the pump finish its local-close path.
        self.outbound_tx.lock().await.take();
        if let Some(handle) = self.io_handle.lock().await.take() {
            handle.abort();
        }
        debug!("websocket disconnected");
        Ok(())
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), AutoviaError> {
        if !self.is_connected() {
            return Err(AutoviaError::Transport {
                message: "websocket not connected".into(),
                source: None,
            });
        }
        let frame = encode_event(&event)?;
        let sender = self.outbound_tx.lock().await.clone();
        match sender {
            Some(tx) => tx.send(frame).await.map_err(|_| AutoviaError::Transport {
                message: "websocket writer stopped".into(),
                source: None,
            }),
            None => Err(AutoviaError::Transport {
                message: "websocket not connected".into(),
                source: None,
            }),
        }
    }

    async fn recv(&self) -> Result<TransportEvent, AutoviaError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| AutoviaError::Transport {
            message: "websocket inbound channel closed".into(),
            source: None,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// State moved into the background socket task.
struct IoTask {
    url: String,
    inbound_tx: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    max_attempts: u32,
    base_delay: Duration,
}

impl IoTask {
    async fn run(self, mut ws: WsStream, mut outbound_rx: mpsc::Receiver<Message>) {
        loop {
            match pump(&mut ws, &mut outbound_rx, &self.inbound_tx).await {
                PumpExit::LocalClose => {
                    let _ = ws.close(None).await;
                    debug!("websocket pump closed locally");
                    return;
                }
                PumpExit::SocketDropped(reason) => {
                    self.connected.store(false, Ordering::SeqCst);
                    let _ = self
                        .inbound_tx
                        .send(TransportEvent::Disconnected {
                            reason: reason.clone(),
                        })
                        .await;
                    warn!(
                        reason = reason.as_deref().unwrap_or("unknown"),
                        "websocket dropped, attempting reconnect"
                    );
                }
            }

            match self.reconnect().await {
                Some(new_ws) => {
                    ws = new_ws;
                    self.connected.store(true, Ordering::SeqCst);
                    let _ = self.inbound_tx.send(TransportEvent::Connected).await;
                    info!(url = %self.url, "websocket reconnected");
                }
                None => {
                    warn!(
                        attempts = self.max_attempts,
                        "websocket reconnect attempts exhausted, staying degraded"
                    );
                    return;
                }
            }
        }
    }

    /// Bounded reconnection with exponential delay.
    async fn reconnect(&self) -> Option<WsStream> {
        for attempt in 0..self.max_attempts {
            tokio::time::sleep(reconnect_delay(self.base_delay, attempt)).await;
            match connect_async(self.url.as_str()).await {
                Ok((ws, _response)) => return Some(ws),
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "websocket reconnect attempt failed");
                }
            }
        }
        None
    }
}

/// Delay before reconnect attempt `attempt` (doubling, capped at 30s).
fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
        .min(Duration::from_secs(30))
}

/// Forwards outbound frames and parses inbound frames until the socket or
/// the outbound channel closes.
async fn pump(
    ws: &mut WsStream,
    outbound_rx: &mut mpsc::Receiver<Message>,
    inbound_tx: &mpsc::Sender<TransportEvent>,
) -> PumpExit {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(e) = ws.send(frame).await {
                            return PumpExit::SocketDropped(Some(e.to_string()));
                        }
                    }
                    None => return PumpExit::LocalClose,
                }
            }
            inbound = ws.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match decode_frame(text.as_ref()) {
                            Ok(event) => {
                                if inbound_tx.send(event).await.is_err() {
                                    return PumpExit::LocalClose;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "ignoring unparseable websocket frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws.send(Message::Pong(data)).await {
                            return PumpExit::SocketDropped(Some(e.to_string()));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        return PumpExit::SocketDropped(reason);
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames are not part of the protocol.
                    }
                    Some(Err(e)) => return PumpExit::SocketDropped(Some(e.to_string())),
                    None => return PumpExit::SocketDropped(None),
                }
            }
        }
    }
}

/// Serialize an event into a JSON text frame.
fn encode_event(event: &TransportEvent) -> Result<Message, AutoviaError> {
    let json = serde_json::to_string(event).map_err(|e| AutoviaError::Transport {
        message: format!("failed to encode event: {e}"),
        source: Some(Box::new(e)),
    })?;
    Ok(Message::Text(json.into()))
}

/// Parse a JSON text frame back into an event.
fn decode_frame(raw: &str) -> Result<TransportEvent, AutoviaError> {
    serde_json::from_str(raw).map_err(|e| AutoviaError::Transport {
        message: format!("failed to decode frame: {e}"),
        source: Some(Box::new(e)),
    })
}
