//! WebSocket connection management with automatic reconnection

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use types::VenueId;

use crate::input::components::current_nanos;
use crate::{AdapterError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection states for WebSocket lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected and receiving data
    Connected,
    /// Attempting to reconnect after failure
    Reconnecting,
    /// Permanent failure, manual intervention required
    Failed,
}

/// Reason for disconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Network error or timeout
    NetworkError,
    /// Venue closed the stream
    RemoteClosed,
    /// User-requested disconnection
    GracefulShutdown,
}

/// Configuration for connection management
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Message timeout (no messages received)
    pub message_timeout: Duration,
    /// Base backoff time for reconnection
    pub base_backoff_ms: u64,
    /// Maximum backoff time
    pub max_backoff_ms: u64,
    /// Maximum reconnection attempts
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            message_timeout: Duration::from_secs(30),
            base_backoff_ms: 1000,
            max_backoff_ms: 30000,
            max_reconnect_attempts: 10,
        }
    }
}

impl ConnectionConfig {
    /// Connection settings for `url` with the feed's retry policy
    pub fn for_feed(url: impl Into<String>, reconnect_attempts: u32, reconnect_delay_ms: u64) -> Self {
        let defaults = Self::default();
        Self {
            url: url.into(),
            base_backoff_ms: reconnect_delay_ms,
            max_backoff_ms: defaults.max_backoff_ms.max(reconnect_delay_ms),
            max_reconnect_attempts: reconnect_attempts,
            ..defaults
        }
    }

    /// Backoff before reconnect attempt `attempt` (1-based)
    ///
    /// Doubles per attempt with the exponent capped at 6, never exceeding `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        let backoff_ms = self.base_backoff_ms.saturating_mul(2_u64.pow(exponent));
        Duration::from_millis(backoff_ms.min(self.max_backoff_ms))
    }
}

/// WebSocket connection manager with automatic reconnection
///
/// Owned by a single provider task, so state lives in plain fields.
pub struct ConnectionManager {
    venue: VenueId,
    config: ConnectionConfig,
    state: ConnectionState,
    websocket: Option<WsStream>,
    last_message_time: u64, // Nanoseconds since epoch
    reconnect_count: u32,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(venue: VenueId, config: ConnectionConfig) -> Self {
        Self {
            venue,
            config,
            state: ConnectionState::Disconnected,
            websocket: None,
            last_message_time: current_nanos(),
            reconnect_count: 0,
        }
    }

    /// Connection settings in use
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect to the WebSocket endpoint
    pub async fn connect(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;

        tracing::info!("Connecting to {} at {}", self.venue, self.config.url);

        match timeout(self.config.connect_timeout, connect_async(self.config.url.as_str())).await {
            Ok(Ok((ws_stream, response))) => {
                tracing::info!(
                    "Connected to {} with response: {:?}",
                    self.venue,
                    response.status()
                );

                self.websocket = Some(ws_stream);
                self.state = ConnectionState::Connected;
                self.last_message_time = current_nanos();
                self.reconnect_count = 0;

                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!("WebSocket connection error for {}: {}", self.venue, e);
                self.state = ConnectionState::Disconnected;

                Err(AdapterError::ConnectionFailed {
                    venue: self.venue,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(
                    "Connection timeout for {} after {:?}",
                    self.venue,
                    self.config.connect_timeout
                );
                self.state = ConnectionState::Disconnected;

                Err(AdapterError::ConnectionTimeout {
                    venue: self.venue,
                    timeout_ms: self.config.connect_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Handle disconnection and reconnect with backoff until attempts run out
    pub async fn handle_disconnection(&mut self, reason: DisconnectReason) -> Result<()> {
        tracing::warn!("Disconnected from {} due to {:?}", self.venue, reason);

        self.websocket = None;

        if reason == DisconnectReason::GracefulShutdown {
            self.state = ConnectionState::Disconnected;
            return Ok(());
        }

        self.state = ConnectionState::Reconnecting;

        loop {
            self.reconnect_count += 1;
            if self.reconnect_count > self.config.max_reconnect_attempts {
                tracing::error!(
                    "Max reconnection attempts ({}) exceeded for {}",
                    self.config.max_reconnect_attempts,
                    self.venue
                );
                self.state = ConnectionState::Failed;

                return Err(AdapterError::MaxReconnectAttemptsExceeded {
                    venue: self.venue,
                    max_attempts: self.config.max_reconnect_attempts,
                });
            }

            let backoff = self.config.backoff(self.reconnect_count);
            tracing::info!(
                "Will reconnect to {} in {}ms (attempt {})",
                self.venue,
                backoff.as_millis(),
                self.reconnect_count
            );
            tokio::time::sleep(backoff).await;

            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.state = ConnectionState::Reconnecting;
                    tracing::warn!(
                        "Reconnect attempt {} for {} failed: {}",
                        self.reconnect_count,
                        self.venue,
                        e
                    );
                }
            }
        }
    }

    /// Send a message through the WebSocket
    pub async fn send(&mut self, message: Message) -> Result<()> {
        match self.websocket.as_mut() {
            Some(ws) => {
                ws.send(message).await.map_err(AdapterError::WebSocket)?;
                Ok(())
            }
            None => Err(self.not_connected()),
        }
    }

    /// Receive next message from WebSocket, `None` when the stream ended
    ///
    /// Fails with [`AdapterError::ConnectionTimeout`] when nothing arrives within the
    /// configured message timeout.
    pub async fn receive(&mut self) -> Result<Option<Message>> {
        let venue = self.venue;
        let message_timeout = self.config.message_timeout;
        let Some(ws) = self.websocket.as_mut() else {
            return Err(AdapterError::ConnectionFailed {
                venue,
                reason: "Not connected".to_string(),
            });
        };

        match timeout(message_timeout, ws.next()).await {
            Ok(Some(Ok(msg))) => {
                self.last_message_time = current_nanos();
                Ok(Some(msg))
            }
            Ok(Some(Err(e))) => {
                tracing::error!("WebSocket error for {}: {}", venue, e);
                Err(AdapterError::WebSocket(e))
            }
            Ok(None) => Ok(None),
            Err(_) => {
                tracing::warn!(
                    "Message timeout for {} ({}ms since last message)",
                    venue,
                    message_timeout.as_millis()
                );
                Err(AdapterError::ConnectionTimeout {
                    venue,
                    timeout_ms: message_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Milliseconds since the last received message
    pub fn idle_ms(&self) -> u64 {
        current_nanos().saturating_sub(self.last_message_time) / 1_000_000
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;

        if let Some(mut ws) = self.websocket.take() {
            if let Err(e) = ws.close(None).await {
                tracing::debug!("Close handshake with {} failed: {}", self.venue, e);
            }
        }
        Ok(())
    }

    fn not_connected(&self) -> AdapterError {
        AdapterError::ConnectionFailed {
            venue: self.venue,
            reason: "Not connected".to_string(),
        }
    }
}
