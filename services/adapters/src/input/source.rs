//! Frame sources feeding a market data provider
//!
//! [`FrameSource`] is the provider's only I/O dependency: it yields raw text frames and accepts
//! the subscription request. [`WebSocketSource`] is the production implementation.

use async_trait::async_trait;
use tokio_tungstenite::tungstenite::Message;
use types::VenueId;

use crate::input::connection::{ConnectionConfig, ConnectionManager, DisconnectReason};
use crate::Result;

/// Transport delivering raw text frames from one venue
#[async_trait]
pub trait FrameSource: Send {
    /// Open the transport
    async fn connect(&mut self) -> Result<()>;

    /// Send one text frame (subscription requests)
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text frame, `Ok(None)` once the remote side ended the stream
    async fn next_frame(&mut self) -> Result<Option<String>>;

    /// Re-establish the transport after a failure, applying the retry policy
    async fn reconnect(&mut self) -> Result<()>;

    /// Close the transport
    async fn close(&mut self) -> Result<()>;
}

/// WebSocket frame source with reconnection
pub struct WebSocketSource {
    venue: VenueId,
    connection: ConnectionManager,
}

impl WebSocketSource {
    /// Create a source for `venue` using `config`
    pub fn new(venue: VenueId, config: ConnectionConfig) -> Self {
        Self {
            venue,
            connection: ConnectionManager::new(venue, config),
        }
    }

    /// Underlying connection manager
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn connect(&mut self) -> Result<()> {
        self.connection.connect().await
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.connection.send(Message::Text(text)).await
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            let Some(message) = self.connection.receive().await? else {
                return Ok(None);
            };

            match message {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame from {}", self.venue),
                },
                Message::Ping(payload) => {
                    self.connection.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    tracing::info!("{} closed the stream: {:?}", self.venue, frame);
                    return Ok(None);
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.connection
            .handle_disconnection(DisconnectReason::NetworkError)
            .await
    }

    async fn close(&mut self) -> Result<()> {
        self.connection.close().await
    }
}
