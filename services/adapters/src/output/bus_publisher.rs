//! TCP fan-out publisher for the market data bus
//!
//! Subscribers connect over TCP and receive every frame published after they connected.
//! Each frame is one line, `<topic> <json>\n`, so consumers can filter on the topic prefix
//! without parsing the payload. A subscriber that falls behind the channel capacity loses
//! the oldest frames and is told so in the log, it never blocks the publisher.

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Result;

/// Frames buffered per subscriber before it starts lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Pause after a failed accept, e.g. when the process is out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One bus endpoint
pub struct BusPublisher {
    name: &'static str,
    local_addr: SocketAddr,
    sender: broadcast::Sender<Arc<str>>,
    messages_sent: AtomicU64,
    accept_task: JoinHandle<()>,
}

impl BusPublisher {
    /// Bind `0.0.0.0:port` and start accepting subscribers; port `0` picks a free port
    pub async fn bind(name: &'static str, port: u16) -> Result<Self> {
        Self::bind_addr(name, SocketAddr::from(([0, 0, 0, 0], port)), DEFAULT_CHANNEL_CAPACITY).await
    }

    /// Bind an explicit address with a given per-subscriber capacity
    pub async fn bind_addr(name: &'static str, addr: SocketAddr, capacity: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (sender, _) = broadcast::channel(capacity.max(1));

        info!("{} bus listening on {}", name, local_addr);

        let accept_task = tokio::spawn(Self::accept_loop(name, listener, sender.clone()));

        Ok(Self {
            name,
            local_addr,
            sender,
            messages_sent: AtomicU64::new(0),
            accept_task,
        })
    }

    async fn accept_loop(name: &'static str, listener: TcpListener, sender: broadcast::Sender<Arc<str>>) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("{} bus subscriber connected from {}", name, peer);
                    let receiver = sender.subscribe();
                    tokio::spawn(async move {
                        Self::serve_subscriber(name, stream, receiver).await;
                        info!("{} bus subscriber {} disconnected", name, peer);
                    });
                }
                Err(e) => {
                    error!("{} bus failed to accept connection: {}", name, e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    async fn serve_subscriber(
        name: &'static str,
        mut stream: TcpStream,
        mut receiver: broadcast::Receiver<Arc<str>>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(frame) => {
                    if let Err(e) = stream.write_all(frame.as_bytes()).await {
                        debug!("{} bus write failed: {}", name, e);
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{} bus subscriber lagging, dropped {} frames", name, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Serialize `payload` and publish it under `topic`
    ///
    /// Publishing with no subscriber connected succeeds and still counts as sent.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        self.publish_frame(format!("{} {}\n", topic, json));
        Ok(())
    }

    /// Publish a pre-built frame
    pub fn publish_frame(&self, frame: String) {
        // Err only means nobody is subscribed right now
        let _ = self.sender.send(Arc::from(frame));
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bus name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Frames published since bind
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

impl Drop for BusPublisher {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
