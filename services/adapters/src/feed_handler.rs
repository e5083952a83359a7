//! # Feed Handler
//!
//! Supervises one [`MarketDataProvider`] per configured feed and owns the market data bus
//! they all publish to.
//!
//! ```text
//! STOPPED ──start()──→ RUNNING ──stop()──→ STOPPED
//! ```
//!
//! Feeds are added while stopped. `start` binds the bus, then initializes and starts every
//! provider in registration order. A feed that fails to initialize is logged and skipped so
//! one bad venue never keeps the others from streaming. Double start and double stop are
//! no-ops.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use types::VenueId;

use crate::config::{ExchangeConfig, FeedHandlerConfig};
use crate::input::{FrameSource, WebSocketSource};
use crate::output::MarketDataBus;
use crate::provider::{MarketDataCallbacks, MarketDataProvider};
use crate::{AdapterError, Result};

/// Per-feed counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    /// Venue name
    pub exchange: String,
    /// Trades and books decoded
    pub messages_received: u64,
    /// Messages handed to the bus
    pub messages_published: u64,
    /// Errors seen by the provider
    pub errors: u64,
}

/// Runs every configured feed
pub struct FeedHandler {
    config: FeedHandlerConfig,
    providers: Vec<MarketDataProvider>,
    bus: Option<Arc<MarketDataBus>>,
    running: AtomicBool,
}

impl FeedHandler {
    /// Create a stopped handler with no feeds
    pub fn new(config: FeedHandlerConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            bus: None,
            running: AtomicBool::new(false),
        }
    }

    /// Add every feed listed in the handler configuration
    pub fn add_configured_feeds(&mut self) -> Result<()> {
        for feed in self.config.feeds.clone() {
            self.add_feed(feed, None)?;
        }
        Ok(())
    }

    /// Add a feed streaming from the venue's WebSocket endpoint
    pub fn add_feed(
        &mut self,
        feed: ExchangeConfig,
        callbacks: Option<Arc<dyn MarketDataCallbacks>>,
    ) -> Result<()> {
        let venue = self.check_feed(&feed)?;
        let source = WebSocketSource::new(venue, feed.connection_config(venue));
        self.register(venue, feed, Box::new(source), callbacks);
        Ok(())
    }

    /// Add a feed reading from an arbitrary frame source
    pub fn add_feed_with_source(
        &mut self,
        feed: ExchangeConfig,
        source: Box<dyn FrameSource>,
        callbacks: Option<Arc<dyn MarketDataCallbacks>>,
    ) -> Result<()> {
        let venue = self.check_feed(&feed)?;
        self.register(venue, feed, source, callbacks);
        Ok(())
    }

    fn check_feed(&self, feed: &ExchangeConfig) -> Result<VenueId> {
        if self.is_running() {
            return Err(AdapterError::Configuration(format!(
                "cannot add feed {} while running",
                feed.name
            )));
        }
        let venue = feed.venue()?;
        feed.validate().map_err(AdapterError::Configuration)?;
        Ok(venue)
    }

    fn register(
        &mut self,
        venue: VenueId,
        feed: ExchangeConfig,
        source: Box<dyn FrameSource>,
        callbacks: Option<Arc<dyn MarketDataCallbacks>>,
    ) {
        let mut provider = MarketDataProvider::new(venue, feed.symbols, source);
        provider.set_channels(feed.enable_trades, feed.enable_orderbook);
        provider.configure_outputs(self.config.output_options());
        if let Some(callbacks) = callbacks {
            provider.set_callbacks(callbacks);
        }

        info!("Added {} feed with {} symbols", venue, provider.symbols().len());
        self.providers.push(provider);
    }

    /// Bind the bus and start every feed
    ///
    /// Only a bus bind failure is an error; feeds that fail to initialize are skipped.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Feed handler already running");
            return Ok(());
        }

        if self.config.enable_bus && self.bus.is_none() {
            match MarketDataBus::bind(self.config.trades_port, self.config.books_port).await {
                Ok(bus) => self.bus = Some(Arc::new(bus)),
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    error!("Failed to bind market data bus: {}", e);
                    return Err(e);
                }
            }
        }

        let mut started = 0;
        for provider in &mut self.providers {
            if let Some(bus) = &self.bus {
                provider.set_bus(Arc::clone(bus));
            }

            if let Err(e) = provider.initialize().await {
                error!("Skipping {} feed: {}", provider.venue(), e);
                continue;
            }

            match provider.start() {
                Ok(()) => started += 1,
                Err(e) => error!("Skipping {} feed: {}", provider.venue(), e),
            }
        }

        info!("Feed handler started {}/{} feeds", started, self.providers.len());
        Ok(())
    }

    /// Stop every feed and release the bus
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping feed handler");
        for provider in &mut self.providers {
            provider.stop().await;
        }
        self.bus = None;
        info!("Feed handler stopped");
    }

    /// True between start and stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registered feeds
    pub fn num_feeds(&self) -> usize {
        self.providers.len()
    }

    /// Market data bus while running with the bus enabled
    pub fn bus(&self) -> Option<&MarketDataBus> {
        self.bus.as_deref()
    }

    /// Counters of every feed in registration order
    pub fn get_stats(&self) -> Vec<FeedStats> {
        self.providers
            .iter()
            .map(|provider| {
                let stats = provider.stats().snapshot();
                FeedStats {
                    exchange: provider.venue().to_string(),
                    messages_received: stats.trades_processed + stats.orderbooks_processed,
                    messages_published: stats.messages_published,
                    errors: stats.errors,
                }
            })
            .collect()
    }
}
