//! # Market Data Provider
//!
//! ## Purpose
//!
//! Runs one venue feed end to end: opens the frame source, sends the subscription, then
//! decodes every inbound frame, derives features, invokes the registered callbacks and
//! publishes to the market data bus.
//!
//! ## Ownership
//!
//! [`MarketDataProvider::start`] moves the frame source, the working books, the rolling
//! statistics and the sequence counters into a single tokio task. Nothing in that task is
//! shared, so the book reconstruction path takes no lock. The only state visible from
//! other threads is [`ProviderStats`], which is atomic.
//!
//! ## Lifecycle
//!
//! ```text
//! new → initialize (connect + subscribe) → start (spawn task) → stop (signal + join)
//! ```
//!
//! Stop is cooperative: the task finishes the frame it is processing before it exits.
//! A lost connection is retried through the source's backoff policy and the subscription
//! is sent again; exhausting the retries ends the task and is reported through `on_error`.

pub mod delta;
pub mod features;
pub mod rolling_stats;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::{CanonicalTrade, OrderBookSnapshot, VenueId, BOOK_DEPTH};

use crate::input::components::current_millis;
use crate::input::{codec, BookState, DecodedFrame, FrameSource, VenueCodec};
use crate::output::{BookMessage, BookMessageKind, MarketDataBus, TradeMessage};
use crate::{AdapterError, Result};

use delta::DeltaTracker;
use features::{BookFeatures, TradeFeatures};
use rolling_stats::{RollingStats, DEFAULT_WINDOW};

/// Receiver of decoded market data; every method defaults to a no-op
///
/// Callbacks run on the provider task and should return quickly.
pub trait MarketDataCallbacks: Send + Sync {
    /// A trade was decoded
    fn on_trade(&self, _trade: &CanonicalTrade) {}

    /// A book snapshot was produced
    fn on_orderbook(&self, _book: &OrderBookSnapshot) {}

    /// A frame was rejected or the connection failed
    fn on_error(&self, _error: &str) {}
}

/// Provider counters, updated by the provider task and readable from anywhere
#[derive(Debug, Default)]
pub struct ProviderStats {
    trades_processed: AtomicU64,
    orderbooks_processed: AtomicU64,
    messages_published: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`ProviderStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderStatsSnapshot {
    /// Trades decoded
    pub trades_processed: u64,
    /// Books produced
    pub orderbooks_processed: u64,
    /// Messages handed to the bus
    pub messages_published: u64,
    /// Rejected frames, publish failures and connection errors
    pub errors: u64,
}

impl ProviderStats {
    /// Copy the current counter values
    pub fn snapshot(&self) -> ProviderStatsSnapshot {
        ProviderStatsSnapshot {
            trades_processed: self.trades_processed.load(Ordering::Relaxed),
            orderbooks_processed: self.orderbooks_processed.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn record_trade(&self) {
        self.trades_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_orderbook(&self) {
        self.orderbooks_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// How books are published on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Every book is published in full
    Snapshot,
    /// Changed levels only, with a full checkpoint every `checkpoint_every_ms` when set
    Delta {
        /// Checkpoint interval, `None` for a checkpoint only on the first book
        checkpoint_every_ms: Option<u64>,
    },
}

/// Output settings of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    /// Book publication mode
    pub mode: OutputMode,
    /// Levels per side in published books and depth features
    pub depth_levels: usize,
    /// Rolling statistics window
    pub window_size: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::Snapshot,
            depth_levels: BOOK_DEPTH,
            window_size: DEFAULT_WINDOW,
        }
    }
}

/// Streams one venue's market data
pub struct MarketDataProvider {
    venue: VenueId,
    codec: &'static VenueCodec,
    symbols: Vec<String>,
    enable_trades: bool,
    enable_orderbook: bool,
    options: OutputOptions,
    callbacks: Option<Arc<dyn MarketDataCallbacks>>,
    bus: Option<Arc<MarketDataBus>>,
    stats: Arc<ProviderStats>,
    source: Option<Box<dyn FrameSource>>,
    initialized: bool,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl MarketDataProvider {
    /// Create a provider reading `venue` frames from `source`
    pub fn new(venue: VenueId, symbols: Vec<String>, source: Box<dyn FrameSource>) -> Self {
        Self {
            venue,
            codec: codec(venue),
            symbols,
            enable_trades: true,
            enable_orderbook: true,
            options: OutputOptions::default(),
            callbacks: None,
            bus: None,
            stats: Arc::new(ProviderStats::default()),
            source: Some(source),
            initialized: false,
            shutdown: None,
            task: None,
        }
    }

    /// Select the channels to subscribe to
    pub fn set_channels(&mut self, enable_trades: bool, enable_orderbook: bool) {
        self.enable_trades = enable_trades;
        self.enable_orderbook = enable_orderbook;
    }

    /// Apply output settings; takes effect on the next start
    pub fn configure_outputs(&mut self, options: OutputOptions) {
        self.options = OutputOptions {
            depth_levels: options.depth_levels.clamp(1, BOOK_DEPTH),
            window_size: options.window_size.max(1),
            ..options
        };
    }

    /// Register callbacks
    pub fn set_callbacks(&mut self, callbacks: Arc<dyn MarketDataCallbacks>) {
        self.callbacks = Some(callbacks);
    }

    /// Publish to `bus`
    pub fn set_bus(&mut self, bus: Arc<MarketDataBus>) {
        self.bus = Some(bus);
    }

    /// Venue served
    pub fn venue(&self) -> VenueId {
        self.venue
    }

    /// Configured symbols
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<ProviderStats> {
        Arc::clone(&self.stats)
    }

    /// True while the provider task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Subscription request this provider sends
    pub fn subscription(&self) -> String {
        self.codec
            .subscription(&self.symbols, self.enable_trades, self.enable_orderbook)
    }

    /// Connect the source and send the subscription
    pub async fn initialize(&mut self) -> Result<()> {
        let subscription = self.subscription();
        let venue = self.venue;

        let result = match self.source.as_mut() {
            Some(source) => match source.connect().await {
                Ok(()) => {
                    info!("Subscribing to {} for {} symbols", venue, self.symbols.len());
                    debug!("{} subscription: {}", venue, subscription);
                    source.send_text(subscription).await
                }
                Err(e) => Err(e),
            },
            None => Err(AdapterError::Configuration("provider already started".to_string())),
        };

        match result {
            Ok(()) => {
                self.initialized = true;
                Ok(())
            }
            Err(e) => {
                let err = AdapterError::Initialization {
                    venue,
                    reason: e.to_string(),
                };
                error!("{}", err);
                self.stats.record_error();
                if let Some(callbacks) = &self.callbacks {
                    callbacks.on_error(&err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Spawn the provider task; a second call while running is a no-op
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            warn!("{} provider already started", self.venue);
            return Ok(());
        }
        if !self.initialized {
            return Err(AdapterError::Initialization {
                venue: self.venue,
                reason: "start called before initialize".to_string(),
            });
        }
        let Some(source) = self.source.take() else {
            return Err(AdapterError::Initialization {
                venue: self.venue,
                reason: "frame source already consumed".to_string(),
            });
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let delta = match self.options.mode {
            OutputMode::Snapshot => None,
            OutputMode::Delta { checkpoint_every_ms } => Some(DeltaTracker::new(checkpoint_every_ms)),
        };

        let task = ProviderTask {
            venue: self.venue,
            codec: self.codec,
            subscription: self.subscription(),
            source,
            books: BookState::with_depth(BOOK_DEPTH),
            trade_stats: HashMap::new(),
            book_stats: HashMap::new(),
            sequences: HashMap::new(),
            delta,
            options: self.options,
            callbacks: self.callbacks.clone(),
            bus: self.bus.clone(),
            stats: Arc::clone(&self.stats),
        };

        info!("Market data provider started for {} with {} symbols", self.venue, self.symbols.len());
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(task.run(shutdown_rx)));
        Ok(())
    }

    /// Stop the provider task and wait for it; a second call is a no-op
    pub async fn stop(&mut self) {
        // The task holds the other handle; the bus closes once both are gone.
        self.bus = None;
        let Some(task) = self.task.take() else {
            return;
        };

        info!("Stopping market data provider for {}", self.venue);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Err(e) = task.await {
            error!("{} provider task failed: {}", self.venue, e);
        }

        let stats = self.stats.snapshot();
        info!(
            "{} final stats - Trades: {}, OrderBooks: {}, Published: {}, Errors: {}",
            self.venue,
            stats.trades_processed,
            stats.orderbooks_processed,
            stats.messages_published,
            stats.errors
        );
    }
}

impl Drop for MarketDataProvider {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State owned by the running provider task
struct ProviderTask {
    venue: VenueId,
    codec: &'static VenueCodec,
    subscription: String,
    source: Box<dyn FrameSource>,
    books: BookState,
    trade_stats: HashMap<String, RollingStats>,
    book_stats: HashMap<String, RollingStats>,
    sequences: HashMap<String, u64>,
    delta: Option<DeltaTracker>,
    options: OutputOptions,
    callbacks: Option<Arc<dyn MarketDataCallbacks>>,
    bus: Option<Arc<MarketDataBus>>,
    stats: Arc<ProviderStats>,
}

impl ProviderTask {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Only the wait for the next frame is interruptible; a frame already received
            // is always processed to completion.
            let frame = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                frame = self.source.next_frame() => frame,
            };

            let failure = match frame {
                Ok(Some(raw)) => {
                    self.handle_frame(&raw);
                    continue;
                }
                Ok(None) => format!("{} stream ended", self.venue),
                Err(e) => e.to_string(),
            };

            if *shutdown.borrow() {
                break;
            }

            let recovered = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                recovered = self.recover(&failure) => recovered,
            };
            if !recovered {
                break;
            }
        }

        if let Err(e) = self.source.close().await {
            debug!("Closing {} source failed: {}", self.venue, e);
        }
        info!("Market data provider task for {} exited", self.venue);
    }

    fn handle_frame(&mut self, raw: &str) {
        let frame = self.codec.decode_frame(raw, &mut self.books);
        debug!("{} frame classified {:?}", self.venue, frame.classification());

        match frame {
            DecodedFrame::Trade(trade) => {
                self.stats.record_trade();
                self.emit_trade(&trade);
            }
            DecodedFrame::Book(book) => {
                self.stats.record_orderbook();
                self.emit_book(&book);
            }
            DecodedFrame::Heartbeat | DecodedFrame::Unknown => {}
            DecodedFrame::Error(e) => {
                self.stats.record_error();
                self.report_error(&e.to_string());
            }
        }
    }

    fn emit_trade(&mut self, trade: &CanonicalTrade) {
        let window = self.options.window_size;
        let rolling = self
            .trade_stats
            .entry(trade.symbol.clone())
            .or_insert_with(|| RollingStats::new(window));
        let features = TradeFeatures::compute(trade, rolling);

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_trade(trade);
        }

        let Some(bus) = self.bus.clone() else {
            return;
        };
        let sequence = self.next_sequence("trades", &trade.symbol);
        let message = TradeMessage::new(trade, sequence, features);
        match bus.publish_trade(&message) {
            Ok(()) => self.stats.record_published(),
            Err(e) => {
                warn!("{} trade publish failed: {}", self.venue, e);
                self.stats.record_error();
            }
        }
    }

    fn emit_book(&mut self, book: &OrderBookSnapshot) {
        let window = self.options.window_size;
        let depth = self.options.depth_levels;
        let rolling = self
            .book_stats
            .entry(book.symbol.clone())
            .or_insert_with(|| RollingStats::new(window));
        let features = BookFeatures::compute(book, depth, rolling);

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_orderbook(book);
        }

        let Some(bus) = self.bus.clone() else {
            return;
        };

        let (kind, bids, asks) = match self.delta.as_mut() {
            None => (
                BookMessageKind::Snapshot,
                book.bids.iter().take(depth).copied().collect(),
                book.asks.iter().take(depth).copied().collect(),
            ),
            Some(tracker) => match tracker.next(book, depth, current_millis()) {
                Some(update) => (update.kind, update.bids, update.asks),
                None => return,
            },
        };

        let sequence = self.next_sequence("books", &book.symbol);
        let message = BookMessage::new(book, sequence, kind, bids, asks, features);
        match bus.publish_book(&message) {
            Ok(()) => self.stats.record_published(),
            Err(e) => {
                warn!("{} book publish failed: {}", self.venue, e);
                self.stats.record_error();
            }
        }
    }

    /// Sequence numbers are per `exchange:stream:symbol` and start at 1
    fn next_sequence(&mut self, stream: &str, symbol: &str) -> u64 {
        let key = format!("{}:{}:{}", self.venue, stream, symbol);
        let counter = self.sequences.entry(key).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Reconnect and resubscribe, `false` when the source gave up
    async fn recover(&mut self, failure: &str) -> bool {
        warn!("{} connection lost: {}", self.venue, failure);
        self.stats.record_error();
        self.report_error(failure);

        if let Err(e) = self.source.reconnect().await {
            error!("{} reconnect failed, provider stopping: {}", self.venue, e);
            self.stats.record_error();
            self.report_error(&e.to_string());
            return false;
        }

        // Venue state restarts from the new subscription snapshot
        self.books.clear();
        if let Some(tracker) = self.delta.as_mut() {
            tracker.clear();
        }

        if let Err(e) = self.source.send_text(self.subscription.clone()).await {
            warn!("{} resubscribe failed: {}", self.venue, e);
            self.stats.record_error();
            self.report_error(&e.to_string());
        } else {
            info!("{} reconnected and resubscribed", self.venue);
        }
        true
    }

    fn report_error(&self, message: &str) {
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_error(message);
        }
    }
}
