//! # Market Feed - Multi-Venue Market Data Ingestion
//!
//! ## Purpose
//!
//! Connects to cryptocurrency venues, decodes their heterogeneous wire formats into one
//! canonical trade and order book model, reconstructs books from incremental deltas where a
//! venue only streams changes, and republishes everything with derived features on a
//! topic-framed TCP bus.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Bybit, Binance, dYdX v4 and Hyperliquid WebSockets, Uniswap v4 logs
//!   through an Ethereum JSON-RPC WebSocket
//! - **Output Destinations**: trades and books bus endpoints plus in-process
//!   [`MarketDataCallbacks`]
//! - **Configuration**: TOML file with `MARKET_FEED_*` environment overrides
//! - **Error Handling**: malformed frames are classified and dropped; connection loss is
//!   retried with exponential backoff
//!
//! ## Architecture Role
//!
//! ```text
//! Venue WebSocket ─→ FrameSource ─→ VenueCodec::decode ─→ DecodedFrame
//!                                        ↑                    │
//!                                   BookState (dYdX)          ├─→ features ─→ MarketDataBus
//!                                                             └─→ MarketDataCallbacks
//!
//! FeedHandler ── owns ──→ MarketDataProvider (one task per feed) + MarketDataBus
//! ```
//!
//! ## Codec Principles
//!
//! ### Codecs ARE:
//! - **Stateless functions**: raw text in, [`DecodedFrame`] out
//! - **Fail-closed**: a missing required field is an error, never a half-filled event
//! - **Side-effect free on error**: a rejected delta batch leaves the working book untouched
//!
//! ### Codecs are NOT:
//! - **Connection owners** (that is [`ConnectionManager`])
//! - **Feature calculators** (that is the provider)
//!
//! ## Examples
//!
//! ```rust,no_run
//! use market_feed::{ExchangeConfig, FeedHandler, FeedHandlerConfig};
//!
//! # async fn run() -> market_feed::Result<()> {
//! let mut handler = FeedHandler::new(FeedHandlerConfig::default());
//! handler.add_feed(ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]), None)?;
//! handler.start().await?;
//!
//! for feed in handler.get_stats() {
//!     println!("{}: {} received", feed.exchange, feed.messages_received);
//! }
//!
//! handler.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod feed_handler;
pub mod input;
pub mod output;
pub mod provider;

pub use config::{ExchangeConfig, FeedHandlerConfig};
pub use error::{AdapterError, Result};
pub use feed_handler::{FeedHandler, FeedStats};
pub use input::{
    codec, BookState, ConnectionConfig, ConnectionManager, ConnectionState, DecodedFrame,
    FrameSource, VenueCodec, WebSocketSource,
};
pub use output::{BookMessage, BookMessageKind, BusPublisher, MarketDataBus, TradeMessage};
pub use provider::{
    MarketDataCallbacks, MarketDataProvider, OutputMode, OutputOptions, ProviderStats,
    ProviderStatsSnapshot,
};

// Re-export canonical types for convenience
pub use types::{
    CanonicalTrade, MessageClassification, OrderBookSnapshot, PriceLevel, Side, VenueId,
    BOOK_DEPTH,
};
