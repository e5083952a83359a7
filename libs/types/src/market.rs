//! Canonical trade and order book events
//!
//! Every adapter produces these types and nothing downstream ever sees a venue-specific
//! structure. Prices and quantities are `f64` because the consumers (feature computation,
//! the trading engine) work in floating point; exact decimal handling is confined to the
//! book reconstructor's price keys.

use serde::{Deserialize, Serialize};

use crate::VenueId;

/// Maximum number of price levels retained per book side
pub const BOOK_DEPTH: usize = 10;

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer was the aggressor
    Buy,
    /// Seller was the aggressor
    Sell,
}

impl Side {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageClassification {
    /// A trade was decoded
    Trade,
    /// An order book snapshot was produced
    Book,
    /// Control, acknowledgment or connection-status frame
    Heartbeat,
    /// Unparsable or not actionable
    Unknown,
    /// Parsed, but required fields were missing or mistyped
    Error,
}

/// One price level of an order book side
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    pub price: f64,
    /// Resting quantity at the price
    pub quantity: f64,
}

impl PriceLevel {
    /// Create a price level
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// A level is publishable only with a finite positive price and quantity
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.quantity.is_finite() && self.price > 0.0 && self.quantity > 0.0
    }
}

/// Trade normalized from any venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrade {
    /// Venue the trade was observed on
    pub exchange: VenueId,
    /// Canonical `BASE-QUOTE` or `BASE-QUOTE-PERP` symbol
    pub symbol: String,
    /// Execution price
    pub price: f64,
    /// Executed quantity
    pub amount: f64,
    /// Aggressor side
    pub side: Side,
    /// Venue-native trade identifier
    pub trade_id: String,
    /// Local receipt time, nanoseconds since epoch
    pub timestamp_ns: u64,
}

impl CanonicalTrade {
    /// Notional value of the trade
    pub fn notional(&self) -> f64 {
        self.price * self.amount
    }
}

/// Top-of-book snapshot normalized from any venue
///
/// Bids are strictly descending, asks strictly ascending, each side holds at most
/// [`BOOK_DEPTH`] levels and no level has zero quantity. Use [`OrderBookSnapshot::from_levels`]
/// to build one from unordered input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Venue the book belongs to
    pub exchange: VenueId,
    /// Canonical symbol
    pub symbol: String,
    /// Local receipt time, nanoseconds since epoch
    pub timestamp_ns: u64,
    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Build a snapshot, enforcing ordering, uniqueness and the depth cap
    ///
    /// Levels with a non-positive price or quantity are dropped. When the same price
    /// appears more than once on a side the last occurrence wins.
    pub fn from_levels(
        exchange: VenueId,
        symbol: String,
        timestamp_ns: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            exchange,
            symbol,
            timestamp_ns,
            bids: normalize_side(bids, true),
            asks: normalize_side(asks, false),
        }
    }

    /// Snapshot with no levels on either side
    pub fn empty(exchange: VenueId, symbol: String, timestamp_ns: u64) -> Self {
        Self {
            exchange,
            symbol,
            timestamp_ns,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Best bid level
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best ask level
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// True when both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn normalize_side(levels: Vec<PriceLevel>, descending: bool) -> Vec<PriceLevel> {
    let mut levels: Vec<PriceLevel> = levels.into_iter().filter(PriceLevel::is_valid).collect();
    // Stable, so equal prices keep arrival order and the dedup below keeps the last one.
    levels.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut unique: Vec<PriceLevel> = Vec::with_capacity(levels.len());
    for level in levels {
        match unique.last_mut() {
            Some(last) if last.price == level.price => *last = level,
            _ => unique.push(level),
        }
    }

    if descending {
        unique.reverse();
    }
    unique.truncate(BOOK_DEPTH);
    unique
}
