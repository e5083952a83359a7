//! Payloads published on the market data bus

use serde::{Deserialize, Serialize};
use types::{CanonicalTrade, OrderBookSnapshot, PriceLevel, Side, VenueId};

use crate::provider::features::{BookFeatures, TradeFeatures};

/// Trade as published on the trades bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Local receipt time, nanoseconds since epoch
    pub timestamp_ns: u64,
    /// Canonical symbol, also the bus topic
    pub symbol: String,
    /// Source venue
    pub exchange: VenueId,
    /// Execution price
    pub price: f64,
    /// Executed quantity
    pub quantity: f64,
    /// Aggressor side
    pub side: Side,
    /// Venue-native trade id
    pub trade_id: String,
    /// Per-stream sequence number, starting at 1
    pub sequence: u64,
    /// Derived trade features
    pub features: TradeFeatures,
}

impl TradeMessage {
    /// Build from a decoded trade
    pub fn new(trade: &CanonicalTrade, sequence: u64, features: TradeFeatures) -> Self {
        Self {
            timestamp_ns: trade.timestamp_ns,
            symbol: trade.symbol.clone(),
            exchange: trade.exchange,
            price: trade.price,
            quantity: trade.amount,
            side: trade.side,
            trade_id: trade.trade_id.clone(),
            sequence,
            features,
        }
    }
}

/// How the levels of a [`BookMessage`] relate to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookMessageKind {
    /// Full top-N book, snapshot output mode
    Snapshot,
    /// Full top-N book, delta output mode resynchronization point
    Checkpoint,
    /// Changed levels only; quantity `0` removes the price
    Delta,
}

/// Book as published on the books bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMessage {
    /// Local receipt time, nanoseconds since epoch
    pub timestamp_ns: u64,
    /// Canonical symbol, also the bus topic
    pub symbol: String,
    /// Source venue
    pub exchange: VenueId,
    /// Per-stream sequence number, starting at 1
    pub sequence: u64,
    /// Full book or changed levels
    pub kind: BookMessageKind,
    /// Bid levels, best first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first
    pub asks: Vec<PriceLevel>,
    /// Derived book features, always computed on the full book
    pub features: BookFeatures,
}

impl BookMessage {
    /// Build a message carrying `bids`/`asks` for `book`
    pub fn new(
        book: &OrderBookSnapshot,
        sequence: u64,
        kind: BookMessageKind,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        features: BookFeatures,
    ) -> Self {
        Self {
            timestamp_ns: book.timestamp_ns,
            symbol: book.symbol.clone(),
            exchange: book.exchange,
            sequence,
            kind,
            bids,
            asks,
            features,
        }
    }
}
