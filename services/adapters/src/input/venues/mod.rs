//! # Venue Codecs
//!
//! ## Purpose
//!
//! One codec per venue, each a pair of plain functions: build the subscription request and
//! classify/decode one inbound text frame into a canonical event. Dispatch goes through a
//! static table indexed by [`VenueId`], so the hot decode path is a direct function call and
//! the venue set is checked exhaustively at compile time.
//!
//! ## Decode Contract
//!
//! - Frame is not valid JSON → [`DecodedFrame::Unknown`]
//! - Valid JSON with a missing or mistyped required field → [`DecodedFrame::Error`]
//! - Ping/pong, subscription acknowledgments, connection status → [`DecodedFrame::Heartbeat`]
//! - Trade batches yield their first trade, book messages yield a snapshot
//! - Only [`DecodedFrame::Trade`] and [`DecodedFrame::Book`] carry output, so a caller
//!   can never observe a half-populated event
//! - Decode mutates the [`BookState`] only on the delta path and never when it returns an error
//!
//! ## Architecture Role
//!
//! ```text
//! WebSocket text → [VenueCodec::decode] → DecodedFrame → MarketDataProvider → callbacks / bus
//!                         ↑
//!                     BookState (delta venues)
//! ```

pub mod binance;
pub mod bybit;
pub mod dydx;
pub mod hyperliquid;
pub mod uniswap_v4;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use types::{CanonicalTrade, MessageClassification, OrderBookSnapshot, VenueId};

use crate::input::book::BookState;
use crate::{AdapterError, Result};

/// Builds the venue subscription request for `(symbols, enable_trades, enable_orderbook)`
pub type BuildSubscriptionFn = fn(&[String], bool, bool) -> String;

/// Classifies and decodes one raw frame
pub type DecodeFn = fn(&str, &mut BookState) -> DecodedFrame;

/// Maps a configured symbol onto the venue's wire format
pub type NormalizeSymbolFn = fn(&str) -> String;

/// Function table for one venue
#[derive(Debug)]
pub struct VenueCodec {
    /// Venue served by this codec
    pub venue: VenueId,
    /// Default WebSocket endpoint
    pub default_url: &'static str,
    /// Symbol normalization used when subscribing
    pub normalize_symbol: NormalizeSymbolFn,
    /// Subscription request builder
    pub build_subscription: BuildSubscriptionFn,
    /// Frame decoder
    pub decode: DecodeFn,
}

impl VenueCodec {
    /// Build the subscription request
    pub fn subscription(&self, symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
        (self.build_subscription)(symbols, enable_trades, enable_orderbook)
    }

    /// Decode one raw frame
    pub fn decode_frame(&self, raw: &str, books: &mut BookState) -> DecodedFrame {
        (self.decode)(raw, books)
    }
}

/// Look up the codec for a venue
pub fn codec(venue: VenueId) -> &'static VenueCodec {
    match venue {
        VenueId::Bybit => &bybit::CODEC,
        VenueId::Binance => &binance::CODEC,
        VenueId::DYdX => &dydx::CODEC,
        VenueId::Hyperliquid => &hyperliquid::CODEC,
        VenueId::UniswapV4 => &uniswap_v4::CODEC,
    }
}

/// Outcome of decoding one frame
#[derive(Debug)]
pub enum DecodedFrame {
    /// A trade was decoded
    Trade(CanonicalTrade),
    /// A book snapshot was produced
    Book(OrderBookSnapshot),
    /// Control or acknowledgment frame
    Heartbeat,
    /// Unparsable or not actionable
    Unknown,
    /// Structurally valid but missing required data
    Error(AdapterError),
}

impl DecodedFrame {
    /// Classification of the frame
    pub fn classification(&self) -> MessageClassification {
        match self {
            DecodedFrame::Trade(_) => MessageClassification::Trade,
            DecodedFrame::Book(_) => MessageClassification::Book,
            DecodedFrame::Heartbeat => MessageClassification::Heartbeat,
            DecodedFrame::Unknown => MessageClassification::Unknown,
            DecodedFrame::Error(_) => MessageClassification::Error,
        }
    }

    /// Decoded trade, if any
    pub fn trade(&self) -> Option<&CanonicalTrade> {
        match self {
            DecodedFrame::Trade(trade) => Some(trade),
            _ => None,
        }
    }

    /// Decoded book, if any
    pub fn book(&self) -> Option<&OrderBookSnapshot> {
        match self {
            DecodedFrame::Book(book) => Some(book),
            _ => None,
        }
    }
}

/// Parse a raw frame, `None` when it is not JSON
pub(crate) fn parse_frame(venue: VenueId, raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            let err = AdapterError::Parse {
                venue,
                message: e.to_string(),
            };
            debug!("{}", err);
            None
        }
    }
}

/// Run a venue decoder over a raw frame, converting failures into classifications
pub(crate) fn decode_with<F>(venue: VenueId, raw: &str, decode_value: F) -> DecodedFrame
where
    F: FnOnce(&Value) -> Result<DecodedFrame>,
{
    let Some(value) = parse_frame(venue, raw) else {
        return DecodedFrame::Unknown;
    };

    match decode_value(&value) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Rejected {} frame: {}", venue, e);
            DecodedFrame::Error(e)
        }
    }
}

/// Deserialize a typed payload, failing closed with a schema error
pub(crate) fn payload<'a, T>(venue: VenueId, value: &'a Value, what: &str) -> Result<T>
where
    T: Deserialize<'a>,
{
    T::deserialize(value).map_err(|e| AdapterError::schema(venue, format!("{}: {}", what, e)))
}
