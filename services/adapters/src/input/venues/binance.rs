//! Binance spot codec
//!
//! Handles JSON WebSocket streams from Binance for trade streams and depth updates.
//!
//! ## Data Format Reference
//!
//! Trade:
//! ```json
//! {"e":"trade","s":"BTCUSDT","t":12345,"p":"50000.1","q":"0.01","m":false}
//! ```
//!
//! Depth:
//! ```json
//! {"e":"depthUpdate","s":"BTCUSDT","b":[["100","2"]],"a":[["101","3"]]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use types::{CanonicalTrade, OrderBookSnapshot, Side, VenueId};

use super::{decode_with, payload, DecodedFrame, VenueCodec};
use crate::input::book::{parse_levels, BookState, LevelUpdate};
use crate::input::components::{
    build_subscription_message, current_nanos, insert_dash_from_end, lenient_f64, lenient_id,
    strip_dashes,
};
use crate::Result;

const VENUE: VenueId = VenueId::Binance;

/// Binance function table
pub static CODEC: VenueCodec = VenueCodec {
    venue: VENUE,
    default_url: "wss://stream.binance.com:9443/ws",
    normalize_symbol,
    build_subscription,
    decode,
};

/// Binance trade event
#[derive(Debug, Deserialize)]
struct BinanceTradeEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p", deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(rename = "q", deserialize_with = "lenient_f64")]
    quantity: f64,
    /// Buyer is the maker, so the seller was the aggressor
    #[serde(rename = "m", default)]
    buyer_is_maker: bool,
    #[serde(rename = "t", default, deserialize_with = "lenient_id")]
    trade_id: String,
}

/// Binance depth event
#[derive(Debug, Deserialize)]
struct BinanceDepthEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b", default)]
    bids: Vec<Value>,
    #[serde(rename = "a", default)]
    asks: Vec<Value>,
}

/// Binance stream names are lowercase without separator
pub fn normalize_symbol(symbol: &str) -> String {
    strip_dashes(symbol).to_ascii_lowercase()
}

/// `{method:"SUBSCRIBE", params:[...], id:1}` request
pub fn build_subscription(symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
    let mut streams = Vec::with_capacity(symbols.len() * 2);
    for symbol in symbols {
        let normalized = normalize_symbol(symbol);
        if enable_trades {
            streams.push(format!("{}@trade", normalized));
        }
        if enable_orderbook {
            streams.push(format!("{}@depth10", normalized));
        }
    }

    build_subscription_message("SUBSCRIBE", streams, 1)
}

/// Classify and decode one Binance frame
pub fn decode(raw: &str, _books: &mut BookState) -> DecodedFrame {
    decode_with(VENUE, raw, decode_value)
}

fn decode_value(value: &Value) -> Result<DecodedFrame> {
    // Subscription response: {"result":null,"id":1}
    if value.get("result").map_or(false, Value::is_null) {
        return Ok(DecodedFrame::Heartbeat);
    }

    let Some(event_type) = value.get("e").and_then(Value::as_str) else {
        return Ok(DecodedFrame::Unknown);
    };

    match event_type {
        "trade" => {
            let event: BinanceTradeEvent = payload(VENUE, value, "trade")?;
            Ok(DecodedFrame::Trade(CanonicalTrade {
                exchange: VENUE,
                symbol: canonical_symbol(&event.symbol),
                price: event.price,
                amount: event.quantity,
                side: if event.buyer_is_maker { Side::Sell } else { Side::Buy },
                trade_id: event.trade_id,
                timestamp_ns: current_nanos(),
            }))
        }
        "depthUpdate" => {
            let event: BinanceDepthEvent = payload(VENUE, value, "depthUpdate")?;
            Ok(DecodedFrame::Book(OrderBookSnapshot::from_levels(
                VENUE,
                canonical_symbol(&event.symbol),
                current_nanos(),
                parse_levels(VENUE, &event.bids).iter().map(LevelUpdate::to_price_level).collect(),
                parse_levels(VENUE, &event.asks).iter().map(LevelUpdate::to_price_level).collect(),
            )))
        }
        other => {
            tracing::debug!("Unhandled Binance event type: {}", other);
            Ok(DecodedFrame::Unknown)
        }
    }
}

fn canonical_symbol(wire: &str) -> String {
    insert_dash_from_end(wire, 4, 6)
}
