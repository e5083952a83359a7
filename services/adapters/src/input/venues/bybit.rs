//! Bybit v5 public spot codec
//!
//! ## Data Format Reference
//!
//! Subscription:
//! ```json
//! {"op":"subscribe","args":["publicTrade.BTCUSDT","orderbook.10.BTCUSDT"]}
//! ```
//!
//! Trade (`data` is always an array, first element used):
//! ```json
//! {"topic":"publicTrade.BTCUSDT","data":[{"s":"BTCUSDT","p":"50000.1","v":"0.01","S":"Buy","i":"123"}]}
//! ```
//!
//! Book (`data` is an object, levels are `[price, size]` string pairs):
//! ```json
//! {"topic":"orderbook.10.BTCUSDT","data":{"s":"BTCUSDT","b":[["100","2"]],"a":[["101","3"]]}}
//! ```

use serde::Deserialize;
use serde_json::Value;
use types::{CanonicalTrade, OrderBookSnapshot, Side, VenueId};

use super::{decode_with, payload, DecodedFrame, VenueCodec};
use crate::input::book::{parse_levels, BookState, LevelUpdate};
use crate::input::components::{current_nanos, insert_dash_from_end, lenient_f64, lenient_id, strip_dashes};
use crate::{AdapterError, Result};

const VENUE: VenueId = VenueId::Bybit;

/// Bybit function table
pub static CODEC: VenueCodec = VenueCodec {
    venue: VENUE,
    default_url: "wss://stream.bybit.com:443/v5/public/spot",
    normalize_symbol,
    build_subscription,
    decode,
};

#[derive(Debug, Deserialize)]
struct BybitTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p", deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(rename = "v", deserialize_with = "lenient_f64")]
    size: f64,
    #[serde(rename = "S", default)]
    side: String,
    #[serde(rename = "i", default, deserialize_with = "lenient_id")]
    trade_id: String,
}

#[derive(Debug, Deserialize)]
struct BybitBook {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b", default)]
    bids: Vec<Value>,
    #[serde(rename = "a", default)]
    asks: Vec<Value>,
}

/// Bybit symbols carry no separator
pub fn normalize_symbol(symbol: &str) -> String {
    strip_dashes(symbol)
}

/// Single batched `{op, args}` request
pub fn build_subscription(symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
    let mut args = Vec::with_capacity(symbols.len() * 2);
    for symbol in symbols {
        let normalized = normalize_symbol(symbol);
        if enable_trades {
            args.push(format!("publicTrade.{}", normalized));
        }
        if enable_orderbook {
            args.push(format!("orderbook.10.{}", normalized));
        }
    }

    serde_json::json!({
        "op": "subscribe",
        "args": args,
    })
    .to_string()
}

/// Classify and decode one Bybit frame
pub fn decode(raw: &str, _books: &mut BookState) -> DecodedFrame {
    decode_with(VENUE, raw, decode_value)
}

fn decode_value(value: &Value) -> Result<DecodedFrame> {
    if let Some(op) = value.get("op").and_then(Value::as_str) {
        if op == "ping" || op == "pong" {
            return Ok(DecodedFrame::Heartbeat);
        }
    }
    if value.get("success").map_or(false, Value::is_boolean) {
        return Ok(DecodedFrame::Heartbeat);
    }

    let Some(topic) = value.get("topic").and_then(Value::as_str) else {
        return Ok(DecodedFrame::Unknown);
    };

    if topic.contains("publicTrade") {
        let data = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::schema(VENUE, "publicTrade data must be an array"))?;
        let Some(first) = data.first() else {
            return Ok(DecodedFrame::Unknown);
        };

        let trade: BybitTrade = payload(VENUE, first, "publicTrade")?;
        return Ok(DecodedFrame::Trade(CanonicalTrade {
            exchange: VENUE,
            symbol: canonical_symbol(&trade.symbol),
            price: trade.price,
            amount: trade.size,
            side: if trade.side == "Buy" { Side::Buy } else { Side::Sell },
            trade_id: trade.trade_id,
            timestamp_ns: current_nanos(),
        }));
    }

    if topic.contains("orderbook") {
        let data = value
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| AdapterError::schema(VENUE, "orderbook data must be an object"))?;

        let book: BybitBook = payload(VENUE, data, "orderbook")?;
        return Ok(DecodedFrame::Book(OrderBookSnapshot::from_levels(
            VENUE,
            canonical_symbol(&book.symbol),
            current_nanos(),
            parse_levels(VENUE, &book.bids).iter().map(LevelUpdate::to_price_level).collect(),
            parse_levels(VENUE, &book.asks).iter().map(LevelUpdate::to_price_level).collect(),
        )));
    }

    Ok(DecodedFrame::Unknown)
}

fn canonical_symbol(wire: &str) -> String {
    insert_dash_from_end(wire, 4, 6)
}
