//! Hyperliquid perpetuals codec
//!
//! Subscriptions are addressed by coin (`BTC`), outbound symbols are `BTC-USDC-PERP`.
//! Venue `time` fields are ignored: every event is stamped with the local receipt time.
//!
//! ## Data Format Reference
//!
//! ```json
//! {"channel":"trades","data":[{"coin":"BTC","side":"A","px":"50000","sz":"0.1","tid":42,"time":1700000000000}]}
//! {"channel":"l2Book","data":{"coin":"BTC","time":1700000000000,"levels":[[{"px":"100","sz":"1","n":2}],[{"px":"101","sz":"3","n":1}]]}}
//! ```

use serde::Deserialize;
use serde_json::Value;
use types::{CanonicalTrade, OrderBookSnapshot, PriceLevel, Side, VenueId};

use super::{decode_with, payload, DecodedFrame, VenueCodec};
use crate::input::book::{parse_levels, BookState, LevelUpdate};
use crate::input::components::{current_nanos, lenient_f64, lenient_id};
use crate::{AdapterError, Result};

const VENUE: VenueId = VenueId::Hyperliquid;
const SYMBOL_SUFFIX: &str = "-USDC-PERP";
const QUOTE_SUFFIXES: [&str; 3] = ["USDC", "USDT", "USD"];

/// Hyperliquid function table
pub static CODEC: VenueCodec = VenueCodec {
    venue: VENUE,
    default_url: "wss://api.hyperliquid.xyz/ws",
    normalize_symbol,
    build_subscription,
    decode,
};

#[derive(Debug, Deserialize)]
struct HyperliquidTrade {
    coin: String,
    #[serde(deserialize_with = "lenient_f64")]
    px: f64,
    #[serde(deserialize_with = "lenient_f64")]
    sz: f64,
    #[serde(default)]
    side: String,
    #[serde(default, deserialize_with = "lenient_id")]
    tid: String,
}

#[derive(Debug, Deserialize)]
struct HyperliquidBook {
    coin: String,
    levels: Vec<Value>,
}

/// Reduce a configured symbol to its base coin
///
/// `BTC-USDC-PERP`, `BTC-USD`, `btcusdt` and `BTC` all map to `BTC`.
pub fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase();
    if let Some((base, _)) = upper.split_once('-') {
        return base.to_string();
    }

    QUOTE_SUFFIXES
        .iter()
        .find_map(|quote| upper.strip_suffix(quote).filter(|base| !base.is_empty()))
        .map(str::to_string)
        .unwrap_or(upper)
}

/// One subscribe object per (coin, channel) pair
pub fn build_subscription(symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
    let mut requests = Vec::with_capacity(symbols.len() * 2);
    for symbol in symbols {
        let coin = normalize_symbol(symbol);
        if enable_trades {
            requests.push(subscribe_request("trades", &coin));
        }
        if enable_orderbook {
            requests.push(subscribe_request("l2Book", &coin));
        }
    }

    Value::Array(requests).to_string()
}

fn subscribe_request(kind: &str, coin: &str) -> Value {
    serde_json::json!({
        "method": "subscribe",
        "subscription": {
            "type": kind,
            "coin": coin,
        },
    })
}

/// Classify and decode one Hyperliquid frame
pub fn decode(raw: &str, _books: &mut BookState) -> DecodedFrame {
    decode_with(VENUE, raw, decode_value)
}

fn decode_value(value: &Value) -> Result<DecodedFrame> {
    let Some(channel) = value.get("channel").and_then(Value::as_str) else {
        return Ok(DecodedFrame::Unknown);
    };

    if channel == "subscriptionResponse" || channel == "pong" {
        return Ok(DecodedFrame::Heartbeat);
    }

    let Some(data) = value.get("data") else {
        return Ok(DecodedFrame::Unknown);
    };

    match channel {
        "trades" => decode_trade(data),
        "l2Book" => decode_book(data),
        _ => Ok(DecodedFrame::Unknown),
    }
}

fn decode_trade(data: &Value) -> Result<DecodedFrame> {
    let Some(first) = data.as_array().and_then(|trades| trades.first()) else {
        return Ok(DecodedFrame::Unknown);
    };

    let trade: HyperliquidTrade = payload(VENUE, first, "trades")?;
    Ok(DecodedFrame::Trade(CanonicalTrade {
        exchange: VENUE,
        symbol: canonical_symbol(&trade.coin),
        price: trade.px,
        amount: trade.sz,
        // A = ask side aggressor
        side: if trade.side == "A" { Side::Sell } else { Side::Buy },
        trade_id: trade.tid,
        timestamp_ns: current_nanos(),
    }))
}

fn decode_book(data: &Value) -> Result<DecodedFrame> {
    if !data.is_object() {
        return Err(AdapterError::schema(VENUE, "l2Book data must be an object"));
    }

    let book: HyperliquidBook = payload(VENUE, data, "l2Book")?;
    if book.levels.len() < 2 {
        return Err(AdapterError::schema(VENUE, "l2Book levels must hold bids and asks"));
    }

    Ok(DecodedFrame::Book(OrderBookSnapshot::from_levels(
        VENUE,
        canonical_symbol(&book.coin),
        current_nanos(),
        side_levels(&book.levels[0]),
        side_levels(&book.levels[1]),
    )))
}

fn side_levels(value: &Value) -> Vec<PriceLevel> {
    value
        .as_array()
        .map(|levels| parse_levels(VENUE, levels))
        .unwrap_or_default()
        .iter()
        .map(LevelUpdate::to_price_level)
        .collect()
}

fn canonical_symbol(coin: &str) -> String {
    format!("{}{}", coin.to_ascii_uppercase(), SYMBOL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::MessageClassification;

    fn run(raw: &str) -> DecodedFrame {
        decode(raw, &mut BookState::new())
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC-USDC-PERP"), "BTC");
        assert_eq!(normalize_symbol("eth-usd"), "ETH");
        assert_eq!(normalize_symbol("solusdt"), "SOL");
        assert_eq!(normalize_symbol("BTC"), "BTC");
        assert_eq!(normalize_symbol("USDC"), "USDC");
    }

    #[test]
    fn test_subscription_shape() {
        let request = build_subscription(&["BTC-USD".to_string()], true, true);
        let parsed: Value = serde_json::from_str(&request).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([
                {"method": "subscribe", "subscription": {"type": "trades", "coin": "BTC"}},
                {"method": "subscribe", "subscription": {"type": "l2Book", "coin": "BTC"}},
            ])
        );
    }

    #[test]
    fn test_trade_frame() {
        let frame = run(
            r#"{"channel":"trades","data":[{"coin":"btc","side":"A","px":"50000","sz":"0.1","tid":42,"time":1}]}"#,
        );
        let trade = frame.trade().expect("trade");
        assert_eq!(trade.symbol, "BTC-USDC-PERP");
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.trade_id, "42");
        assert_eq!(trade.price, 50000.0);
        // local receipt time, never the venue's `time`
        assert!(trade.timestamp_ns > 1_000_000);
    }

    #[test]
    fn test_book_frame() {
        let frame = run(
            r#"{"channel":"l2Book","data":{"coin":"BTC","time":1,"levels":[[{"px":"100","sz":"1","n":2},{"px":"99","sz":"4","n":1}],[{"px":"101","sz":"3","n":1}]]}}"#,
        );
        let book = frame.book().expect("book");
        assert_eq!(book.symbol, "BTC-USDC-PERP");
        assert_eq!(book.bids, vec![PriceLevel::new(100.0, 1.0), PriceLevel::new(99.0, 4.0)]);
        assert_eq!(book.asks, vec![PriceLevel::new(101.0, 3.0)]);
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(
            run(r#"{"channel":"subscriptionResponse","data":{"method":"subscribe"}}"#).classification(),
            MessageClassification::Heartbeat
        );
        assert_eq!(run(r#"{"channel":"pong"}"#).classification(), MessageClassification::Heartbeat);
        assert_eq!(run(r#"{"channel":"trades"}"#).classification(), MessageClassification::Unknown);
        assert_eq!(run(r#"{"data":[]}"#).classification(), MessageClassification::Unknown);
        assert_eq!(
            run(r#"{"channel":"trades","data":[]}"#).classification(),
            MessageClassification::Unknown
        );
    }

    #[test]
    fn test_schema_violations() {
        assert_eq!(
            run(r#"{"channel":"trades","data":[{"px":"1","sz":"1"}]}"#).classification(),
            MessageClassification::Error
        );
        assert_eq!(
            run(r#"{"channel":"l2Book","data":[]}"#).classification(),
            MessageClassification::Error
        );
        assert_eq!(
            run(r#"{"channel":"l2Book","data":{"coin":"BTC","levels":[[]]}}"#).classification(),
            MessageClassification::Error
        );
        assert_eq!(
            run(r#"{"channel":"l2Book","data":{"levels":[[],[]]}}"#).classification(),
            MessageClassification::Error
        );
    }

    #[test]
    fn test_trade_requires_price_and_size() {
        for raw in [
            r#"{"channel":"trades","data":[{"coin":"BTC","side":"B","tid":1}]}"#,
            r#"{"channel":"trades","data":[{"coin":"BTC","side":"B","sz":"0.1","tid":1}]}"#,
            r#"{"channel":"trades","data":[{"coin":"BTC","side":"B","px":"50000","tid":1}]}"#,
        ] {
            let frame = run(raw);
            assert_eq!(frame.classification(), MessageClassification::Error, "{}", raw);
            assert!(matches!(frame, DecodedFrame::Error(AdapterError::Schema { .. })));
        }

        let lenient = run(r#"{"channel":"trades","data":[{"coin":"BTC","side":"B","px":"abc","sz":"0.1","tid":1}]}"#);
        assert_eq!(lenient.trade().map(|t| t.price), Some(0.0));
    }
}
