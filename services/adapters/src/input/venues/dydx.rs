//! dYdX v4 indexer codec
//!
//! dYdX is the delta venue: `v4_orderbook` frames carry incremental level changes that are
//! merged into the provider's [`BookState`]. The initial `subscribed` frame carries the full
//! book and replaces whatever was held for the market.
//!
//! ## Data Format Reference
//!
//! Trades (initial object form, then batched array form):
//! ```json
//! {"type":"subscribed","channel":"v4_trades","id":"BTC-USD","contents":{"trades":[{"id":"t1","side":"BUY","size":"0.1","price":"50000"}]}}
//! {"type":"channel_batch_data","channel":"v4_trades","id":"BTC-USD","contents":[{"trades":[{"id":"t2","side":"SELL","size":"0.2","price":"50001"}]}]}
//! ```
//!
//! Book (keyed levels in the snapshot, positional levels in batched updates):
//! ```json
//! {"type":"subscribed","channel":"v4_orderbook","id":"BTC-USD","contents":{"bids":[{"price":"100","size":"1"}],"asks":[{"price":"101","size":"2"}]}}
//! {"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["100","0"]]},{"asks":[["102","1"]]}]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use types::{CanonicalTrade, Side, VenueId};

use super::{decode_with, payload, DecodedFrame, VenueCodec};
use crate::input::book::{parse_levels, BookState, UpdateGroup};
use crate::input::components::{current_nanos, insert_dash_from_end, lenient_f64, lenient_id};
use crate::{AdapterError, Result};

const VENUE: VenueId = VenueId::DYdX;

/// dYdX function table
pub static CODEC: VenueCodec = VenueCodec {
    venue: VENUE,
    default_url: "wss://indexer.dydx.trade:443/v4/ws",
    normalize_symbol,
    build_subscription,
    decode,
};

#[derive(Debug, Deserialize)]
struct DydxTrade {
    #[serde(deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(deserialize_with = "lenient_f64")]
    size: f64,
    #[serde(default)]
    side: String,
    #[serde(default, deserialize_with = "lenient_id")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct DydxBookUpdate {
    #[serde(default)]
    bids: Vec<Value>,
    #[serde(default)]
    asks: Vec<Value>,
}

impl DydxBookUpdate {
    fn into_group(self) -> UpdateGroup {
        UpdateGroup {
            bids: parse_levels(VENUE, &self.bids),
            asks: parse_levels(VENUE, &self.asks),
        }
    }
}

/// dYdX markets are `BASE-USD`
pub fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase().replacen("USDT", "USD", 1);
    insert_dash_from_end(&upper, 3, 6)
}

/// One subscribe object per (symbol, channel) pair
pub fn build_subscription(symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
    let mut requests = Vec::with_capacity(symbols.len() * 2);
    for symbol in symbols {
        let market = normalize_symbol(symbol);
        if enable_trades {
            requests.push(subscribe_request("v4_trades", &market));
        }
        if enable_orderbook {
            requests.push(subscribe_request("v4_orderbook", &market));
        }
    }

    Value::Array(requests).to_string()
}

fn subscribe_request(channel: &str, market: &str) -> Value {
    serde_json::json!({
        "type": "subscribe",
        "channel": channel,
        "id": market,
        "batched": true,
    })
}

/// Classify and decode one dYdX frame, merging book deltas into `books`
pub fn decode(raw: &str, books: &mut BookState) -> DecodedFrame {
    decode_with(VENUE, raw, |value| decode_value(value, books))
}

fn decode_value(value: &Value, books: &mut BookState) -> Result<DecodedFrame> {
    let msg_type = value.get("type").and_then(Value::as_str);
    let contents = value.get("contents");

    match msg_type {
        Some("connected") | Some("unsubscribed") => return Ok(DecodedFrame::Heartbeat),
        Some("subscribed") | Some("channel_batch_data") if contents.is_none() => {
            return Ok(DecodedFrame::Heartbeat)
        }
        _ => {}
    }

    let Some(channel) = value.get("channel").and_then(Value::as_str) else {
        return Ok(DecodedFrame::Unknown);
    };

    match channel {
        "v4_trades" => {
            let symbol = market_id(value)?;
            decode_trade(symbol, contents)
        }
        "v4_orderbook" => {
            let symbol = market_id(value)?;
            decode_book(symbol, contents, msg_type == Some("subscribed"), books)
        }
        _ => Ok(DecodedFrame::Unknown),
    }
}

fn market_id(value: &Value) -> Result<String> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase)
        .ok_or_else(|| AdapterError::schema(VENUE, "missing market id"))
}

fn decode_trade(symbol: String, contents: Option<&Value>) -> Result<DecodedFrame> {
    let contents =
        contents.ok_or_else(|| AdapterError::schema(VENUE, format!("trade message for {} missing contents", symbol)))?;

    let trades = match contents {
        Value::Object(_) => contents.get("trades").and_then(Value::as_array),
        Value::Array(updates) => updates
            .first()
            .and_then(|first| first.get("trades"))
            .and_then(Value::as_array),
        _ => None,
    };

    let first = trades
        .and_then(|t| t.first())
        .ok_or_else(|| AdapterError::schema(VENUE, format!("no trades in contents for {}", symbol)))?;

    let trade: DydxTrade = payload(VENUE, first, "v4_trades")?;
    Ok(DecodedFrame::Trade(CanonicalTrade {
        exchange: VENUE,
        symbol,
        price: trade.price,
        amount: trade.size,
        side: if trade.side == "BUY" { Side::Buy } else { Side::Sell },
        trade_id: trade.id,
        timestamp_ns: current_nanos(),
    }))
}

fn decode_book(
    symbol: String,
    contents: Option<&Value>,
    is_snapshot: bool,
    books: &mut BookState,
) -> Result<DecodedFrame> {
    let contents = contents
        .ok_or_else(|| AdapterError::schema(VENUE, format!("orderbook message for {} missing contents", symbol)))?;

    // Validate the whole batch before touching the working book.
    let groups: Vec<UpdateGroup> = match contents {
        Value::Object(_) => vec![payload::<DydxBookUpdate>(VENUE, contents, "v4_orderbook")?.into_group()],
        Value::Array(updates) => {
            let mut groups = Vec::with_capacity(updates.len());
            for update in updates.iter().filter(|u| u.is_object()) {
                groups.push(payload::<DydxBookUpdate>(VENUE, update, "v4_orderbook")?.into_group());
            }
            groups
        }
        _ => {
            return Err(AdapterError::schema(
                VENUE,
                format!("unsupported orderbook contents for {}", symbol),
            ))
        }
    };

    if is_snapshot {
        books.reset(&symbol);
    }

    match books.merge(VENUE, &symbol, &groups, current_nanos()) {
        Some(snapshot) => Ok(DecodedFrame::Book(snapshot)),
        None => {
            tracing::debug!("No resting bid/ask levels for {}", symbol);
            Ok(DecodedFrame::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{MessageClassification, PriceLevel};

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("btcusdt"), "BTC-USD");
        assert_eq!(normalize_symbol("BTC-USD"), "BTC-USD");
        assert_eq!(normalize_symbol("ETH-USDT"), "ETH-USD");
    }

    #[test]
    fn test_subscription_shape() {
        let request = build_subscription(&["BTC-USD".to_string()], true, true);
        let parsed: Value = serde_json::from_str(&request).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["channel"], "v4_trades");
        assert_eq!(entries[1]["channel"], "v4_orderbook");
        assert_eq!(entries[1]["id"], "BTC-USD");
        assert_eq!(entries[1]["batched"], true);
        assert_eq!(entries[0]["type"], "subscribe");
    }

    #[test]
    fn test_status_frames() {
        let mut books = BookState::new();
        for raw in [
            r#"{"type":"connected","connection_id":"abc"}"#,
            r#"{"type":"unsubscribed","channel":"v4_trades"}"#,
            r#"{"type":"subscribed","channel":"v4_trades","id":"BTC-USD"}"#,
        ] {
            assert_eq!(decode(raw, &mut books).classification(), MessageClassification::Heartbeat);
        }
        assert_eq!(
            decode(r#"{"type":"channel_data"}"#, &mut books).classification(),
            MessageClassification::Unknown
        );
    }

    #[test]
    fn test_trade_formats() {
        let mut books = BookState::new();
        let initial = decode(
            r#"{"type":"subscribed","channel":"v4_trades","id":"BTC-USD","contents":{"trades":[{"id":"t1","side":"BUY","size":"0.1","price":"50000"}]}}"#,
            &mut books,
        );
        let trade = initial.trade().expect("trade");
        assert_eq!(trade.symbol, "BTC-USD");
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.trade_id, "t1");

        let batched = decode(
            r#"{"type":"channel_batch_data","channel":"v4_trades","id":"BTC-USD","contents":[{"trades":[{"id":"t2","side":"SELL","size":"0.2","price":"50001"}]}]}"#,
            &mut books,
        );
        let trade = batched.trade().expect("trade");
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.price, 50001.0);
    }

    #[test]
    fn test_trade_errors() {
        let mut books = BookState::new();
        assert_eq!(
            decode(r#"{"type":"channel_data","channel":"v4_trades","id":"BTC-USD"}"#, &mut books).classification(),
            MessageClassification::Error
        );
        assert_eq!(
            decode(
                r#"{"type":"channel_batch_data","channel":"v4_trades","id":"BTC-USD","contents":[{"trades":[]}]}"#,
                &mut books
            )
            .classification(),
            MessageClassification::Error
        );
    }

    #[test]
    fn test_snapshot_then_deltas() {
        let mut books = BookState::new();
        let snapshot = decode(
            r#"{"type":"subscribed","channel":"v4_orderbook","id":"BTC-USD","contents":{"bids":[{"price":"100","size":"1"},{"price":"99","size":"2"}],"asks":[{"price":"101","size":"2"}]}}"#,
            &mut books,
        );
        assert_eq!(snapshot.book().map(|b| b.bids.len()), Some(2));

        let delta = decode(
            r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["100","0"]]},{"asks":[["102","1"]]}]}"#,
            &mut books,
        );
        let book = delta.book().expect("book");
        assert_eq!(book.bids, vec![PriceLevel::new(99.0, 2.0)]);
        assert_eq!(book.asks, vec![PriceLevel::new(101.0, 2.0), PriceLevel::new(102.0, 1.0)]);
    }

    #[test]
    fn test_resubscribe_replaces_book() {
        let mut books = BookState::new();
        decode(
            r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["90","1"]]}]}"#,
            &mut books,
        );
        let fresh = decode(
            r#"{"type":"subscribed","channel":"v4_orderbook","id":"BTC-USD","contents":{"bids":[["95","1"]],"asks":[]}}"#,
            &mut books,
        );
        assert_eq!(fresh.book().expect("book").bids, vec![PriceLevel::new(95.0, 1.0)]);
    }

    #[test]
    fn test_bad_batch_leaves_book_untouched() {
        let mut books = BookState::new();
        decode(
            r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["100","1"]]}]}"#,
            &mut books,
        );
        let rejected = decode(
            r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["100","0"]]},{"asks":"broken"}]}"#,
            &mut books,
        );
        assert_eq!(rejected.classification(), MessageClassification::Error);
        assert_eq!(books.book("BTC-USD").map(|b| b.bid_count()), Some(1));

        assert_eq!(
            decode(
                r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":"x"}"#,
                &mut books
            )
            .classification(),
            MessageClassification::Error
        );
    }

    #[test]
    fn test_all_removals_is_unknown() {
        let mut books = BookState::new();
        let frame = decode(
            r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"ETH-USD","contents":[{"bids":[["100","0"]],"asks":[["101","0"]]}]}"#,
            &mut books,
        );
        assert_eq!(frame.classification(), MessageClassification::Unknown);
    }
}
