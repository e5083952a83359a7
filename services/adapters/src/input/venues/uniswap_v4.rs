//! Uniswap V4 on-chain codec
//!
//! Subscribes to PoolManager logs over an Ethereum JSON-RPC WebSocket. Log payloads are not
//! ABI-decoded yet: a `Swap` log becomes a placeholder trade and a `ModifyLiquidity` log an
//! empty placeholder book, both tagged with the fixed `WETH-USDC` pair.
//!
//! ## Data Format Reference
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"result":"0x9cef478923ff08bf67fde6c64013158d"}
//! {"jsonrpc":"2.0","method":"eth_subscription","params":{"subscription":"0x9c..","result":{"address":"0x..","topics":["0xc420.."],"data":"0x..","blockNumber":"0x10","transactionHash":"0xabc"}}}
//! ```

use serde::Deserialize;
use serde_json::Value;
use types::{CanonicalTrade, OrderBookSnapshot, Side, VenueId};

use super::{decode_with, payload, DecodedFrame, VenueCodec};
use crate::input::book::BookState;
use crate::input::components::current_nanos;
use crate::{AdapterError, Result};

const VENUE: VenueId = VenueId::UniswapV4;

/// PoolManager address placeholder until a deployment address is configured
pub const POOL_MANAGER_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// `keccak256("Swap(address,address,int256,int256,uint160,uint128,int24)")`
pub const SWAP_EVENT_SIG: &str = "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67";

/// ModifyLiquidity event topic
pub const MODIFY_LIQUIDITY_EVENT_SIG: &str =
    "0x3067048beee31b25b2f1681f88dac838c8bba36af25bfb2b7cf7473a5847e35f";

/// Pair reported for every pool until pool ids are decoded
pub const PLACEHOLDER_SYMBOL: &str = "WETH-USDC";

const SWAP_REQUEST_ID: u64 = 1;
const LIQUIDITY_REQUEST_ID: u64 = 2;

/// Uniswap V4 function table
pub static CODEC: VenueCodec = VenueCodec {
    venue: VENUE,
    default_url: "wss://ethereum-rpc.publicnode.com",
    normalize_symbol,
    build_subscription,
    decode,
};

#[derive(Debug, Deserialize)]
struct SwapLog {
    data: String,
    #[serde(rename = "transactionHash", default)]
    transaction_hash: String,
}

/// Pair names are kept as configured
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.to_ascii_uppercase()
}

/// One `eth_subscribe` log filter per (symbol, event) pair
pub fn build_subscription(symbols: &[String], enable_trades: bool, enable_orderbook: bool) -> String {
    let mut requests = Vec::with_capacity(symbols.len() * 2);
    for _symbol in symbols {
        if enable_trades {
            requests.push(log_filter(SWAP_REQUEST_ID, SWAP_EVENT_SIG));
        }
        if enable_orderbook {
            requests.push(log_filter(LIQUIDITY_REQUEST_ID, MODIFY_LIQUIDITY_EVENT_SIG));
        }
    }

    Value::Array(requests).to_string()
}

fn log_filter(id: u64, topic: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "eth_subscribe",
        "params": ["logs", {
            "address": POOL_MANAGER_ADDRESS,
            "topics": [topic],
        }],
    })
}

/// Classify and decode one JSON-RPC frame
pub fn decode(raw: &str, _books: &mut BookState) -> DecodedFrame {
    decode_with(VENUE, raw, decode_value)
}

fn decode_value(value: &Value) -> Result<DecodedFrame> {
    if value.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        let Some(params) = value.get("params").filter(|p| p.is_object()) else {
            return Ok(DecodedFrame::Heartbeat);
        };
        let Some(log) = params.get("result").filter(|r| r.is_object()) else {
            return Ok(DecodedFrame::Heartbeat);
        };

        if let Some(frame) = decode_log(log)? {
            return Ok(frame);
        }
    }

    // Subscription id acknowledgment
    if value.get("result").map_or(false, Value::is_string) {
        return Ok(DecodedFrame::Heartbeat);
    }

    Ok(DecodedFrame::Unknown)
}

/// `None` when the log carries a topic this codec does not handle
fn decode_log(log: &Value) -> Result<Option<DecodedFrame>> {
    let Some(topics) = log.get("topics").and_then(Value::as_array) else {
        return Ok(Some(DecodedFrame::Unknown));
    };
    let Some(first) = topics.first() else {
        return Ok(Some(DecodedFrame::Unknown));
    };
    let signature = first
        .as_str()
        .ok_or_else(|| AdapterError::schema(VENUE, "log topic must be a string"))?;

    if matches_topic(signature, SWAP_EVENT_SIG) {
        let swap: SwapLog = payload(VENUE, log, "Swap log")?;
        tracing::trace!("Swap log with {} data bytes", swap.data.len());
        return Ok(Some(DecodedFrame::Trade(CanonicalTrade {
            exchange: VENUE,
            symbol: PLACEHOLDER_SYMBOL.to_string(),
            price: 0.0,
            amount: 0.0,
            side: Side::Buy,
            trade_id: swap.transaction_hash,
            timestamp_ns: current_nanos(),
        })));
    }

    if matches_topic(signature, MODIFY_LIQUIDITY_EVENT_SIG) {
        return Ok(Some(DecodedFrame::Book(OrderBookSnapshot::empty(
            VENUE,
            PLACEHOLDER_SYMBOL.to_string(),
            current_nanos(),
        ))));
    }

    Ok(None)
}

fn matches_topic(signature: &str, expected: &str) -> bool {
    let expected = expected.trim_start_matches("0x");
    signature.to_ascii_lowercase().contains(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha3::{Digest, Keccak256};
    use types::MessageClassification;

    fn run(raw: &str) -> DecodedFrame {
        decode(raw, &mut BookState::new())
    }

    fn log_frame(topic: &str, extra: &str) -> String {
        format!(
            r#"{{"jsonrpc":"2.0","method":"eth_subscription","params":{{"subscription":"0x9c","result":{{"topics":["{}"]{}}}}}}}"#,
            topic, extra
        )
    }

    #[test]
    fn test_swap_signature_is_keccak_of_event() {
        let digest = Keccak256::digest(b"Swap(address,address,int256,int256,uint160,uint128,int24)");
        assert_eq!(format!("0x{}", hex::encode(digest)), SWAP_EVENT_SIG);
    }

    #[test]
    fn test_subscription_shape() {
        let request = build_subscription(&["WETH-USDC".to_string()], true, true);
        let parsed: Value = serde_json::from_str(&request).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["id"], 1);
        assert_eq!(entries[0]["method"], "eth_subscribe");
        assert_eq!(entries[0]["params"][0], "logs");
        assert_eq!(entries[0]["params"][1]["address"], POOL_MANAGER_ADDRESS);
        assert_eq!(entries[0]["params"][1]["topics"][0], SWAP_EVENT_SIG);
        assert_eq!(entries[1]["id"], 2);
        assert_eq!(entries[1]["params"][1]["topics"][0], MODIFY_LIQUIDITY_EVENT_SIG);
    }

    #[test]
    fn test_swap_log_is_placeholder_trade() {
        let frame = run(&log_frame(
            SWAP_EVENT_SIG,
            r#","data":"0x00","blockNumber":"0x10","transactionHash":"0xabc""#,
        ));
        let trade = frame.trade().expect("trade");
        assert_eq!(trade.symbol, PLACEHOLDER_SYMBOL);
        assert_eq!(trade.trade_id, "0xabc");
        assert_eq!(trade.price, 0.0);
        assert_eq!(trade.side, Side::Buy);
    }

    #[test]
    fn test_swap_without_data_is_error() {
        let frame = run(&log_frame(SWAP_EVENT_SIG, r#","transactionHash":"0xabc""#));
        assert_eq!(frame.classification(), MessageClassification::Error);
    }

    #[test]
    fn test_liquidity_log_is_empty_book() {
        let frame = run(&log_frame(MODIFY_LIQUIDITY_EVENT_SIG, ""));
        let book = frame.book().expect("book");
        assert!(book.is_empty());
        assert_eq!(book.exchange, VenueId::UniswapV4);
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(
            run(r#"{"jsonrpc":"2.0","id":1,"result":"0x9cef"}"#).classification(),
            MessageClassification::Heartbeat
        );
        assert_eq!(
            run(r#"{"jsonrpc":"2.0","method":"eth_subscription"}"#).classification(),
            MessageClassification::Heartbeat
        );
        assert_eq!(
            run(r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"result":"0x1"}}"#).classification(),
            MessageClassification::Heartbeat
        );
        assert_eq!(
            run(r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{"result":{"topics":[]}}}"#)
                .classification(),
            MessageClassification::Unknown
        );
        assert_eq!(run(&log_frame("0xdeadbeef", "")).classification(), MessageClassification::Unknown);
        assert_eq!(run(r#"{"jsonrpc":"2.0","id":1}"#).classification(), MessageClassification::Unknown);
    }
}
