//! Parsing Utilities for Exchange Adapters
//!
//! Common helpers for turning venue JSON into canonical values.
//!
//! ## Conversion Rules
//!
//! - **Numerics**: venues send decimal strings (sometimes bare JSON numbers). Conversion never
//!   fails: anything unparsable or non-finite becomes `0.0`
//! - **Price Keys**: book prices are kept as exact [`Decimal`] so that `"100.0"` and `"100"`
//!   land on the same level
//! - **Identifiers**: trade ids may be strings or integers and are always carried as strings
//! - **Timestamps**: receipt time only, from the local wall clock in nanoseconds

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Parse a decimal string to `f64`, yielding `0.0` on malformed input
pub fn parse_f64_or_zero(s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Read a numeric JSON field that may be a string or a number
pub fn f64_from_json(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::String(s)) => parse_f64_or_zero(s),
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Read an identifier field that may be a string or an integer
pub fn id_from_json(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse an exact decimal price from a JSON string or number
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        _ => None,
    }
}

/// Parse an exact decimal from text, accepting scientific notation
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
        .map(|d| d.normalize())
}

/// Serde adapter for numeric fields: string or number, `0.0` when unparsable
pub fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(f64_from_json(Some(&value)))
}

/// Serde adapter for identifier fields: string or number, empty when absent
pub fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_from_json(Some(&value)))
}

/// Uppercase the symbol and insert a dash `offset` characters from the end
///
/// Only applied when the symbol has no dash yet and is at least `min_len` long.
/// This is a positional heuristic, not a symbol table lookup: `BTCUSDT` with offset 4 becomes
/// `BTC-USDT`, while a three-letter quote such as `ETHBTC` is mis-segmented as `ET-HBTC`.
pub fn insert_dash_from_end(symbol: &str, offset: usize, min_len: usize) -> String {
    let upper = symbol.to_ascii_uppercase();
    if upper.contains('-') || upper.len() < min_len || upper.len() <= offset || !upper.is_ascii() {
        return upper;
    }
    let split = upper.len() - offset;
    format!("{}-{}", &upper[..split], &upper[split..])
}

/// Remove dash separators from a symbol
pub fn strip_dashes(symbol: &str) -> String {
    symbol.chars().filter(|c| *c != '-').collect()
}

/// Get current timestamp in nanoseconds since epoch
pub fn current_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Get current timestamp in milliseconds since epoch
pub fn current_millis() -> u64 {
    current_nanos() / 1_000_000
}

/// Common subscription message builder for WebSocket venues
pub fn build_subscription_message(method: &str, streams: Vec<String>, id: u64) -> String {
    serde_json::json!({
        "method": method,
        "params": streams,
        "id": id
    })
    .to_string()
}
