//! Order book delta reconstruction
//!
//! ## Purpose
//!
//! Delta venues stream incremental price-level changes instead of full books. This module keeps
//! the per-symbol working book for such venues and materializes bounded top-N snapshots from it.
//!
//! ## Merge Rules
//!
//! - Updates are applied in arrival order across every group of a batch
//! - Quantity `0` removes the price (a no-op when the price is absent)
//! - Positive quantity inserts or overwrites the price
//! - Non-positive prices are ignored
//! - Malformed levels are skipped with a warning and never abort the batch
//! - A merge that leaves both sides empty produces no snapshot
//!
//! ## Ownership
//!
//! A [`BookState`] belongs to exactly one provider task and is passed to decode by `&mut`.
//! Nothing here is shared across threads, so there is no locking.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use types::{OrderBookSnapshot, PriceLevel, VenueId, BOOK_DEPTH};

use crate::input::components::decimal_from_json;
use crate::{AdapterError, Result};

/// One price-level change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelUpdate {
    /// Exact level price
    pub price: Decimal,
    /// New resting quantity, `0` removes the level
    pub quantity: f64,
}

impl LevelUpdate {
    /// Convert into a canonical price level
    pub fn to_price_level(&self) -> PriceLevel {
        PriceLevel::new(self.price.to_f64().unwrap_or(0.0), self.quantity)
    }
}

/// Bid and ask updates carried by one element of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateGroup {
    /// Bid side changes in arrival order
    pub bids: Vec<LevelUpdate>,
    /// Ask side changes in arrival order
    pub asks: Vec<LevelUpdate>,
}

impl UpdateGroup {
    /// True when the group carries no updates
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Parse one level in either `[price, size]` or `{price, size}` form
///
/// `px`/`sz` keys are accepted as well for venues that abbreviate them.
pub fn parse_level(venue: VenueId, value: &Value) -> Result<LevelUpdate> {
    let (price, size) = match value {
        Value::Array(pair) if pair.len() >= 2 => (&pair[0], &pair[1]),
        Value::Object(map) => {
            let price = map.get("price").or_else(|| map.get("px"));
            let size = map.get("size").or_else(|| map.get("sz"));
            match (price, size) {
                (Some(p), Some(s)) => (p, s),
                _ => return Err(malformed(venue, value)),
            }
        }
        _ => return Err(malformed(venue, value)),
    };

    let price = decimal_from_json(price).ok_or_else(|| malformed(venue, value))?;
    let quantity = strict_quantity(size).ok_or_else(|| malformed(venue, value))?;

    Ok(LevelUpdate { price, quantity })
}

/// Parse a list of levels, skipping the malformed ones
pub fn parse_levels(venue: VenueId, values: &[Value]) -> Vec<LevelUpdate> {
    values
        .iter()
        .filter_map(|value| match parse_level(venue, value) {
            Ok(level) => Some(level),
            Err(e) => {
                warn!("Skipping level: {}", e);
                None
            }
        })
        .collect()
}

/// Parse an optional JSON array of levels; anything but an array yields no levels
pub fn parse_level_array(venue: VenueId, value: Option<&Value>) -> Vec<LevelUpdate> {
    value
        .and_then(|v| v.as_array())
        .map(|levels| parse_levels(venue, levels))
        .unwrap_or_default()
}

// Quantity must parse exactly: a garbage size read as zero would delete a live level.
fn strict_quantity(value: &Value) -> Option<f64> {
    let quantity = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (quantity.is_finite() && quantity >= 0.0).then_some(quantity)
}

fn malformed(venue: VenueId, value: &Value) -> AdapterError {
    AdapterError::MalformedLevel {
        venue,
        level: value.to_string(),
    }
}

/// Working book for one (venue, symbol) pair
///
/// The maps are unbounded; truncation happens only when a snapshot is materialized.
#[derive(Debug, Clone, Default)]
pub struct WorkingBook {
    bids: BTreeMap<Decimal, f64>,
    asks: BTreeMap<Decimal, f64>,
}

impl WorkingBook {
    /// Create an empty working book
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every update of a group, bids first
    pub fn apply_group(&mut self, group: &UpdateGroup) {
        for update in &group.bids {
            Self::apply(&mut self.bids, update);
        }
        for update in &group.asks {
            Self::apply(&mut self.asks, update);
        }
    }

    /// Apply a single bid update
    pub fn apply_bid(&mut self, update: &LevelUpdate) {
        Self::apply(&mut self.bids, update);
    }

    /// Apply a single ask update
    pub fn apply_ask(&mut self, update: &LevelUpdate) {
        Self::apply(&mut self.asks, update);
    }

    fn apply(side: &mut BTreeMap<Decimal, f64>, update: &LevelUpdate) {
        if update.price <= Decimal::ZERO {
            return;
        }
        if update.quantity == 0.0 {
            side.remove(&update.price);
        } else if update.quantity > 0.0 {
            side.insert(update.price, update.quantity);
        }
    }

    /// Materialize the best `depth` levels per side (capped at [`BOOK_DEPTH`])
    pub fn snapshot(
        &self,
        venue: VenueId,
        symbol: &str,
        timestamp_ns: u64,
        depth: usize,
    ) -> OrderBookSnapshot {
        let depth = depth.min(BOOK_DEPTH);
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(price, qty)| PriceLevel::new(price.to_f64().unwrap_or(0.0), *qty))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|(price, qty)| PriceLevel::new(price.to_f64().unwrap_or(0.0), *qty))
            .collect();

        OrderBookSnapshot::from_levels(venue, symbol.to_string(), timestamp_ns, bids, asks)
    }

    /// Quantity resting at a bid price
    pub fn bid_quantity(&self, price: &Decimal) -> Option<f64> {
        self.bids.get(price).copied()
    }

    /// Quantity resting at an ask price
    pub fn ask_quantity(&self, price: &Decimal) -> Option<f64> {
        self.asks.get(price).copied()
    }

    /// Number of bid levels held
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels held
    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    /// True when no level is held on either side
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Working books of one provider, keyed by canonical symbol
#[derive(Debug)]
pub struct BookState {
    books: HashMap<String, WorkingBook>,
    depth: usize,
}

impl Default for BookState {
    fn default() -> Self {
        Self::new()
    }
}

impl BookState {
    /// Create a book store materializing [`BOOK_DEPTH`] levels
    pub fn new() -> Self {
        Self::with_depth(BOOK_DEPTH)
    }

    /// Create a book store materializing `depth` levels (capped at [`BOOK_DEPTH`])
    pub fn with_depth(depth: usize) -> Self {
        Self {
            books: HashMap::new(),
            depth: depth.clamp(1, BOOK_DEPTH),
        }
    }

    /// Levels per side in materialized snapshots
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Merge a batch into the symbol's working book
    ///
    /// Returns `None` when both sides are empty afterwards.
    pub fn merge(
        &mut self,
        venue: VenueId,
        symbol: &str,
        groups: &[UpdateGroup],
        timestamp_ns: u64,
    ) -> Option<OrderBookSnapshot> {
        let depth = self.depth();
        let book = self.books.entry(symbol.to_string()).or_default();
        for group in groups {
            book.apply_group(group);
        }

        if book.is_empty() {
            None
        } else {
            Some(book.snapshot(venue, symbol, timestamp_ns, depth))
        }
    }

    /// Working book for a symbol, if one has been created
    pub fn book(&self, symbol: &str) -> Option<&WorkingBook> {
        self.books.get(symbol)
    }

    /// Drop the working book of one symbol
    pub fn reset(&mut self, symbol: &str) {
        self.books.remove(symbol);
    }

    /// Drop every working book, e.g. after a reconnect
    pub fn clear(&mut self) {
        self.books.clear();
    }

    /// Number of symbols with a working book
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// True when no symbol has a working book
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
