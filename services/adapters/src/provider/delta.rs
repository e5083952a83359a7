//! Delta output mode: changed levels relative to the last published book
//!
//! The first book of a symbol is always a checkpoint. After that each book becomes a delta
//! holding only the levels whose quantity changed, with removed prices carried at quantity
//! `0`, and a full checkpoint is re-emitted whenever the checkpoint interval has elapsed.

use std::collections::HashMap;
use types::{OrderBookSnapshot, PriceLevel};

use crate::output::BookMessageKind;

/// Levels to publish for one book
#[derive(Debug, Clone, PartialEq)]
pub struct BookUpdate {
    /// Checkpoint or delta
    pub kind: BookMessageKind,
    /// Bid levels, best first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug, Default)]
struct Published {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    last_checkpoint_ms: u64,
}

/// Last published state per symbol
#[derive(Debug, Default)]
pub struct DeltaTracker {
    published: HashMap<String, Published>,
    checkpoint_every_ms: Option<u64>,
}

impl DeltaTracker {
    /// `None` disables periodic checkpoints; the first book of a symbol is still one
    pub fn new(checkpoint_every_ms: Option<u64>) -> Self {
        Self {
            published: HashMap::new(),
            checkpoint_every_ms,
        }
    }

    /// Levels to publish for `book` truncated to `depth`, `None` when nothing changed
    pub fn next(&mut self, book: &OrderBookSnapshot, depth: usize, now_ms: u64) -> Option<BookUpdate> {
        let bids: Vec<PriceLevel> = book.bids.iter().take(depth).copied().collect();
        let asks: Vec<PriceLevel> = book.asks.iter().take(depth).copied().collect();

        let Some(previous) = self.published.get_mut(&book.symbol) else {
            self.published.insert(
                book.symbol.clone(),
                Published {
                    bids: bids.clone(),
                    asks: asks.clone(),
                    last_checkpoint_ms: now_ms,
                },
            );
            return Some(BookUpdate {
                kind: BookMessageKind::Checkpoint,
                bids,
                asks,
            });
        };

        let checkpoint_due = self
            .checkpoint_every_ms
            .map_or(false, |every| now_ms.saturating_sub(previous.last_checkpoint_ms) >= every);

        let update = if checkpoint_due {
            previous.last_checkpoint_ms = now_ms;
            BookUpdate {
                kind: BookMessageKind::Checkpoint,
                bids: bids.clone(),
                asks: asks.clone(),
            }
        } else {
            let bid_changes = diff_side(&previous.bids, &bids, true);
            let ask_changes = diff_side(&previous.asks, &asks, false);
            if bid_changes.is_empty() && ask_changes.is_empty() {
                return None;
            }
            BookUpdate {
                kind: BookMessageKind::Delta,
                bids: bid_changes,
                asks: ask_changes,
            }
        };

        previous.bids = bids;
        previous.asks = asks;
        Some(update)
    }

    /// Forget every symbol, e.g. after a reconnect
    pub fn clear(&mut self) {
        self.published.clear();
    }
}

fn diff_side(previous: &[PriceLevel], current: &[PriceLevel], descending: bool) -> Vec<PriceLevel> {
    let mut changes: Vec<PriceLevel> = current
        .iter()
        .filter(|level| {
            !previous
                .iter()
                .any(|old| old.price == level.price && old.quantity == level.quantity)
        })
        .copied()
        .collect();

    changes.extend(
        previous
            .iter()
            .filter(|old| !current.iter().any(|level| level.price == old.price))
            .map(|old| PriceLevel::new(old.price, 0.0)),
    );

    changes.sort_by(|a, b| {
        if descending {
            b.price.total_cmp(&a.price)
        } else {
            a.price.total_cmp(&b.price)
        }
    });
    changes
}
