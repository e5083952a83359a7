//! Derived features attached to published trades and books

use serde::{Deserialize, Serialize};
use types::{CanonicalTrade, OrderBookSnapshot};

use super::rolling_stats::RollingStats;

/// Top-of-book, depth and rolling features of one book
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookFeatures {
    /// `(best_bid + best_ask) / 2`
    pub midpoint: f64,
    /// `(best_ask - best_bid) / midpoint`
    pub relative_spread: f64,
    /// Level-1 notional, `bid_px * bid_sz + ask_px * ask_sz`
    pub breadth: f64,
    /// `(bid_sz - ask_sz) / (bid_sz + ask_sz)` at level 1
    pub imbalance_lvl1: f64,
    /// `sum(price * size)` over published bid levels
    pub bid_depth_n: f64,
    /// `sum(price * size)` over published ask levels
    pub ask_depth_n: f64,
    /// `bid_depth_n + ask_depth_n`
    pub depth_n: f64,
    /// Rolling standard deviation of the midpoint
    pub volatility_mid: f64,
    /// Rolling mean order flow imbalance
    pub ofi_rolling: f64,
    /// Window the rolling features were computed over
    pub window_size: usize,
}

impl BookFeatures {
    /// Compute features over the first `depth` levels and advance the rolling state
    ///
    /// Level-1 features stay zero unless both sides have a best level, and the rolling
    /// windows only advance in that case.
    pub fn compute(book: &OrderBookSnapshot, depth: usize, rolling: &mut RollingStats) -> Self {
        let bid_depth_n = notional(book.bids.iter().take(depth));
        let ask_depth_n = notional(book.asks.iter().take(depth));
        let mut features = Self {
            bid_depth_n,
            ask_depth_n,
            depth_n: bid_depth_n + ask_depth_n,
            window_size: rolling.capacity(),
            ..Self::default()
        };

        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            let midpoint = (bid.price + ask.price) / 2.0;
            let total = bid.quantity + ask.quantity;

            features.midpoint = midpoint;
            if midpoint > 0.0 {
                features.relative_spread = (ask.price - bid.price) / midpoint;
            }
            features.breadth = bid.price * bid.quantity + ask.price * ask.quantity;
            if total > 0.0 {
                features.imbalance_lvl1 = (bid.quantity - ask.quantity) / total;
            }

            rolling.update_mid(midpoint);
            rolling.update_ofi(bid.quantity, ask.quantity);
        }

        features.volatility_mid = rolling.volatility();
        features.ofi_rolling = rolling.ofi_rolling();
        features
    }
}

/// Features of one trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFeatures {
    /// Execution price
    pub transaction_price: f64,
    /// `price * amount`
    pub trading_volume: f64,
    /// Rolling standard deviation of trade prices
    pub volatility_transaction_price: f64,
    /// Window the rolling feature was computed over
    pub window_size: usize,
}

impl TradeFeatures {
    /// Compute features and advance the rolling state
    pub fn compute(trade: &CanonicalTrade, rolling: &mut RollingStats) -> Self {
        rolling.update_trade(trade.price);
        Self {
            transaction_price: trade.price,
            trading_volume: trade.notional(),
            volatility_transaction_price: rolling.volatility(),
            window_size: rolling.capacity(),
        }
    }
}

fn notional<'a>(levels: impl Iterator<Item = &'a types::PriceLevel>) -> f64 {
    levels.map(|level| level.price * level.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{PriceLevel, Side, VenueId};

    fn book(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> OrderBookSnapshot {
        OrderBookSnapshot::from_levels(VenueId::Bybit, "BTC-USDT".to_string(), 1, bids, asks)
    }

    #[test]
    fn test_top_of_book_features() {
        let mut rolling = RollingStats::new(20);
        let snapshot = book(
            vec![PriceLevel::new(100.0, 3.0), PriceLevel::new(99.0, 1.0)],
            vec![PriceLevel::new(102.0, 1.0)],
        );
        let features = BookFeatures::compute(&snapshot, 10, &mut rolling);

        assert_eq!(features.midpoint, 101.0);
        assert!((features.relative_spread - 2.0 / 101.0).abs() < 1e-12);
        assert_eq!(features.breadth, 300.0 + 102.0);
        assert_eq!(features.imbalance_lvl1, 0.5);
        assert_eq!(features.bid_depth_n, 399.0);
        assert_eq!(features.ask_depth_n, 102.0);
        assert_eq!(features.depth_n, 501.0);
        assert_eq!(features.volatility_mid, 0.0);
        assert_eq!(features.window_size, 20);
    }

    #[test]
    fn test_depth_limit_applies_to_depth_sums() {
        let mut rolling = RollingStats::default();
        let snapshot = book(
            vec![PriceLevel::new(100.0, 1.0), PriceLevel::new(99.0, 1.0)],
            vec![PriceLevel::new(101.0, 1.0), PriceLevel::new(102.0, 1.0)],
        );
        let features = BookFeatures::compute(&snapshot, 1, &mut rolling);
        assert_eq!(features.bid_depth_n, 100.0);
        assert_eq!(features.ask_depth_n, 101.0);
    }

    #[test]
    fn test_one_sided_book_keeps_level1_zero() {
        let mut rolling = RollingStats::default();
        let snapshot = book(vec![PriceLevel::new(100.0, 2.0)], vec![]);
        let features = BookFeatures::compute(&snapshot, 10, &mut rolling);
        assert_eq!(features.midpoint, 0.0);
        assert_eq!(features.imbalance_lvl1, 0.0);
        assert_eq!(features.bid_depth_n, 200.0);
        assert!(rolling.is_empty());
    }

    #[test]
    fn test_trade_features() {
        let mut rolling = RollingStats::new(20);
        let mut trade = CanonicalTrade {
            exchange: VenueId::Binance,
            symbol: "BTC-USDT".to_string(),
            price: 100.0,
            amount: 0.5,
            side: Side::Buy,
            trade_id: "1".to_string(),
            timestamp_ns: 1,
        };
        let first = TradeFeatures::compute(&trade, &mut rolling);
        assert_eq!(first.trading_volume, 50.0);
        assert_eq!(first.volatility_transaction_price, 0.0);

        trade.price = 102.0;
        let second = TradeFeatures::compute(&trade, &mut rolling);
        assert_eq!(second.transaction_price, 102.0);
        assert!((second.volatility_transaction_price - 1.0).abs() < 1e-9);
    }
}
