//! Fixed-window rolling statistics
//!
//! Running sum and sum of squares give O(1) updates. Variance is the population variance
//! `E[x²] - E[x]²`, clamped at zero against floating point cancellation.

use std::collections::VecDeque;

/// Default number of samples kept per window
pub const DEFAULT_WINDOW: usize = 20;

/// Rolling volatility and order flow imbalance over the last `window` samples
#[derive(Debug, Clone)]
pub struct RollingStats {
    max_size: usize,
    window: VecDeque<f64>,
    ofi_window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    last_bid_size: f64,
    last_ask_size: f64,
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RollingStats {
    /// Create statistics over `window` samples; a zero window is treated as one
    pub fn new(window: usize) -> Self {
        let max_size = window.max(1);
        Self {
            max_size,
            window: VecDeque::with_capacity(max_size),
            ofi_window: VecDeque::with_capacity(max_size),
            sum: 0.0,
            sum_sq: 0.0,
            last_bid_size: 0.0,
            last_ask_size: 0.0,
        }
    }

    /// Push a book midpoint
    pub fn update_mid(&mut self, value: f64) {
        if self.window.len() >= self.max_size {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }

        self.window.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Push a trade price
    pub fn update_trade(&mut self, value: f64) {
        self.update_mid(value);
    }

    /// Record best bid/ask sizes; the imbalance sample is `Δbid - Δask` since the last call
    pub fn update_ofi(&mut self, bid_size: f64, ask_size: f64) {
        let delta_bid = bid_size - self.last_bid_size;
        let delta_ask = ask_size - self.last_ask_size;

        if self.ofi_window.len() >= self.max_size {
            self.ofi_window.pop_front();
        }
        self.ofi_window.push_back(delta_bid - delta_ask);

        self.last_bid_size = bid_size;
        self.last_ask_size = ask_size;
    }

    /// Population standard deviation of the window, `0` below two samples
    pub fn volatility(&self) -> f64 {
        let count = self.window.len();
        if count < 2 {
            return 0.0;
        }

        let n = count as f64;
        let mean = self.sum / n;
        let variance = self.sum_sq / n - mean * mean;
        variance.max(0.0).sqrt()
    }

    /// Mean order flow imbalance over the window
    pub fn ofi_rolling(&self) -> f64 {
        if self.ofi_window.is_empty() {
            return 0.0;
        }
        self.ofi_window.iter().sum::<f64>() / self.ofi_window.len() as f64
    }

    /// Mean of the value window
    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum / self.window.len() as f64
        }
    }

    /// Samples currently held
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True when no sample is held
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Configured window length
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Drop every sample
    pub fn reset(&mut self) {
        self.window.clear();
        self.ofi_window.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.last_bid_size = 0.0;
        self.last_ask_size = 0.0;
    }
}
