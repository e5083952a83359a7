//! # Market Data Types
//!
//! Canonical representation every venue adapter maps its wire format onto.
//!
//! ## Design Philosophy
//!
//! - **One Data Model**: trades and books look identical regardless of the venue they came from
//! - **Receipt Time**: timestamps are assigned locally at decode time, never taken from venue payloads
//! - **Closed Venue Set**: [`VenueId`] is an exhaustive enum so venue dispatch is checked at compile time
//! - **Book Invariants**: [`OrderBookSnapshot`] construction enforces ordering, depth cap and
//!   the absence of zero-quantity levels
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{OrderBookSnapshot, PriceLevel, VenueId};
//!
//! let venue = VenueId::from_name("Binance").unwrap();
//! let book = OrderBookSnapshot::from_levels(
//!     venue,
//!     "BTC-USDT".to_string(),
//!     0,
//!     vec![PriceLevel::new(100.0, 2.0), PriceLevel::new(101.0, 1.0)],
//!     vec![PriceLevel::new(102.0, 3.0)],
//! );
//! assert_eq!(book.best_bid().map(|l| l.price), Some(101.0));
//! ```

pub mod market;
pub mod venues;

pub use market::{
    CanonicalTrade, MessageClassification, OrderBookSnapshot, PriceLevel, Side, BOOK_DEPTH,
};
pub use venues::{VenueId, VenueParseError};
