//! Output side: the market data bus and its payloads
//!
//! Trades and books go out on two separate endpoints so consumers subscribe only to the
//! stream they need. Both endpoints are shared by every feed of a handler.

pub mod bus_publisher;
pub mod messages;

pub use bus_publisher::BusPublisher;
pub use messages::{BookMessage, BookMessageKind, TradeMessage};

use crate::Result;

/// Trades and books endpoints of one feed handler
pub struct MarketDataBus {
    trades: BusPublisher,
    books: BusPublisher,
}

impl MarketDataBus {
    /// Bind both endpoints
    pub async fn bind(trades_port: u16, books_port: u16) -> Result<Self> {
        let trades = BusPublisher::bind("trades", trades_port).await?;
        let books = BusPublisher::bind("books", books_port).await?;
        Ok(Self { trades, books })
    }

    /// Publish a trade under its symbol
    pub fn publish_trade(&self, message: &TradeMessage) -> Result<()> {
        self.trades.publish(&message.symbol, message)
    }

    /// Publish a book under its symbol
    pub fn publish_book(&self, message: &BookMessage) -> Result<()> {
        self.books.publish(&message.symbol, message)
    }

    /// Trades endpoint
    pub fn trades(&self) -> &BusPublisher {
        &self.trades
    }

    /// Books endpoint
    pub fn books(&self) -> &BusPublisher {
        &self.books
    }
}
