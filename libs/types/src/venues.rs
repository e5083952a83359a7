//! # Venue Registry
//!
//! ## Purpose
//!
//! Closed set of market data venues the feed services know how to speak to. Each venue maps
//! to exactly one adapter codec; adding a venue means adding a variant here and the compiler
//! then points at every dispatch site that needs a new arm.
//!
//! ## Integration Points
//!
//! - **Configuration**: feed entries name their venue by string, resolved with [`VenueId::from_name`]
//! - **Canonical Events**: every trade and book carries the `VenueId` it was decoded from
//! - **Bus Payloads**: serialized as the lowercase configuration name
//!
//! ## Venue Classes
//!
//! | Venue | Class | Book Feed |
//! |-------|-------|-----------|
//! | Bybit | CEX spot | full snapshot |
//! | Binance | CEX spot | full snapshot |
//! | DYdX | perpetual DEX (off-chain book) | deltas |
//! | Hyperliquid | perpetual DEX (off-chain book) | full snapshot |
//! | UniswapV4 | on-chain AMM | placeholder |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Venue identifiers for the supported market data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueId {
    /// Bybit v5 public spot stream
    Bybit,
    /// Binance spot stream
    Binance,
    /// dYdX v4 indexer stream
    #[serde(rename = "dydx")]
    DYdX,
    /// Hyperliquid perpetuals stream
    Hyperliquid,
    /// Uniswap v4 pool manager logs over JSON-RPC
    #[serde(rename = "uniswapv4")]
    UniswapV4,
}

/// Errors resolving a venue from its configured name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VenueParseError {
    /// Name does not match any supported venue
    #[error("Unsupported exchange: {0}")]
    Unsupported(String),
}

impl VenueId {
    /// Every supported venue, in registry order
    pub const ALL: [VenueId; 5] = [
        VenueId::Bybit,
        VenueId::Binance,
        VenueId::DYdX,
        VenueId::Hyperliquid,
        VenueId::UniswapV4,
    ];

    /// Resolve a venue from its configuration name (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self, VenueParseError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bybit" => Ok(VenueId::Bybit),
            "binance" => Ok(VenueId::Binance),
            "dydx" => Ok(VenueId::DYdX),
            "hyperliquid" => Ok(VenueId::Hyperliquid),
            "uniswapv4" | "uniswap_v4" => Ok(VenueId::UniswapV4),
            _ => Err(VenueParseError::Unsupported(name.to_string())),
        }
    }

    /// Lowercase configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Bybit => "bybit",
            VenueId::Binance => "binance",
            VenueId::DYdX => "dydx",
            VenueId::Hyperliquid => "hyperliquid",
            VenueId::UniswapV4 => "uniswapv4",
        }
    }

    /// Whether the venue streams incremental book deltas that must be reconstructed
    pub fn is_delta_venue(&self) -> bool {
        matches!(self, VenueId::DYdX)
    }

    /// Whether the venue settles on-chain
    pub fn is_on_chain(&self) -> bool {
        matches!(self, VenueId::UniswapV4)
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VenueId {
    type Err = VenueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VenueId::from_name(s)
    }
}
