//! Configuration for the feed handler and its feeds
//!
//! Settings come from a TOML file with `MARKET_FEED_*` environment overrides, or from the
//! environment alone. Every field has a default so a file only lists what it changes.
//!
//! ```toml
//! trades_port = 5556
//! books_port = 5557
//! depth_levels = 10
//!
//! [[feeds]]
//! exchange = "bybit"
//! symbols = ["BTC-USDT", "ETH-USDT"]
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use types::{VenueId, BOOK_DEPTH};

use crate::input::ConnectionConfig;
use crate::provider::{OutputMode, OutputOptions};
use crate::{AdapterError, Result};

/// Environment prefix for overrides, e.g. `MARKET_FEED_TRADES_PORT`
pub const ENV_PREFIX: &str = "MARKET_FEED";

/// One venue feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Venue name, e.g. `bybit`
    #[serde(alias = "exchange")]
    pub name: String,

    /// Symbols to subscribe, canonical form (`BTC-USDT`)
    pub symbols: Vec<String>,

    /// Subscribe to trades
    pub enable_trades: bool,

    /// Subscribe to order books
    pub enable_orderbook: bool,

    /// Accepted for file compatibility but has no effect; book output is chosen by
    /// [`FeedHandlerConfig::output_options`]
    pub snapshots_only: bool,

    /// Snapshot interval in seconds, must be at least 1; books are still published on every
    /// update
    pub snapshot_interval: u32,

    /// Maximum reconnection attempts
    pub reconnect_attempts: u32,

    /// Base delay between reconnections in milliseconds
    pub reconnect_delay_ms: u64,

    /// Endpoint override, the venue default when absent
    pub ws_url: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            symbols: Vec::new(),
            enable_trades: true,
            enable_orderbook: true,
            snapshots_only: true,
            snapshot_interval: 1,
            reconnect_attempts: 10,
            reconnect_delay_ms: 5000,
            ws_url: None,
        }
    }
}

impl ExchangeConfig {
    /// Feed for `name` with default settings
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            symbols,
            ..Self::default()
        }
    }

    /// Venue named by this feed
    pub fn venue(&self) -> Result<VenueId> {
        Ok(VenueId::from_name(&self.name)?)
    }

    /// Endpoint to connect to
    pub fn url(&self, venue: VenueId) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| crate::input::codec(venue).default_url.to_string())
    }

    /// Connection settings derived from the retry policy
    pub fn connection_config(&self, venue: VenueId) -> ConnectionConfig {
        ConnectionConfig::for_feed(self.url(venue), self.reconnect_attempts, self.reconnect_delay_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        VenueId::from_name(&self.name).map_err(|e| e.to_string())?;

        if self.symbols.is_empty() {
            return Err(format!("Feed {} has no symbols", self.name));
        }

        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(format!("Feed {} has an empty symbol", self.name));
        }

        if !self.enable_trades && !self.enable_orderbook {
            return Err(format!("Feed {} enables neither trades nor orderbook", self.name));
        }

        if self.snapshot_interval == 0 {
            return Err(format!("Feed {} snapshot_interval must be at least 1", self.name));
        }

        if let Some(url) = &self.ws_url {
            let parsed = url::Url::parse(url).map_err(|e| format!("Invalid ws_url {}: {}", url, e))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(format!("ws_url must start with ws:// or wss://, got {}", url));
            }
        }

        Ok(())
    }
}

/// Feed handler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedHandlerConfig {
    /// Trades bus port
    pub trades_port: u16,

    /// Books bus port
    pub books_port: u16,

    /// Bind the bus; callbacks still fire when disabled
    pub enable_bus: bool,

    /// Rolling statistics window
    pub window_size: usize,

    /// Levels per side in published books
    pub depth_levels: usize,

    /// Publish full snapshots
    pub emit_snapshot: bool,

    /// Publish changed levels only
    pub emit_delta: bool,

    /// Publish periodic checkpoints in delta mode
    pub emit_checkpoint: bool,

    /// Checkpoint interval in milliseconds
    pub checkpoint_every_ms: u64,

    /// Configured feeds
    pub feeds: Vec<ExchangeConfig>,
}

impl Default for FeedHandlerConfig {
    fn default() -> Self {
        Self {
            trades_port: 5556,
            books_port: 5557,
            enable_bus: true,
            window_size: 20,
            depth_levels: BOOK_DEPTH,
            emit_snapshot: true,
            emit_delta: false,
            emit_checkpoint: false,
            checkpoint_every_ms: 1000,
            feeds: Vec::new(),
        }
    }
}

impl FeedHandlerConfig {
    /// Load a TOML file, then apply `MARKET_FEED_*` overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading configuration from {}", path.display());

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AdapterError::Configuration(format!("{}: {}", path.display(), e)))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AdapterError::Configuration(format!("{}: {}", path.display(), e)))?;

        loaded.validate().map_err(AdapterError::Configuration)?;
        tracing::info!("Configuration loaded: {} feeds", loaded.feeds.len());
        Ok(loaded)
    }

    /// Handler settings from environment variables with defaults; feeds stay empty
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            trades_port: env_parse("TRADES_PORT").unwrap_or(defaults.trades_port),
            books_port: env_parse("BOOKS_PORT").unwrap_or(defaults.books_port),
            enable_bus: env_parse("ENABLE_BUS").unwrap_or(defaults.enable_bus),
            window_size: env_parse("WINDOW_SIZE").unwrap_or(defaults.window_size),
            depth_levels: env_parse("DEPTH_LEVELS").unwrap_or(defaults.depth_levels),
            emit_snapshot: env_parse("EMIT_SNAPSHOT").unwrap_or(defaults.emit_snapshot),
            emit_delta: env_parse("EMIT_DELTA").unwrap_or(defaults.emit_delta),
            emit_checkpoint: env_parse("EMIT_CHECKPOINT").unwrap_or(defaults.emit_checkpoint),
            checkpoint_every_ms: env_parse("CHECKPOINT_EVERY_MS").unwrap_or(defaults.checkpoint_every_ms),
            feeds: Vec::new(),
        }
    }

    /// Output options applied to every provider
    pub fn output_options(&self) -> OutputOptions {
        let mode = if self.emit_delta {
            OutputMode::Delta {
                checkpoint_every_ms: self.emit_checkpoint.then_some(self.checkpoint_every_ms),
            }
        } else {
            OutputMode::Snapshot
        };

        OutputOptions {
            mode,
            depth_levels: self.depth_levels,
            window_size: self.window_size,
        }
    }

    /// Validate handler settings and every feed
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.depth_levels == 0 || self.depth_levels > BOOK_DEPTH {
            return Err(format!(
                "depth_levels must be between 1 and {}, got {}",
                BOOK_DEPTH, self.depth_levels
            ));
        }

        if self.window_size == 0 {
            return Err("window_size must be positive".to_string());
        }

        if self.enable_bus && self.trades_port != 0 && self.trades_port == self.books_port {
            return Err(format!("trades_port and books_port are both {}", self.trades_port));
        }

        if !self.emit_snapshot && !self.emit_delta {
            return Err("one of emit_snapshot or emit_delta must be enabled".to_string());
        }

        if self.emit_delta && self.emit_checkpoint && self.checkpoint_every_ms == 0 {
            return Err("checkpoint_every_ms must be positive".to_string());
        }

        for feed in &self.feeds {
            feed.validate()?;
        }

        Ok(())
    }

    /// Write a commented example configuration that [`FeedHandlerConfig::load`] accepts
    pub fn write_example(path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), EXAMPLE_CONFIG)?;
        tracing::info!("Example config created: {}", path.as_ref().display());
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(format!("{}_{}", ENV_PREFIX, key))
        .ok()
        .and_then(|value| value.trim().parse().ok())
}

const EXAMPLE_CONFIG: &str = r#"# Market feed configuration

# Bus endpoints: trades and books publish on separate ports
trades_port = 5556
books_port = 5557
enable_bus = true

# Feature windows and published depth (1-10)
window_size = 20
depth_levels = 10

# Book output: full snapshots, or changed levels plus periodic checkpoints
emit_snapshot = true
emit_delta = false
emit_checkpoint = false
checkpoint_every_ms = 1000

[[feeds]]
exchange = "bybit"
symbols = ["BTC-USDT", "ETH-USDT", "SOL-USDT"]
snapshots_only = true
snapshot_interval = 1

[[feeds]]
exchange = "binance"
symbols = ["BTC-USDT", "ETH-USDT"]
snapshots_only = true
snapshot_interval = 1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedHandlerConfig::default();
        assert_eq!(config.trades_port, 5556);
        assert_eq!(config.books_port, 5557);
        assert_eq!(config.output_options().mode, OutputMode::Snapshot);
        assert!(config.validate().is_ok());

        let feed = ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]);
        assert_eq!(feed.reconnect_attempts, 10);
        assert_eq!(feed.reconnect_delay_ms, 5000);
        assert!(feed.validate().is_ok());
        assert_eq!(feed.url(VenueId::Bybit), "wss://stream.bybit.com:443/v5/public/spot");
    }

    #[test]
    fn test_snapshot_settings_do_not_change_outputs() {
        let mut feed = ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]);
        feed.snapshots_only = false;
        feed.snapshot_interval = 30;
        assert!(feed.validate().is_ok());

        let config = FeedHandlerConfig {
            feeds: vec![feed.clone()],
            ..FeedHandlerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.output_options(), FeedHandlerConfig::default().output_options());

        feed.snapshot_interval = 0;
        assert!(feed.validate().unwrap_err().contains("snapshot_interval"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = FeedHandlerConfig::default();
        config.depth_levels = 11;
        assert!(config.validate().is_err());

        let mut config = FeedHandlerConfig::default();
        config.books_port = config.trades_port;
        assert!(config.validate().is_err());

        let mut config = FeedHandlerConfig::default();
        config.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = FeedHandlerConfig::default();
        config.feeds.push(ExchangeConfig::new("kraken", vec!["BTC-USD".to_string()]));
        assert_eq!(config.validate().unwrap_err(), "Unsupported exchange: kraken");

        let mut config = FeedHandlerConfig::default();
        config.feeds.push(ExchangeConfig::new("dydx", vec![]));
        assert!(config.validate().is_err());

        let mut feed = ExchangeConfig::new("binance", vec!["BTC-USDT".to_string()]);
        feed.ws_url = Some("https://stream.binance.com".to_string());
        assert!(feed.validate().is_err());
    }

    #[test]
    fn test_delta_output_options() {
        let config = FeedHandlerConfig {
            emit_snapshot: false,
            emit_delta: true,
            emit_checkpoint: true,
            checkpoint_every_ms: 250,
            depth_levels: 5,
            ..FeedHandlerConfig::default()
        };
        let options = config.output_options();
        assert_eq!(
            options.mode,
            OutputMode::Delta {
                checkpoint_every_ms: Some(250)
            }
        );
        assert_eq!(options.depth_levels, 5);
    }

    #[test]
    fn test_example_config_parses() {
        let parsed: FeedHandlerConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed.feeds.len(), 2);
        assert_eq!(parsed.feeds[0].name, "bybit");
        assert!(parsed.feeds[1].enable_orderbook);
        assert!(parsed.validate().is_ok());
    }
}
