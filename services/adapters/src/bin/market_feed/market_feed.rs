//! Market feed binary - runs every feed of one configuration file
//!
//! Usage:
//!   market_feed --config config/market_feed.toml
//!   market_feed --config config/market_feed.toml --log-json --stats-interval-secs 30
//!   market_feed --init-config config/market_feed.toml

use anyhow::{bail, Context, Result};
use clap::Parser;
use market_feed::{FeedHandler, FeedHandlerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "market_feed")]
#[command(about = "Multi-venue market data feed handler")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable JSON logging format
    #[arg(long)]
    log_json: bool,

    /// Seconds between stats reports, 0 disables them
    #[arg(long, default_value_t = 10)]
    stats_interval_secs: u64,

    /// Write an example configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    if let Some(path) = &args.init_config {
        FeedHandlerConfig::write_example(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(());
    }

    let Some(config_path) = &args.config else {
        bail!("--config <PATH> is required unless --init-config is given");
    };

    info!("Starting market feed");
    let config = FeedHandlerConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        "Bus: trades port {}, books port {}, enabled {}",
        config.trades_port, config.books_port, config.enable_bus
    );
    for feed in &config.feeds {
        info!("Feed {}: {:?}", feed.name, feed.symbols);
    }

    let mut handler = FeedHandler::new(config);
    handler.add_configured_feeds().context("Failed to add feeds")?;
    handler.start().await.context("Failed to start feed handler")?;

    let interval_secs = args.stats_interval_secs;
    let mut stats_timer = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    stats_timer.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = stats_timer.tick(), if interval_secs > 0 => log_stats(&handler),
        }
    }

    handler.stop().await;
    log_stats(&handler);
    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if args.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn log_stats(handler: &FeedHandler) {
    for feed in handler.get_stats() {
        info!(
            "{} - Received: {}, Published: {}, Errors: {}",
            feed.exchange, feed.messages_received, feed.messages_published, feed.errors
        );
    }
}
