//! Feed handler lifecycle against in-process frame sources and a real bus

use async_trait::async_trait;
use market_feed::{
    AdapterError, CanonicalTrade, ExchangeConfig, FeedHandler, FeedHandlerConfig, FrameSource,
    MarketDataCallbacks, OrderBookSnapshot, Result, TradeMessage, VenueId,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Frames pushed by the test; idles once the sender is dropped
struct ChannelSource {
    frames: mpsc::UnboundedReceiver<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        match self.frames.recv().await {
            Some(frame) => Ok(Some(frame)),
            None => std::future::pending().await,
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Refuses every connection
struct RefusingSource;

#[async_trait]
impl FrameSource for RefusingSource {
    async fn connect(&mut self) -> Result<()> {
        Err(AdapterError::ConnectionFailed {
            venue: VenueId::Binance,
            reason: "connection refused".to_string(),
        })
    }

    async fn send_text(&mut self, _text: String) -> Result<()> {
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Counter {
    trades: AtomicUsize,
    books: AtomicUsize,
    errors: AtomicUsize,
}

impl MarketDataCallbacks for Counter {
    fn on_trade(&self, _trade: &CanonicalTrade) {
        self.trades.fetch_add(1, Ordering::SeqCst);
    }

    fn on_orderbook(&self, _book: &OrderBookSnapshot) {
        self.books.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn channel_source() -> (ChannelSource, mpsc::UnboundedSender<String>, Arc<Mutex<Vec<String>>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let source = ChannelSource {
        frames: rx,
        sent: Arc::clone(&sent),
    };
    (source, tx, sent)
}

fn bus_config() -> FeedHandlerConfig {
    FeedHandlerConfig {
        trades_port: 0,
        books_port: 0,
        ..FeedHandlerConfig::default()
    }
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..400 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

const BYBIT_TRADE: &str = r#"{"topic":"publicTrade.BTCUSDT","data":[{"s":"BTCUSDT","p":"50000.1","v":"0.01","S":"Buy","i":"123"}]}"#;

#[tokio::test]
async fn failed_feed_does_not_block_the_others() {
    let (source, frames, sent) = channel_source();
    let counter = Arc::new(Counter::default());

    let mut handler = FeedHandler::new(bus_config());
    handler
        .add_feed_with_source(
            ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]),
            Box::new(source),
            Some(counter.clone()),
        )
        .unwrap();
    handler
        .add_feed_with_source(
            ExchangeConfig::new("binance", vec!["BTC-USDT".to_string()]),
            Box::new(RefusingSource),
            None,
        )
        .unwrap();
    assert_eq!(handler.num_feeds(), 2);

    handler.start().await.unwrap();
    assert!(handler.is_running());
    assert_eq!(sent.lock().unwrap().len(), 1);

    let trades = handler.bus().unwrap().trades();
    let addr = SocketAddr::from(([127, 0, 0, 1], trades.local_addr().port()));
    let subscriber = TcpStream::connect(addr).await.unwrap();
    wait_for(|| trades.subscriber_count() == 1).await;

    frames.send(BYBIT_TRADE.to_string()).unwrap();
    frames.send(BYBIT_TRADE.to_string()).unwrap();

    let mut lines = BufReader::new(subscriber).lines();
    let first = lines.next_line().await.unwrap().unwrap();
    let second = lines.next_line().await.unwrap().unwrap();

    let (topic, body) = first.split_once(' ').unwrap();
    assert_eq!(topic, "BTC-USDT");
    let message: TradeMessage = serde_json::from_str(body).unwrap();
    assert_eq!(message.exchange, VenueId::Bybit);
    assert_eq!(message.sequence, 1);
    assert_eq!(message.price, 50000.1);
    assert_eq!(message.features.transaction_price, 50000.1);

    let (_, body) = second.split_once(' ').unwrap();
    let message: TradeMessage = serde_json::from_str(body).unwrap();
    assert_eq!(message.sequence, 2);

    let stats = handler.get_stats();
    assert_eq!(stats[0].exchange, "bybit");
    assert_eq!(stats[0].messages_received, 2);
    assert_eq!(stats[0].messages_published, 2);
    assert_eq!(stats[1].exchange, "binance");
    assert_eq!(stats[1].messages_received, 0);
    assert_eq!(stats[1].messages_published, 0);
    assert_eq!(stats[1].errors, 1);
    assert_eq!(counter.trades.load(Ordering::SeqCst), 2);

    drop(lines);
    handler.stop().await;
    assert!(!handler.is_running());
    assert!(handler.bus().is_none());

    // Providers drop their bus handle on stop, so the listener goes away
    let mut refused = false;
    for _ in 0..400 {
        if TcpStream::connect(addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(refused, "trades port still accepting after stop");
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let (source, _frames, sent) = channel_source();
    let mut handler = FeedHandler::new(bus_config());
    handler
        .add_feed_with_source(
            ExchangeConfig::new("dydx", vec!["BTC-USD".to_string()]),
            Box::new(source),
            None,
        )
        .unwrap();

    handler.start().await.unwrap();
    handler.start().await.unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1, "second start must not resubscribe");

    let err = handler
        .add_feed(ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]), None)
        .unwrap_err();
    assert!(matches!(err, AdapterError::Configuration(_)));

    handler.stop().await;
    handler.stop().await;
    assert!(!handler.is_running());
}

#[tokio::test]
async fn delta_venue_books_reach_callbacks() {
    let (source, frames, _sent) = channel_source();
    let counter = Arc::new(Counter::default());
    let config = FeedHandlerConfig {
        enable_bus: false,
        ..FeedHandlerConfig::default()
    };

    let mut handler = FeedHandler::new(config);
    handler
        .add_feed_with_source(
            ExchangeConfig::new("dydx", vec!["BTC-USD".to_string()]),
            Box::new(source),
            Some(counter.clone()),
        )
        .unwrap();
    handler.start().await.unwrap();

    frames
        .send(r#"{"type":"subscribed","channel":"v4_orderbook","id":"BTC-USD","contents":{"bids":[["100","1"]],"asks":[["101","1"]]}}"#.to_string())
        .unwrap();
    frames
        .send(r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":"oops"}"#.to_string())
        .unwrap();
    frames.send("not json".to_string()).unwrap();

    wait_for(|| counter.errors.load(Ordering::SeqCst) == 1).await;
    handler.stop().await;

    let stats = handler.get_stats();
    assert_eq!(counter.books.load(Ordering::SeqCst), 1);
    assert_eq!(stats[0].messages_received, 1);
    assert_eq!(stats[0].messages_published, 0);
    assert_eq!(stats[0].errors, 1);
}

#[tokio::test]
async fn bus_port_conflict_fails_startup() {
    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let (source, _frames, sent) = channel_source();
    let mut handler = FeedHandler::new(FeedHandlerConfig {
        trades_port: port,
        books_port: 0,
        ..FeedHandlerConfig::default()
    });
    handler
        .add_feed_with_source(
            ExchangeConfig::new("bybit", vec!["BTC-USDT".to_string()]),
            Box::new(source),
            None,
        )
        .unwrap();

    assert!(handler.start().await.is_err());
    assert!(!handler.is_running());
    assert!(sent.lock().unwrap().is_empty());
}
