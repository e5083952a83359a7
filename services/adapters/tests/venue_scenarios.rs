//! End-to-end decoding of representative frames from every venue through the codec table

use market_feed::{codec, BookState, DecodedFrame, MessageClassification, PriceLevel, Side, VenueId};
use rust_decimal_macros::dec;

fn decode(venue: VenueId, raw: &str, books: &mut BookState) -> DecodedFrame {
    codec(venue).decode_frame(raw, books)
}

#[test]
fn bybit_trade_frame() {
    let mut books = BookState::new();
    let frame = decode(
        VenueId::Bybit,
        r#"{"topic":"publicTrade.BTCUSDT","data":[{"s":"BTCUSDT","p":"50000.1","v":"0.01","S":"Buy","i":"123"}]}"#,
        &mut books,
    );

    assert_eq!(frame.classification(), MessageClassification::Trade);
    let trade = frame.trade().unwrap();
    assert_eq!(trade.exchange, VenueId::Bybit);
    assert_eq!(trade.symbol, "BTC-USDT");
    assert_eq!(trade.price, 50000.1);
    assert_eq!(trade.amount, 0.01);
    assert_eq!(trade.side, Side::Buy);
    assert_eq!(trade.trade_id, "123");
    assert!(trade.timestamp_ns > 0);
}

#[test]
fn binance_depth_update_frame() {
    let mut books = BookState::new();
    let frame = decode(
        VenueId::Binance,
        r#"{"e":"depthUpdate","s":"BTCUSDT","b":[["100","2"]],"a":[["101","3"]]}"#,
        &mut books,
    );

    assert_eq!(frame.classification(), MessageClassification::Book);
    let book = frame.book().unwrap();
    assert_eq!(book.symbol, "BTC-USDT");
    assert_eq!(book.bids, vec![PriceLevel::new(100.0, 2.0)]);
    assert_eq!(book.asks, vec![PriceLevel::new(101.0, 3.0)]);
    assert!(books.is_empty(), "full-snapshot venues keep no working book");
}

#[test]
fn dydx_insert_then_remove_in_one_batch() {
    let mut books = BookState::new();
    let frame = decode(
        VenueId::DYdX,
        r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"BTC-USD","contents":[{"bids":[["100","1"]]},{"bids":[["100","0"]]}]}"#,
        &mut books,
    );

    assert!(frame.book().map_or(true, |book| book.bids.iter().all(|l| l.price != 100.0)));
    let working = books.book("BTC-USD").unwrap();
    assert_eq!(working.bid_quantity(&dec!(100)), None);
}

#[test]
fn dydx_batch_keeps_other_levels() {
    let mut books = BookState::new();
    decode(
        VenueId::DYdX,
        r#"{"type":"subscribed","channel":"v4_orderbook","id":"ETH-USD","contents":{"bids":[{"price":"2000","size":"1"},{"price":"1999","size":"2"}],"asks":[{"price":"2001","size":"1"}]}}"#,
        &mut books,
    );

    let frame = decode(
        VenueId::DYdX,
        r#"{"type":"channel_batch_data","channel":"v4_orderbook","id":"ETH-USD","contents":[{"bids":[["2000","0"]]},{"asks":[["2002","4"]]}]}"#,
        &mut books,
    );

    let book = frame.book().unwrap();
    assert_eq!(book.bids, vec![PriceLevel::new(1999.0, 2.0)]);
    assert_eq!(book.asks, vec![PriceLevel::new(2001.0, 1.0), PriceLevel::new(2002.0, 4.0)]);
}

#[test]
fn hyperliquid_book_and_trade() {
    let mut books = BookState::new();
    let book = decode(
        VenueId::Hyperliquid,
        r#"{"channel":"l2Book","data":{"coin":"ETH","time":1,"levels":[[{"px":"2000","sz":"1","n":1}],[{"px":"2001","sz":"2","n":3}]]}}"#,
        &mut books,
    );
    let book = book.book().unwrap();
    assert_eq!(book.best_bid(), Some(&PriceLevel::new(2000.0, 1.0)));
    assert_eq!(book.best_ask(), Some(&PriceLevel::new(2001.0, 2.0)));

    let trade = decode(
        VenueId::Hyperliquid,
        r#"{"channel":"trades","data":[{"coin":"ETH","side":"B","px":"2000.5","sz":"0.3","tid":7}]}"#,
        &mut books,
    );
    let trade = trade.trade().unwrap();
    assert_eq!(trade.symbol, "ETH-USDC-PERP");
    assert_eq!(trade.side, Side::Buy);
    assert_eq!(trade.trade_id, "7");
}

#[test]
fn uniswap_swap_log_is_placeholder_trade() {
    let mut books = BookState::new();
    let raw = format!(
        r#"{{"jsonrpc":"2.0","method":"eth_subscription","params":{{"subscription":"0x1","result":{{"topics":["{}"],"data":"0x00","transactionHash":"0xfeed"}}}}}}"#,
        market_feed::input::venues::uniswap_v4::SWAP_EVENT_SIG
    );

    let frame = decode(VenueId::UniswapV4, &raw, &mut books);
    let trade = frame.trade().unwrap();
    assert_eq!(trade.symbol, "WETH-USDC");
    assert_eq!(trade.trade_id, "0xfeed");
    assert_eq!(trade.price, 0.0);
}

#[test]
fn unparsable_frames_are_unknown_everywhere() {
    for venue in VenueId::ALL {
        let mut books = BookState::new();
        for raw in ["not json", "", "{", "[1, 2"] {
            let frame = decode(venue, raw, &mut books);
            assert_eq!(frame.classification(), MessageClassification::Unknown, "{} {:?}", venue, raw);
        }
    }
}

#[test]
fn missing_required_fields_are_errors_everywhere() {
    let frames = [
        (VenueId::Bybit, r#"{"topic":"publicTrade.BTCUSDT","data":[{"p":"1","v":"1"}]}"#),
        (VenueId::Binance, r#"{"e":"trade","p":"1","q":"1"}"#),
        (VenueId::DYdX, r#"{"type":"channel_data","channel":"v4_trades"}"#),
        (VenueId::Hyperliquid, r#"{"channel":"trades","data":[{"px":"1","sz":"1"}]}"#),
    ];

    for (venue, raw) in frames {
        let mut books = BookState::new();
        let frame = decode(venue, raw, &mut books);
        assert_eq!(frame.classification(), MessageClassification::Error, "{}", venue);
        assert!(frame.trade().is_none());
        assert!(books.is_empty());
    }
}
