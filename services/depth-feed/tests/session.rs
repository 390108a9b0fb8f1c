//! Session loop tests
//!
//! Run the session on a paused clock with in-memory channels standing in for
//! the transports.

use std::time::Duration;

use depth_feed::engine::ReconciliationEngine;
use depth_feed::events::{Channel, ControlOp};
use depth_feed::price::PriceDirection;
use depth_feed::sequence::SyncState;
use depth_feed::session::{feed_channels, Session};
use tokio::sync::watch;
use types::numeric::Price;

fn px(value: u64) -> Price {
    Price::from_u64(value).unwrap()
}

const SNAPSHOT: &str = r#"{"topic":"orderbook.BTCUSDT","data":{"type":"snapshot","symbol":"BTCUSDT","seqNum":10,"asks":[["101","1"],["102","2"]],"bids":[["100","5"]]}}"#;
const DELTA_NEW_ASK: &str = r#"{"topic":"orderbook.BTCUSDT","data":{"type":"delta","symbol":"BTCUSDT","seqNum":11,"prevSeqNum":10,"asks":[["103","4"]],"bids":[]}}"#;
const DELTA_GAP: &str = r#"{"topic":"orderbook.BTCUSDT","data":{"type":"delta","symbol":"BTCUSDT","seqNum":13,"prevSeqNum":12,"asks":[["101","0"]],"bids":[]}}"#;

#[tokio::test(start_paused = true)]
async fn test_session_subscribes_applies_and_expires() {
    let (session, mut views) = Session::new(ReconciliationEngine::with_defaults());
    let (channels, mut book, mut trades) = feed_channels(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(channels, shutdown_rx));

    let sub = book.control.recv().await.unwrap();
    assert_eq!(sub.op, ControlOp::Subscribe);
    assert!(matches!(sub.channel(), Some(Channel::Book { .. })));
    let sub = trades.control.recv().await.unwrap();
    assert!(matches!(sub.channel(), Some(Channel::Trades { .. })));

    book.inbound.send(SNAPSHOT.to_string()).await.unwrap();
    book.inbound.send(DELTA_NEW_ASK.to_string()).await.unwrap();
    views
        .wait_for(|v| v.last_sequence == Some(11))
        .await
        .unwrap();
    {
        let view = views.borrow();
        assert_eq!(view.sync_state, SyncState::Synced);
        assert!(view.asks[2].is_new());
    }

    // Paused clock auto-advances to the highlight deadline
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!views.borrow().asks[2].is_new());
    assert_eq!(views.borrow().stats.highlights_cleared, 1);

    shutdown_tx.send(true).unwrap();
    let engine = handle.await.unwrap();
    assert!(engine.is_closed());

    let unsub = book.control.recv().await.unwrap();
    assert_eq!(unsub.op, ControlOp::Unsubscribe);
    let unsub = trades.control.recv().await.unwrap();
    assert_eq!(unsub.op, ControlOp::Unsubscribe);
    // Control senders are dropped once the session returns
    assert!(book.control.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_session_routes_resubscribe_to_book_transport() {
    let (session, mut views) = Session::new(ReconciliationEngine::with_defaults());
    let (channels, mut book, mut trades) = feed_channels(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(channels, shutdown_rx));

    book.control.recv().await.unwrap();
    trades.control.recv().await.unwrap();

    book.inbound.send(SNAPSHOT.to_string()).await.unwrap();
    book.inbound.send(DELTA_GAP.to_string()).await.unwrap();

    let unsub = book.control.recv().await.unwrap();
    let sub = book.control.recv().await.unwrap();
    assert_eq!(unsub.op, ControlOp::Unsubscribe);
    assert_eq!(sub.op, ControlOp::Subscribe);
    assert_eq!(sub.args, vec!["orderbook.BTCUSDT".to_string()]);
    assert!(trades.control.try_recv().is_err());

    views
        .wait_for(|v| v.stats.gaps_detected == 1)
        .await
        .unwrap();
    assert_eq!(views.borrow().asks[0].price, px(101));
    assert_eq!(views.borrow().sync_state, SyncState::Unsynced);

    // Both streams ending stops the session
    drop(book.inbound);
    drop(trades.inbound);
    let engine = handle.await.unwrap();
    assert!(engine.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_session_publishes_trades() {
    let (session, mut views) = Session::new(ReconciliationEngine::with_defaults());
    let (channels, book, trades) = feed_channels(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(channels, shutdown_rx));

    trades
        .inbound
        .send(r#"{"data":[{"price":"100"}]}"#.to_string())
        .await
        .unwrap();
    trades
        .inbound
        .send(r#"{"data":[{"price":"99.5"},{"price":"120"}]}"#.to_string())
        .await
        .unwrap();

    views
        .wait_for(|v| v.stats.trade_batches == 2)
        .await
        .unwrap();
    assert_eq!(views.borrow().direction, PriceDirection::Down);
    assert_eq!(views.borrow().last_price, Some("99.5".parse().unwrap()));

    drop(shutdown_tx);
    handle.await.unwrap();
    drop(book);
}
