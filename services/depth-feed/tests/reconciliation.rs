//! End-to-end reconciliation tests
//!
//! Drives the engine with raw wire frames and checks what a reader sees:
//! - Snapshot + continuous deltas
//! - Gap detection and resubscribe
//! - Ladder ordering under random delta streams
//! - Depth aggregation and highlight lifetimes
//! - Trade price direction

use std::time::Duration;

use depth_feed::engine::{EngineConfig, ReconciliationEngine};
use depth_feed::events::ControlOp;
use depth_feed::price::PriceDirection;
use depth_feed::sequence::SyncState;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tokio::time::Instant;
use types::numeric::Price;
use types::side::BookSide;

fn px(value: u64) -> Price {
    Price::from_u64(value).unwrap()
}

fn book_frame(kind: &str, prev: Option<u64>, seq: u64, asks: &[(u64, u64)], bids: &[(u64, u64)]) -> String {
    let levels = |entries: &[(u64, u64)]| -> Vec<[String; 2]> {
        entries
            .iter()
            .map(|(p, s)| [p.to_string(), s.to_string()])
            .collect()
    };
    let mut data = serde_json::json!({
        "type": kind,
        "symbol": "BTCUSDT",
        "timestamp": 1708123456789u64 + seq,
        "seqNum": seq,
        "asks": levels(asks),
        "bids": levels(bids),
    });
    if let Some(prev) = prev {
        data["prevSeqNum"] = serde_json::json!(prev);
    }
    serde_json::json!({ "topic": "orderbook.BTCUSDT", "data": data }).to_string()
}

fn snapshot(seq: u64, asks: &[(u64, u64)], bids: &[(u64, u64)]) -> String {
    book_frame("snapshot", None, seq, asks, bids)
}

fn delta(prev: u64, seq: u64, asks: &[(u64, u64)], bids: &[(u64, u64)]) -> String {
    book_frame("delta", Some(prev), seq, asks, bids)
}

fn trade_frame(prices: &[&str]) -> String {
    let data: Vec<serde_json::Value> = prices
        .iter()
        .map(|p| serde_json::json!({ "price": p, "size": "0.5", "side": "Buy" }))
        .collect();
    serde_json::json!({ "topic": "publicTrade.BTCUSDT", "data": data }).to_string()
}

fn prices(engine: &ReconciliationEngine, side: BookSide) -> Vec<Price> {
    engine
        .ordered_top_n(side, 100)
        .iter()
        .map(|l| l.price)
        .collect()
}

#[test]
fn test_snapshot_then_deltas_from_wire() {
    let mut engine = ReconciliationEngine::with_defaults();
    let now = Instant::now();

    assert!(engine
        .handle_book_message(&snapshot(10, &[(101, 1), (102, 2)], &[(100, 5), (99, 1)]), now)
        .is_empty());
    assert!(engine
        .handle_book_message(&delta(10, 11, &[(101, 3)], &[(100, 0), (98, 4)]), now)
        .is_empty());

    assert_eq!(engine.sync_state(), SyncState::Synced);
    assert_eq!(engine.last_sequence(), Some(11));
    assert_eq!(prices(&engine, BookSide::Bid), vec![px(99), px(98)]);

    let asks = engine.top_display_rows(BookSide::Ask, 8);
    assert_eq!(asks[0].size, Decimal::from(3));
    assert!(asks[0].size_increased);

    let bids = engine.top_display_rows(BookSide::Bid, 8);
    assert!(bids[1].is_new);
    assert!(!bids[0].is_new);
}

#[test]
fn test_gap_resubscribes_once_and_leaves_book_untouched() {
    let mut engine = ReconciliationEngine::with_defaults();
    let now = Instant::now();
    engine.handle_book_message(&snapshot(10, &[(101, 1)], &[(100, 5)]), now);
    let before = engine.view();

    let out = engine.handle_book_message(&delta(9, 11, &[(101, 9)], &[(100, 0)]), now);

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].op, ControlOp::Unsubscribe);
    assert_eq!(out[1].op, ControlOp::Subscribe);
    assert!(out.iter().all(|m| m.args == vec!["orderbook.BTCUSDT".to_string()]));
    assert_eq!(engine.view().asks, before.asks);
    assert_eq!(engine.view().bids, before.bids);

    // Deltas after the gap wait for the next snapshot and emit nothing
    assert!(engine
        .handle_book_message(&delta(11, 12, &[(101, 9)], &[]), now)
        .is_empty());
    assert_eq!(engine.stats().gaps_detected, 1);

    engine.handle_book_message(&snapshot(40, &[(105, 1)], &[(104, 1)]), now);
    assert_eq!(engine.sync_state(), SyncState::Synced);
    assert!(engine
        .handle_book_message(&delta(40, 41, &[(106, 2)], &[]), now)
        .is_empty());
    assert_eq!(prices(&engine, BookSide::Ask), vec![px(105), px(106)]);
}

#[test]
fn test_envelope_without_data_is_ignored() {
    let mut engine = ReconciliationEngine::with_defaults();
    let now = Instant::now();
    engine.handle_book_message(&snapshot(10, &[(101, 1)], &[(100, 5)]), now);

    assert!(engine
        .handle_book_message(r#"{"success":true,"op":"subscribe"}"#, now)
        .is_empty());
    assert!(engine.handle_book_message("not json", now).is_empty());
    assert_eq!(engine.last_sequence(), Some(10));
    assert_eq!(engine.stats().envelopes_dropped, 2);
}

#[test]
fn test_depth_percentages_from_wire() {
    let mut engine = ReconciliationEngine::with_defaults();
    engine.handle_book_message(&snapshot(1, &[(10, 1), (11, 2), (12, 3)], &[]), Instant::now());

    let rows = engine.top_display_rows(BookSide::Ask, 8);
    let totals: Vec<Decimal> = rows.iter().map(|r| r.total).collect();
    assert_eq!(totals, vec![Decimal::from(1), Decimal::from(3), Decimal::from(6)]);
    assert_eq!(rows[0].percentage.round_dp(1), Decimal::new(167, 1));
    assert_eq!(rows[1].percentage, Decimal::from(50));
    assert_eq!(rows[2].percentage, Decimal::from(100));

    assert!(engine.top_display_rows(BookSide::Bid, 8).is_empty());
}

#[test]
fn test_highlights_expire_after_configured_duration() {
    let mut engine = ReconciliationEngine::new(EngineConfig {
        highlight_duration: Duration::from_millis(800),
        ..EngineConfig::default()
    });
    let t0 = Instant::now();
    engine.handle_book_message(&snapshot(1, &[(101, 2)], &[(100, 2)]), t0);
    engine.handle_book_message(&delta(1, 2, &[(101, 5), (103, 1)], &[(100, 1)]), t0);

    let asks = engine.top_display_rows(BookSide::Ask, 8);
    assert!(asks[0].size_increased);
    assert!(asks[1].is_new);
    assert!(engine.top_display_rows(BookSide::Bid, 8)[0].size_decreased);

    engine.expire_highlights(t0 + Duration::from_millis(799));
    assert!(engine.top_display_rows(BookSide::Ask, 8)[1].is_new);

    assert_eq!(engine.expire_highlights(t0 + Duration::from_millis(800)), 3);
    let asks = engine.top_display_rows(BookSide::Ask, 8);
    assert!(asks.iter().all(|r| !r.is_new && !r.size_increased && !r.size_decreased));
    assert!(engine.next_highlight_deadline().is_none());
}

#[test]
fn test_trade_direction_from_wire() {
    let mut engine = ReconciliationEngine::with_defaults();

    assert!(engine.handle_trade_message(&trade_frame(&["100"])));
    assert_eq!(engine.price_direction(), PriceDirection::Same);
    engine.handle_trade_message(&trade_frame(&["105", "90"]));
    assert_eq!(engine.last_price(), Some(Decimal::from(105)));
    assert_eq!(engine.price_direction(), PriceDirection::Up);
    engine.handle_trade_message(&trade_frame(&["105"]));
    assert_eq!(engine.price_direction(), PriceDirection::Same);

    assert!(!engine.handle_trade_message(&trade_frame(&[])));
    assert_eq!(engine.last_price(), Some(Decimal::from(105)));
}

#[test]
fn test_trade_batch_with_invalid_entry_is_dropped() {
    let mut engine = ReconciliationEngine::with_defaults();
    engine.handle_trade_message(&trade_frame(&["100"]));

    assert!(!engine.handle_trade_message(&trade_frame(&["105", "-1"])));
    assert_eq!(engine.last_price(), Some(Decimal::from(100)));
    assert_eq!(engine.price_direction(), PriceDirection::Same);
    assert_eq!(engine.stats().envelopes_dropped, 1);
}

proptest! {
    #[test]
    fn prop_ladders_stay_ordered_and_windowed(
        ops in proptest::collection::vec((any::<bool>(), 90u64..110, 0u64..5), 1..200)
    ) {
        let mut engine = ReconciliationEngine::with_defaults();
        let now = Instant::now();
        engine.handle_book_message(&snapshot(0, &[(105, 1)], &[(95, 1)]), now);

        for (i, (is_ask, price, size)) in ops.iter().enumerate() {
            let seq = i as u64;
            let entry = [(*price, *size)];
            let frame = if *is_ask {
                delta(seq, seq + 1, &entry, &[])
            } else {
                delta(seq, seq + 1, &[], &entry)
            };
            prop_assert!(engine.handle_book_message(&frame, now).is_empty());
        }

        let asks = prices(&engine, BookSide::Ask);
        let bids = prices(&engine, BookSide::Bid);
        prop_assert!(asks.len() <= 8);
        prop_assert!(bids.len() <= 8);
        prop_assert!(asks.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(bids.windows(2).all(|w| w[0] > w[1]));
        prop_assert!(engine
            .ordered_top_n(BookSide::Ask, 8)
            .iter()
            .all(|l| l.size > Decimal::ZERO));
    }
}
