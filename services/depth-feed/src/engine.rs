//! Order book reconciliation engine
//!
//! Owns both ladders, the sequence guard, the highlight scheduler and the
//! price tracker. It is the only writer of ladder state: every book message
//! passes through the sequence guard before the applicator touches a ladder.
//!
//! The engine never fails outward. Malformed envelopes are dropped, gaps
//! turn into resubscribe control messages, and degenerate windows aggregate
//! to zero. Callers feed it raw frames plus the current instant and forward
//! whatever control messages it returns to the matching transport.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use types::numeric::Price;
use types::side::BookSide;

use crate::delta::{apply_delta_entries, apply_snapshot_entries};
use crate::depth::{aggregate, DisplayRow, DEFAULT_DEPTH};
use crate::events::{
    parse_book_message, parse_trade_message, BookMessage, Channel, ControlMessage, TradeEvent,
};
use crate::highlight::{HighlightScheduler, DEFAULT_HIGHLIGHT_DURATION};
use crate::order_book::{Ladder, PriceLevel};
use crate::price::{PriceDirection, PriceTracker};
use crate::sequence::{DeltaVerdict, SequenceGuard, SyncState};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The single instrument this engine reconciles.
    pub symbol: String,
    /// Levels kept per side (the display window).
    pub depth: usize,
    /// How long new/increased/decreased marks stay set.
    pub highlight_duration: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            depth: DEFAULT_DEPTH,
            highlight_duration: DEFAULT_HIGHLIGHT_DURATION,
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub snapshots_applied: u64,
    pub deltas_applied: u64,
    /// Deltas dropped because no snapshot was in force.
    pub deltas_ignored: u64,
    pub gaps_detected: u64,
    /// Book or trade frames that failed validation or belonged elsewhere.
    pub envelopes_dropped: u64,
    pub trade_batches: u64,
    pub highlights_cleared: u64,
}

/// Immutable, serializable snapshot of everything the UI may read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub symbol: String,
    pub depth: usize,
    /// Ask window, lowest price first.
    pub asks: Vec<PriceLevel>,
    /// Bid window, highest price first.
    pub bids: Vec<PriceLevel>,
    pub sync_state: SyncState,
    pub last_sequence: Option<u64>,
    /// Best ask minus best bid.
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub last_price: Option<Price>,
    pub previous_price: Option<Price>,
    pub direction: PriceDirection,
    pub stats: EngineStats,
}

impl BookView {
    pub fn levels(&self, side: BookSide) -> &[PriceLevel] {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    /// Display rows for the `n` levels nearest the touch.
    pub fn display_rows(&self, side: BookSide, n: usize) -> Vec<DisplayRow> {
        let levels = self.levels(side);
        aggregate(&levels[..n.min(levels.len())])
    }
}

/// The reconciliation engine.
pub struct ReconciliationEngine {
    config: EngineConfig,
    asks: Ladder,
    bids: Ladder,
    guard: SequenceGuard,
    highlights: HighlightScheduler,
    prices: PriceTracker,
    stats: EngineStats,
    closed: bool,
}

impl ReconciliationEngine {
    pub fn new(config: EngineConfig) -> Self {
        info!(
            symbol = %config.symbol,
            depth = config.depth,
            highlight_ms = config.highlight_duration.as_millis() as u64,
            "ReconciliationEngine initialized"
        );

        Self {
            highlights: HighlightScheduler::new(config.highlight_duration),
            config,
            asks: Ladder::new(BookSide::Ask),
            bids: Ladder::new(BookSide::Bid),
            guard: SequenceGuard::new(),
            prices: PriceTracker::new(),
            stats: EngineStats::default(),
            closed: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn book_channel(&self) -> Channel {
        Channel::Book {
            symbol: self.config.symbol.clone(),
        }
    }

    pub fn trade_channel(&self) -> Channel {
        Channel::Trades {
            symbol: self.config.symbol.clone(),
        }
    }

    /// Initial subscriptions for both transports.
    pub fn open(&mut self) -> Vec<ControlMessage> {
        if self.closed {
            return Vec::new();
        }
        info!(symbol = %self.config.symbol, "Subscribing to book and trade channels");
        vec![
            ControlMessage::subscribe(&self.book_channel()),
            ControlMessage::subscribe(&self.trade_channel()),
        ]
    }

    /// Tear down: drop pending highlight clears and refuse further input.
    /// Returns the unsubscribes to send, once.
    pub fn close(&mut self) -> Vec<ControlMessage> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let dropped = self.highlights.cancel_all();
        info!(pending_highlights = dropped, "ReconciliationEngine closed");
        vec![
            ControlMessage::unsubscribe(&self.book_channel()),
            ControlMessage::unsubscribe(&self.trade_channel()),
        ]
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handle a raw order book frame.
    pub fn handle_book_message(&mut self, raw: &str, now: Instant) -> Vec<ControlMessage> {
        if self.closed {
            return Vec::new();
        }
        match parse_book_message(raw) {
            Ok(msg) => self.apply_book_message(&msg, now),
            Err(err) => {
                self.stats.envelopes_dropped += 1;
                debug!(error = %err, "Dropping book frame");
                Vec::new()
            }
        }
    }

    /// Apply a validated order book message.
    pub fn apply_book_message(&mut self, msg: &BookMessage, now: Instant) -> Vec<ControlMessage> {
        if self.closed {
            return Vec::new();
        }
        if let Some(symbol) = &msg.symbol {
            if symbol != &self.config.symbol {
                self.stats.envelopes_dropped += 1;
                debug!(symbol = %symbol, expected = %self.config.symbol, "Dropping book message for other symbol");
                return Vec::new();
            }
        }

        if msg.is_snapshot() {
            self.install_snapshot(msg);
            return Vec::new();
        }

        match self.guard.on_delta(msg.prev_seq_num, msg.seq_num) {
            DeltaVerdict::Accept => {
                self.apply_delta(msg, now);
                Vec::new()
            }
            DeltaVerdict::Unsynced => {
                self.stats.deltas_ignored += 1;
                Vec::new()
            }
            DeltaVerdict::Gap(gap) => {
                self.stats.gaps_detected += 1;
                warn!(%gap, "Recoverable desync, requesting fresh snapshot");
                let channel = self.book_channel();
                let resync = vec![
                    ControlMessage::unsubscribe(&channel),
                    ControlMessage::subscribe(&channel),
                ];
                self.guard.resync_requested();
                resync
            }
        }
    }

    fn install_snapshot(&mut self, msg: &BookMessage) {
        self.guard.on_snapshot(msg.seq_num);
        let depth = self.config.depth;
        for side in BookSide::all() {
            let (ladder, highlights) = self.side_mut(side);
            apply_snapshot_entries(ladder, msg.entries(side), highlights);
            ladder.truncate_to(depth);
        }
        self.stats.snapshots_applied += 1;
        debug!(
            sequence = msg.seq_num,
            asks = self.asks.len(),
            bids = self.bids.len(),
            "Snapshot installed"
        );
    }

    fn apply_delta(&mut self, msg: &BookMessage, now: Instant) {
        let depth = self.config.depth;
        for side in BookSide::all() {
            let (ladder, highlights) = self.side_mut(side);
            let changes = apply_delta_entries(ladder, msg.entries(side), highlights, now);
            let evicted = ladder.truncate_to(depth);
            if !evicted.is_empty() {
                debug!(side = %side, evicted = evicted.len(), "Levels evicted from window");
            }
            debug!(side = %side, changes = changes.len(), sequence = msg.seq_num, "Delta applied");
        }
        self.stats.deltas_applied += 1;
    }

    fn side_mut(&mut self, side: BookSide) -> (&mut Ladder, &mut HighlightScheduler) {
        let ladder = match side {
            BookSide::Ask => &mut self.asks,
            BookSide::Bid => &mut self.bids,
        };
        (ladder, &mut self.highlights)
    }

    /// Handle a raw trade frame. Returns true if the price tracker moved.
    pub fn handle_trade_message(&mut self, raw: &str) -> bool {
        if self.closed {
            return false;
        }
        match parse_trade_message(raw) {
            Ok(trades) => self.apply_trades(&trades),
            Err(err) => {
                self.stats.envelopes_dropped += 1;
                debug!(error = %err, "Dropping trade frame");
                false
            }
        }
    }

    pub fn apply_trades(&mut self, trades: &[TradeEvent]) -> bool {
        if self.closed {
            return false;
        }
        let moved = self.prices.on_trade(trades);
        if moved {
            self.stats.trade_batches += 1;
        }
        moved
    }

    /// Fire every highlight clear due at `now`. Clears whose level is gone or
    /// whose mark was superseded do nothing. Returns how many marks cleared.
    pub fn expire_highlights(&mut self, now: Instant) -> usize {
        if self.closed {
            return 0;
        }
        let mut cleared = 0;
        for clear in self.highlights.take_due(now) {
            let ladder = match clear.side {
                BookSide::Ask => &mut self.asks,
                BookSide::Bid => &mut self.bids,
            };
            if ladder.clear_mark(&clear.price, clear.kind, clear.generation) {
                cleared += 1;
            }
        }
        self.stats.highlights_cleared += cleared as u64;
        cleared
    }

    /// When the next highlight clear is due.
    pub fn next_highlight_deadline(&self) -> Option<Instant> {
        if self.closed {
            return None;
        }
        self.highlights.next_deadline()
    }

    pub fn pending_highlights(&self) -> usize {
        self.highlights.pending_count()
    }

    pub fn ladder(&self, side: BookSide) -> &Ladder {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    /// Levels nearest the touch, best first.
    pub fn ordered_top_n(&self, side: BookSide, n: usize) -> Vec<PriceLevel> {
        self.ladder(side).ordered_top_n(n)
    }

    /// Display rows for the `n` levels nearest the touch.
    pub fn top_display_rows(&self, side: BookSide, n: usize) -> Vec<DisplayRow> {
        aggregate(&self.ordered_top_n(side, n))
    }

    pub fn price_direction(&self) -> PriceDirection {
        self.prices.direction()
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.prices.last_price().map(|p| p.as_decimal())
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best().map(|l| l.price)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best().map(|l| l.price)
    }

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.as_decimal() - bid.as_decimal()),
            _ => None,
        }
    }

    /// Average of best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => {
                let (bid, ask) = (bid.as_decimal(), ask.as_decimal());
                // Halving the spread avoids overflowing the sum near Decimal::MAX
                let mid = bid
                    .checked_add(ask)
                    .map(|sum| sum / Decimal::TWO)
                    .unwrap_or_else(|| bid + (ask - bid) / Decimal::TWO);
                Some(mid)
            }
            _ => None,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.guard.state()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.guard.last_accepted()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Build the view published to readers.
    pub fn view(&self) -> BookView {
        BookView {
            symbol: self.config.symbol.clone(),
            depth: self.config.depth,
            asks: self.ordered_top_n(BookSide::Ask, self.config.depth),
            bids: self.ordered_top_n(BookSide::Bid, self.config.depth),
            sync_state: self.guard.state(),
            last_sequence: self.guard.last_accepted(),
            spread: self.spread(),
            mid_price: self.mid_price(),
            last_price: self.prices.last_price(),
            previous_price: self.prices.previous_price(),
            direction: self.prices.direction(),
            stats: self.stats,
        }
    }
}
