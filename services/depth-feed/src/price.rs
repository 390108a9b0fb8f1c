//! Last-trade price tracking
//!
//! Consumes the trade stream independently of the order book. Each
//! non-empty batch shifts `last` into `previous` and takes the batch's first
//! (most recent) trade price as the new `last`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use types::numeric::Price;

use crate::events::TradeEvent;

/// Direction of the last price move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    #[default]
    Same,
}

#[derive(Debug, Clone, Default)]
pub struct PriceTracker {
    last: Option<Price>,
    previous: Option<Price>,
    batches: u64,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade batch. Returns false for an empty batch.
    pub fn on_trade(&mut self, trades: &[TradeEvent]) -> bool {
        let Some(latest) = trades.first() else {
            return false;
        };
        self.previous = self.last;
        self.last = Some(latest.price);
        self.batches += 1;
        true
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last
    }

    pub fn previous_price(&self) -> Option<Price> {
        self.previous
    }

    /// Batches recorded so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// `Same` until two prices are known.
    pub fn direction(&self) -> PriceDirection {
        match (self.last, self.previous) {
            (Some(last), Some(previous)) => match last.cmp(&previous) {
                Ordering::Greater => PriceDirection::Up,
                Ordering::Less => PriceDirection::Down,
                Ordering::Equal => PriceDirection::Same,
            },
            _ => PriceDirection::Same,
        }
    }
}
