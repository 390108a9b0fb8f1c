//! Transient highlight scheduling
//!
//! When an update marks a level as new, increased or decreased, a one-shot
//! clear of exactly that mark is scheduled a fixed duration later. Every
//! scheduled clear carries a generation number that is unique for the
//! lifetime of the scheduler; the level stores the generation of the mark it
//! currently shows. When a clear fires it only takes effect if the level
//! still exists and still carries that generation, so:
//!
//! - a clear for a level that was removed (or evicted from the window) is a
//!   no-op and never resurrects it;
//! - a newer mark on the same price supersedes the old one, and the old
//!   clear cannot wipe the newer mark.
//!
//! The scheduler itself never sleeps. The owner asks for the next deadline,
//! waits for it on its own event loop, and then drains due clears.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use types::numeric::Price;
use types::side::BookSide;

/// Default highlight duration.
pub const DEFAULT_HIGHLIGHT_DURATION: Duration = Duration::from_millis(500);

/// Which transient mark a clear targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HighlightKind {
    New,
    Increased,
    Decreased,
}

/// A pending one-shot clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledClear {
    pub side: BookSide,
    pub price: Price,
    pub kind: HighlightKind,
    pub generation: u64,
    pub deadline: Instant,
}

/// Deadline-ordered queue of pending clears.
#[derive(Debug)]
pub struct HighlightScheduler {
    duration: Duration,
    next_generation: u64,
    /// Keyed by (deadline, generation); generations are unique so keys are too.
    pending: BTreeMap<(Instant, u64), ScheduledClear>,
}

impl HighlightScheduler {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            next_generation: 1,
            pending: BTreeMap::new(),
        }
    }

    /// Schedule a clear of `kind` on `(side, price)` and return its generation.
    pub fn schedule(
        &mut self,
        side: BookSide,
        price: Price,
        kind: HighlightKind,
        now: Instant,
    ) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        let deadline = now + self.duration;
        self.pending.insert(
            (deadline, generation),
            ScheduledClear {
                side,
                price,
                kind,
                generation,
                deadline,
            },
        );
        generation
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every clear whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<ScheduledClear> {
        let later = self.pending.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut self.pending, later);
        due.into_values().collect()
    }

    /// Drop every pending clear for one side. Returns how many were dropped.
    pub fn cancel_side(&mut self, side: BookSide) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, clear| clear.side != side);
        before - self.pending.len()
    }

    /// Drop every pending clear.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for HighlightScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_DURATION)
    }
}
