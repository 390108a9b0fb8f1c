//! Price-level ladder for one side of the book
//!
//! Levels are keyed by price in a `BTreeMap` for deterministic sorted
//! iteration. Every member has a size above zero: writing a zero or negative
//! size removes the level instead of storing it.
//!
//! Touch order is side dependent:
//! - asks: lowest price first (ascending)
//! - bids: highest price first (descending)

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;
use types::side::BookSide;

use crate::highlight::HighlightKind;

/// Generations of the transient marks a level currently shows.
///
/// A mark is set while its generation is `Some`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightMarks {
    pub new: Option<u64>,
    pub increased: Option<u64>,
    pub decreased: Option<u64>,
}

impl HighlightMarks {
    fn slot(&mut self, kind: HighlightKind) -> &mut Option<u64> {
        match kind {
            HighlightKind::New => &mut self.new,
            HighlightKind::Increased => &mut self.increased,
            HighlightKind::Decreased => &mut self.decreased,
        }
    }

    pub fn get(&self, kind: HighlightKind) -> Option<u64> {
        match kind {
            HighlightKind::New => self.new,
            HighlightKind::Increased => self.increased,
            HighlightKind::Decreased => self.decreased,
        }
    }
}

/// A single aggregated price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// The price of this level.
    pub price: Price,
    /// Resting aggregate size at this price.
    pub size: Decimal,
    /// Transient marks.
    pub marks: HighlightMarks,
}

impl PriceLevel {
    /// Create an unmarked level.
    pub fn new(price: Price, size: Decimal) -> Self {
        Self {
            price,
            size,
            marks: HighlightMarks::default(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.marks.new.is_some()
    }

    pub fn size_increased(&self) -> bool {
        self.marks.increased.is_some()
    }

    pub fn size_decreased(&self) -> bool {
        self.marks.decreased.is_some()
    }
}

/// One side of the book.
#[derive(Debug, Clone)]
pub struct Ladder {
    side: BookSide,
    levels: BTreeMap<Price, PriceLevel>,
}

impl Ladder {
    /// Create an empty ladder for the given side.
    pub fn new(side: BookSide) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    /// Number of price levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, price: &Price) -> Option<&PriceLevel> {
        self.levels.get(price)
    }

    pub fn contains(&self, price: &Price) -> bool {
        self.levels.contains_key(price)
    }

    /// Insert a level or replace the size of an existing one, keeping its
    /// marks. A size of zero or below removes the level.
    ///
    /// Returns the previous size, if the level existed.
    pub fn upsert(&mut self, price: Price, size: Decimal) -> Option<Decimal> {
        if size <= Decimal::ZERO {
            return self.remove(&price).map(|level| level.size);
        }

        match self.levels.get_mut(&price) {
            Some(level) => {
                let old = level.size;
                level.size = size;
                Some(old)
            }
            None => {
                self.levels.insert(price, PriceLevel::new(price, size));
                None
            }
        }
    }

    /// Remove a level. Returns it if it existed.
    pub fn remove(&mut self, price: &Price) -> Option<PriceLevel> {
        self.levels.remove(price)
    }

    /// Discard every level and install the given entries unmarked.
    ///
    /// Entries with a size of zero or below are skipped; a repeated price
    /// keeps the last size given.
    pub fn snapshot_replace<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Price, Decimal)>,
    {
        self.levels.clear();
        for (price, size) in entries {
            if size > Decimal::ZERO {
                self.levels.insert(price, PriceLevel::new(price, size));
            } else {
                self.levels.remove(&price);
            }
        }
    }

    /// Iterate levels from the touch outward.
    pub fn iter_from_touch(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        let (ascending, descending) = match self.side {
            BookSide::Ask => (Some(self.levels.values()), None),
            BookSide::Bid => (None, Some(self.levels.values().rev())),
        };
        ascending
            .into_iter()
            .flatten()
            .chain(descending.into_iter().flatten())
    }

    /// The `n` levels closest to the touch, best first. `n` is clamped to
    /// the number of levels.
    pub fn ordered_top_n(&self, n: usize) -> Vec<PriceLevel> {
        self.iter_from_touch().take(n).cloned().collect()
    }

    /// Best level on this side.
    pub fn best(&self) -> Option<&PriceLevel> {
        self.iter_from_touch().next()
    }

    /// Drop every level outside the `n` closest to the touch.
    ///
    /// Returns the evicted prices.
    pub fn truncate_to(&mut self, n: usize) -> Vec<Price> {
        let evicted: Vec<Price> = self.iter_from_touch().skip(n).map(|l| l.price).collect();
        for price in &evicted {
            self.levels.remove(price);
        }
        evicted
    }

    /// Set or reset one mark on an existing level. Returns false if the
    /// level does not exist.
    pub fn set_mark(&mut self, price: &Price, kind: HighlightKind, generation: Option<u64>) -> bool {
        match self.levels.get_mut(price) {
            Some(level) => {
                *level.marks.slot(kind) = generation;
                true
            }
            None => false,
        }
    }

    /// Clear a mark only if the level exists and still carries `generation`.
    pub fn clear_mark(&mut self, price: &Price, kind: HighlightKind, generation: u64) -> bool {
        match self.levels.get_mut(price) {
            Some(level) if level.marks.get(kind) == Some(generation) => {
                *level.marks.slot(kind) = None;
                true
            }
            _ => false,
        }
    }
}
