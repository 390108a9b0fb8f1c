//! Update applicator
//!
//! Turns validated `(price, size)` entries into ladder mutations plus
//! transient mark assignments.
//!
//! Per delta entry:
//! 1. `size == 0` (or below): remove the level if present, otherwise no-op
//! 2. absent level: insert it and mark it new
//! 3. existing level: mark increased / decreased by comparing sizes (both
//!    cleared when equal), then replace the size
//!
//! Snapshots install every entry unmarked and discard the prior contents
//! without diffing.
//!
//! Every mark that becomes set schedules its own clear in the
//! [`HighlightScheduler`], and the level records that clear's generation.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use tokio::time::Instant;
use types::numeric::Price;

use crate::events::LevelUpdate;
use crate::highlight::{HighlightKind, HighlightScheduler};
use crate::order_book::Ladder;

/// Outcome of applying one delta entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    /// A new level was created.
    Inserted { price: Price, size: Decimal },
    /// An existing level grew.
    Increased { price: Price, old: Decimal, new: Decimal },
    /// An existing level shrank.
    Decreased { price: Price, old: Decimal, new: Decimal },
    /// An existing level was rewritten with its current size.
    Unchanged { price: Price, size: Decimal },
    /// A level was fully cancelled.
    Removed { price: Price, old: Decimal },
    /// A removal for a price that was not on the ladder.
    Ignored { price: Price },
}

impl LevelChange {
    pub fn price(&self) -> Price {
        match *self {
            LevelChange::Inserted { price, .. }
            | LevelChange::Increased { price, .. }
            | LevelChange::Decreased { price, .. }
            | LevelChange::Unchanged { price, .. }
            | LevelChange::Removed { price, .. }
            | LevelChange::Ignored { price } => price,
        }
    }

    /// The mark this change sets, if any.
    pub fn highlight(&self) -> Option<HighlightKind> {
        match self {
            LevelChange::Inserted { .. } => Some(HighlightKind::New),
            LevelChange::Increased { .. } => Some(HighlightKind::Increased),
            LevelChange::Decreased { .. } => Some(HighlightKind::Decreased),
            _ => None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, LevelChange::Removed { .. })
    }
}

/// Apply one entry to the ladder's sizes, without touching marks.
pub fn apply_level(ladder: &mut Ladder, update: &LevelUpdate) -> LevelChange {
    let price = update.price;

    if update.is_removal() {
        return match ladder.remove(&price) {
            Some(level) => LevelChange::Removed {
                price,
                old: level.size,
            },
            None => LevelChange::Ignored { price },
        };
    }

    match ladder.upsert(price, update.size) {
        None => LevelChange::Inserted {
            price,
            size: update.size,
        },
        Some(old) => match update.size.cmp(&old) {
            Ordering::Greater => LevelChange::Increased {
                price,
                old,
                new: update.size,
            },
            Ordering::Less => LevelChange::Decreased {
                price,
                old,
                new: update.size,
            },
            Ordering::Equal => LevelChange::Unchanged {
                price,
                size: old,
            },
        },
    }
}

/// Apply a delta's entries for one side, in the order received, assigning
/// marks and scheduling their clears.
pub fn apply_delta_entries(
    ladder: &mut Ladder,
    entries: &[LevelUpdate],
    highlights: &mut HighlightScheduler,
    now: Instant,
) -> Vec<LevelChange> {
    let side = ladder.side();

    entries
        .iter()
        .map(|update| {
            let change = apply_level(ladder, update);
            let price = change.price();

            match change {
                LevelChange::Increased { .. } => {
                    ladder.set_mark(&price, HighlightKind::Decreased, None);
                }
                LevelChange::Decreased { .. } => {
                    ladder.set_mark(&price, HighlightKind::Increased, None);
                }
                LevelChange::Unchanged { .. } => {
                    ladder.set_mark(&price, HighlightKind::Increased, None);
                    ladder.set_mark(&price, HighlightKind::Decreased, None);
                }
                _ => {}
            }

            if let Some(kind) = change.highlight() {
                let generation = highlights.schedule(side, price, kind, now);
                ladder.set_mark(&price, kind, Some(generation));
            }

            change
        })
        .collect()
}

/// Replace one side with a snapshot's entries. Pending clears for that side
/// are dropped since no installed level carries a mark.
///
/// Returns the number of levels installed.
pub fn apply_snapshot_entries(
    ladder: &mut Ladder,
    entries: &[LevelUpdate],
    highlights: &mut HighlightScheduler,
) -> usize {
    highlights.cancel_side(ladder.side());
    ladder.snapshot_replace(entries.iter().map(|u| (u.price, u.size)));
    ladder.len()
}
