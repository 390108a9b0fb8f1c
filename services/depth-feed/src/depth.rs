//! Depth aggregation for display
//!
//! Projects a touch-ordered window of levels into display rows: cumulative
//! size from the best price outward and each row's share of the window's
//! total depth. Pure projection; the ladder is never mutated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;

use crate::order_book::PriceLevel;

/// Decimal places kept on depth percentages.
pub const PERCENTAGE_SCALE: u32 = 4;

/// Canonical display window size.
pub const DEFAULT_DEPTH: usize = 8;

/// A derived, display-ready row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub price: Price,
    pub size: Decimal,
    /// Cumulative size from the touch to this row, inclusive.
    pub total: Decimal,
    /// `total / window total × 100`; zero when the window holds no depth.
    pub percentage: Decimal,
    pub is_new: bool,
    pub size_increased: bool,
    pub size_decreased: bool,
}

/// Sum of sizes in the window, saturating at `Decimal::MAX`.
pub fn window_total(levels: &[PriceLevel]) -> Decimal {
    levels
        .iter()
        .fold(Decimal::ZERO, |total, l| total.saturating_add(l.size))
}

/// `part / whole × 100`, or zero when `whole` is not positive.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp(PERCENTAGE_SCALE))
        .unwrap_or(Decimal::ZERO)
}

/// Build display rows for a window given in touch order. Running totals
/// saturate like [`window_total`], so the last row still reads 100%.
pub fn aggregate(levels: &[PriceLevel]) -> Vec<DisplayRow> {
    let total_depth = window_total(levels);
    let mut running = Decimal::ZERO;

    levels
        .iter()
        .map(|level| {
            running = running.saturating_add(level.size);
            DisplayRow {
                price: level.price,
                size: level.size,
                total: running,
                percentage: percentage_of(running, total_depth),
                is_new: level.is_new(),
                size_increased: level.size_increased(),
                size_decreased: level.size_decreased(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn px(value: u64) -> Price {
        Price::from_u64(value).unwrap()
    }

    fn level(price: u64, size: i64) -> PriceLevel {
        PriceLevel::new(px(price), Decimal::from(size))
    }

    #[test]
    fn test_cumulative_totals_and_percentages() {
        let rows = aggregate(&[level(10, 1), level(11, 2), level(12, 3)]);

        let totals: Vec<Decimal> = rows.iter().map(|r| r.total).collect();
        assert_eq!(totals, vec![Decimal::from(1), Decimal::from(3), Decimal::from(6)]);

        assert_eq!(rows[0].percentage.round_dp(1), Decimal::new(167, 1));
        assert_eq!(rows[1].percentage, Decimal::from(50));
        assert_eq!(rows[2].percentage, Decimal::from(100));
    }

    #[test]
    fn test_empty_window() {
        assert!(aggregate(&[]).is_empty());
        assert_eq!(window_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_zero_depth_window_yields_zero_percent() {
        let rows = aggregate(&[level(10, 0), level(11, 0)]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.percentage == Decimal::ZERO));
        assert!(rows.iter().all(|r| r.total == Decimal::ZERO));
    }

    #[test]
    fn test_percentage_of_zero_whole() {
        assert_eq!(percentage_of(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_of(Decimal::ONE, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let levels = vec![
            PriceLevel::new(px(1), huge),
            PriceLevel::new(px(2), huge),
        ];

        assert_eq!(window_total(&levels), Decimal::MAX);
        let rows = aggregate(&levels);
        assert_eq!(rows[0].total, huge);
        assert_eq!(rows[1].total, Decimal::MAX);
        assert!(rows[0].percentage > Decimal::ZERO);
        assert!(rows[0].percentage < Decimal::ONE_HUNDRED);
        assert_eq!(rows[1].percentage, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_flags_are_projected() {
        let mut marked = level(10, 1);
        marked.marks.new = Some(3);
        let rows = aggregate(&[marked, level(11, 1)]);
        assert!(rows[0].is_new);
        assert!(!rows[1].is_new);
    }

    #[test]
    fn test_row_serialization_is_camel_case() {
        let rows = aggregate(&[level(10, 2)]);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["price"], "10");
        assert_eq!(json["sizeIncreased"], false);
        assert!(json.get("isNew").is_some());
    }

    proptest! {
        #[test]
        fn prop_totals_monotonic_and_last_is_full(sizes in proptest::collection::vec(1i64..1_000, 1..20)) {
            let levels: Vec<PriceLevel> = sizes
                .iter()
                .enumerate()
                .map(|(i, &s)| level(i as u64 + 1, s))
                .collect();
            let rows = aggregate(&levels);

            for pair in rows.windows(2) {
                prop_assert!(pair[0].total < pair[1].total);
                prop_assert!(pair[0].percentage <= pair[1].percentage);
            }
            let last = rows.last().unwrap();
            prop_assert_eq!(last.total, Decimal::from(sizes.iter().sum::<i64>()));
            prop_assert_eq!(last.percentage, Decimal::ONE_HUNDRED);
        }
    }
}
