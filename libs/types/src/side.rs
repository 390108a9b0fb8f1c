//! Book and trade side types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SideError;

/// One side of the ladder.
///
/// Asks are displayed from the lowest price outward, bids from the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Sell side
    Ask,
    /// Buy side
    Bid,
}

impl BookSide {
    /// Both sides in processing order: asks first, then bids.
    pub fn all() -> [BookSide; 2] {
        [BookSide::Ask, BookSide::Bid]
    }

    /// Lowercase label used in logs and URLs.
    pub fn label(&self) -> &'static str {
        match self {
            BookSide::Ask => "ask",
            BookSide::Bid => "bid",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BookSide {
    type Err = SideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ask" | "asks" | "sell" => Ok(BookSide::Ask),
            "bid" | "bids" | "buy" => Ok(BookSide::Bid),
            _ => Err(SideError::UnknownBookSide(s.to_string())),
        }
    }
}

/// Trade aggressor side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buyer took liquidity
    #[serde(alias = "Buy", alias = "buy")]
    BUY,
    /// Seller took liquidity
    #[serde(alias = "Sell", alias = "sell")]
    SELL,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_side_order() {
        assert_eq!(BookSide::all(), [BookSide::Ask, BookSide::Bid]);
    }

    #[test]
    fn test_book_side_parse() {
        assert_eq!("ask".parse::<BookSide>().unwrap(), BookSide::Ask);
        assert_eq!("Bids".parse::<BookSide>().unwrap(), BookSide::Bid);
        assert!("mid".parse::<BookSide>().is_err());
    }

    #[test]
    fn test_book_side_serde() {
        let json = serde_json::to_string(&BookSide::Bid).unwrap();
        assert_eq!(json, "\"bid\"");
    }

    #[test]
    fn test_trade_side_aliases() {
        let buy: Side = serde_json::from_str("\"Buy\"").unwrap();
        let sell: Side = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(buy, Side::BUY);
        assert_eq!(sell, Side::SELL);
    }
}
