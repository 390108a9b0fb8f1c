//! Fixed-point decimal price type
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! A `Price` is the unique key of a level within one ladder side, so it is
//! totally ordered and compares numerically (`100` == `100.0`).

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::NumericError;

/// A strictly positive price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative values.
    pub fn try_new(value: Decimal) -> Result<Self, NumericError> {
        if value <= Decimal::ZERO {
            return Err(NumericError::InvalidPrice(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Create a whole-number price, rejecting zero.
    pub fn from_u64(value: u64) -> Result<Self, NumericError> {
        Self::try_new(Decimal::from(value))
    }

    /// Get the inner decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl FromStr for Price {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_decimal(s)?;
        Self::try_new(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a decimal from plain or scientific notation.
///
/// Feeds occasionally emit numbers like `1e-5`; plain parsing is tried first.
pub fn parse_decimal(s: &str) -> Result<Decimal, NumericError> {
    let trimmed = s.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| NumericError::InvalidDecimal(s.to_string()))
}
