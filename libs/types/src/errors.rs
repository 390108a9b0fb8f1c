//! Error types for the shared primitives
//!
//! Error taxonomy using thiserror

use thiserror::Error;

/// Numeric validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
}

/// Side parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SideError {
    #[error("Unknown book side: {0}")]
    UnknownBookSide(String),
}
