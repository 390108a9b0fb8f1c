//! Types library for the order book depth feed
//!
//! Provides the domain primitives shared by the feed engine and its
//! collaborators, keeping prices exact and sides explicit.
//!
//! # Modules
//! - `numeric`: Fixed-point price type backed by `rust_decimal`
//! - `side`: Ladder side and trade aggressor side
//! - `errors`: Error taxonomy

pub mod errors;
pub mod numeric;
pub mod side;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::numeric::*;
    pub use crate::side::*;
}
