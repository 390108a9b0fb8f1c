//! Depth Feed Service
//!
//! Maintains a locally reconciled order book for one instrument from a
//! snapshot + delta stream and a public trade stream, and produces:
//! - Ordered ask and bid ladders truncated to a display window
//! - Cumulative depth totals and percentages per row
//! - Transient new / increased / decreased highlights per level
//! - Last trade price and its direction of movement
//!
//! Deltas are only applied when their `prevSeqNum` continues the last
//! accepted sequence. Any gap triggers an unsubscribe + subscribe on the
//! book channel and the book waits for a fresh snapshot.
//!
//! # Architecture
//!
//! ```text
//!  Book WS          Trade WS
//!     │                 │
//! ┌───▼────┐       ┌────▼───┐
//! │Transport│      │Transport│  ← raw frames in, control out
//! └───┬────┘       └────┬───┘
//!     │                 │
//! ┌───▼─────────────────▼───┐
//! │         Session         │  ← one task, serializes all input
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │ Engine: Guard → Delta → │
//! │ Ladder → Highlights     │
//! │ Price tracker           │
//! └───────────┬─────────────┘
//!             │ watch<BookView>
//! ┌───────────▼─────────────┐
//! │  Depth aggregation +    │
//! │  HTTP read API          │
//! └─────────────────────────┘
//! ```

pub mod config;
pub mod delta;
pub mod depth;
pub mod engine;
pub mod events;
pub mod highlight;
pub mod http;
pub mod order_book;
pub mod price;
pub mod sequence;
pub mod session;
pub mod transport;
