//! Wire schema for the depth and trade feeds
//!
//! Every inbound frame is validated here before it can reach the engine.
//! Frames are envelopes carrying their payload under `data`; envelopes
//! without `data` (subscription acks, heartbeats) are rejected with
//! [`FeedError::MissingData`] and the caller drops them.
//!
//! Numbers may arrive either as JSON strings (`"100.5"`) or JSON numbers
//! (`100.5`); both are parsed into exact decimals.
//!
//! Outbound control frames use `{ "op": "subscribe" | "unsubscribe", "args": [channel] }`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::numeric::{parse_decimal, Price};
use types::side::{BookSide, Side};

/// Errors raised while validating an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("envelope has no data field")]
    MissingData,

    #[error("invalid {side} level at index {index}: {reason}")]
    InvalidLevel {
        side: BookSide,
        index: usize,
        reason: String,
    },

    #[error("invalid trade price at index {index}: {reason}")]
    InvalidPrice { index: usize, reason: String },

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// A number that may be encoded as a JSON string or a JSON number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Text(String),
    Number(serde_json::Number),
}

impl WireNumber {
    fn to_decimal(&self) -> Result<Decimal, FeedError> {
        let text = match self {
            WireNumber::Text(s) => s.clone(),
            WireNumber::Number(n) => n.to_string(),
        };
        parse_decimal(&text).map_err(|e| FeedError::InvalidNumber(e.to_string()))
    }

    fn to_i64(&self) -> Option<i64> {
        self.to_decimal().ok().and_then(|d| d.trunc().to_i64())
    }
}

/// Outer frame. Only `data` is consumed; topic and other fields are ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
}

/// Kind of order book message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookMessageKind {
    /// Full replacement of both ladders.
    Snapshot,
    /// Incremental changes extending `prevSeqNum`.
    Delta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookMessage {
    #[serde(rename = "type")]
    kind: BookMessageKind,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    timestamp: Option<WireNumber>,
    seq_num: u64,
    #[serde(default)]
    prev_seq_num: Option<u64>,
    #[serde(default)]
    asks: Vec<Vec<WireNumber>>,
    #[serde(default)]
    bids: Vec<Vec<WireNumber>>,
}

/// One `(price, size)` entry. A size of zero or below removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    pub price: Price,
    pub size: Decimal,
}

impl LevelUpdate {
    pub fn new(price: Price, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Whether this entry cancels the whole level.
    pub fn is_removal(&self) -> bool {
        self.size <= Decimal::ZERO
    }
}

/// A validated order book message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMessage {
    pub kind: BookMessageKind,
    pub symbol: Option<String>,
    /// Feed timestamp, if present and numeric.
    pub timestamp: Option<i64>,
    pub seq_num: u64,
    pub prev_seq_num: Option<u64>,
    /// Ask entries in the order received.
    pub asks: Vec<LevelUpdate>,
    /// Bid entries in the order received.
    pub bids: Vec<LevelUpdate>,
}

impl BookMessage {
    /// Build a snapshot message.
    pub fn snapshot(seq_num: u64, asks: Vec<LevelUpdate>, bids: Vec<LevelUpdate>) -> Self {
        Self {
            kind: BookMessageKind::Snapshot,
            symbol: None,
            timestamp: None,
            seq_num,
            prev_seq_num: None,
            asks,
            bids,
        }
    }

    /// Build a delta message extending `prev_seq_num`.
    pub fn delta(
        prev_seq_num: u64,
        seq_num: u64,
        asks: Vec<LevelUpdate>,
        bids: Vec<LevelUpdate>,
    ) -> Self {
        Self {
            kind: BookMessageKind::Delta,
            symbol: None,
            timestamp: None,
            seq_num,
            prev_seq_num: Some(prev_seq_num),
            asks,
            bids,
        }
    }

    /// Entries for one side.
    pub fn entries(&self, side: BookSide) -> &[LevelUpdate] {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind == BookMessageKind::Snapshot
    }
}

fn parse_levels(side: BookSide, raw: &[Vec<WireNumber>]) -> Result<Vec<LevelUpdate>, FeedError> {
    raw.iter()
        .enumerate()
        .map(|(index, entry)| {
            let invalid = |reason: String| FeedError::InvalidLevel {
                side,
                index,
                reason,
            };
            if entry.len() < 2 {
                return Err(invalid(format!("expected [price, size], got {} fields", entry.len())));
            }
            let price = entry[0].to_decimal().map_err(|e| invalid(e.to_string()))?;
            let price = Price::try_new(price).map_err(|e| invalid(e.to_string()))?;
            let size = entry[1].to_decimal().map_err(|e| invalid(e.to_string()))?;
            Ok(LevelUpdate::new(price, size))
        })
        .collect()
}

fn envelope_data(raw: &str) -> Result<Value, FeedError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| FeedError::InvalidJson(e.to_string()))?;
    match envelope.data {
        Some(Value::Null) | None => Err(FeedError::MissingData),
        Some(data) => Ok(data),
    }
}

/// Parse and validate an order book envelope.
pub fn parse_book_message(raw: &str) -> Result<BookMessage, FeedError> {
    let data = envelope_data(raw)?;
    let msg: RawBookMessage =
        serde_json::from_value(data).map_err(|e| FeedError::InvalidJson(e.to_string()))?;

    Ok(BookMessage {
        kind: msg.kind,
        symbol: msg.symbol,
        timestamp: msg.timestamp.as_ref().and_then(WireNumber::to_i64),
        seq_num: msg.seq_num,
        prev_seq_num: msg.prev_seq_num,
        asks: parse_levels(BookSide::Ask, &msg.asks)?,
        bids: parse_levels(BookSide::Bid, &msg.bids)?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    price: WireNumber,
    #[serde(default)]
    side: Option<Side>,
    #[serde(default)]
    size: Option<WireNumber>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    timestamp: Option<WireNumber>,
    #[serde(default)]
    trade_id: Option<Value>,
}

/// A validated public trade. Only `price` drives the price tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub price: Price,
    pub side: Option<Side>,
    pub size: Option<Decimal>,
    pub symbol: Option<String>,
    pub timestamp: Option<i64>,
    pub trade_id: Option<String>,
}

impl TradeEvent {
    /// A trade carrying only a price.
    pub fn at(price: Price) -> Self {
        Self {
            price,
            side: None,
            size: None,
            symbol: None,
            timestamp: None,
            trade_id: None,
        }
    }
}

/// Parse and validate a trade envelope whose `data` is an array of trades,
/// most recent first.
pub fn parse_trade_message(raw: &str) -> Result<Vec<TradeEvent>, FeedError> {
    let data = envelope_data(raw)?;
    let trades: Vec<RawTrade> =
        serde_json::from_value(data).map_err(|e| FeedError::InvalidJson(e.to_string()))?;

    trades
        .into_iter()
        .enumerate()
        .map(|(index, trade)| {
            let invalid = |reason: String| FeedError::InvalidPrice { index, reason };
            let price = trade.price.to_decimal().map_err(|e| invalid(e.to_string()))?;
            let price = Price::try_new(price).map_err(|e| invalid(e.to_string()))?;
            let size = match &trade.size {
                Some(size) => Some(size.to_decimal()?),
                None => None,
            };
            let trade_id = match trade.trade_id {
                Some(Value::String(s)) => Some(s),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            Ok(TradeEvent {
                price,
                side: trade.side,
                size,
                symbol: trade.symbol,
                timestamp: trade.timestamp.as_ref().and_then(WireNumber::to_i64),
                trade_id,
            })
        })
        .collect()
}

/// Channels available for subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Order book snapshots and deltas: `orderbook.{symbol}`
    Book { symbol: String },
    /// Public trade stream: `publicTrade.{symbol}`
    Trades { symbol: String },
}

impl Channel {
    /// Parse a channel string into a Channel.
    ///
    /// Formats:
    /// - `orderbook.BTCUSDT`
    /// - `publicTrade.BTCUSDT`
    pub fn parse(s: &str) -> Option<Self> {
        let (topic, symbol) = s.split_once('.')?;
        if symbol.is_empty() {
            return None;
        }
        match topic {
            "orderbook" => Some(Channel::Book {
                symbol: symbol.to_string(),
            }),
            "publicTrade" => Some(Channel::Trades {
                symbol: symbol.to_string(),
            }),
            _ => None,
        }
    }

    /// Serialize as channel string.
    pub fn to_channel_string(&self) -> String {
        match self {
            Channel::Book { symbol } => format!("orderbook.{}", symbol),
            Channel::Trades { symbol } => format!("publicTrade.{}", symbol),
        }
    }
}

/// Control operation sent to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlOp {
    Subscribe,
    Unsubscribe,
}

/// Outbound control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub op: ControlOp,
    pub args: Vec<String>,
}

impl ControlMessage {
    pub fn subscribe(channel: &Channel) -> Self {
        Self {
            op: ControlOp::Subscribe,
            args: vec![channel.to_channel_string()],
        }
    }

    pub fn unsubscribe(channel: &Channel) -> Self {
        Self {
            op: ControlOp::Unsubscribe,
            args: vec![channel.to_channel_string()],
        }
    }

    /// The channel this frame targets, used to route it to a transport.
    pub fn channel(&self) -> Option<Channel> {
        self.args.first().and_then(|arg| Channel::parse(arg))
    }
}
