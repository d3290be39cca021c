//! Canonical events shared by every venue decoder.
//!
//! Venue sessions decode their wire formats into these types; the connection
//! run loop applies them to order books and serializes rows from them. All
//! prices and sizes are `Decimal` so they can key ordered maps exactly;
//! conversion to `f64` happens only at row construction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::DecodeError;

/// Side of the book an event touches. Buy maps to bids, Sell to asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire tag used by the venues and in persisted trade rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn from_wire(tag: &str) -> Result<Self, DecodeError> {
        match tag {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(DecodeError::Side(other.to_string())),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resting price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Full replacement of both sides of an asset's book.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub asset_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub venue_ts: Option<DateTime<Utc>>,
}

/// Incremental update to individual price levels. A change with size zero is
/// a removal instruction.
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub asset_id: String,
    pub changes: Vec<LevelChange>,
    pub venue_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct LevelChange {
    pub side: Side,
    pub level: PriceLevel,
}

/// An executed trade reported by a venue. Persisted directly, never applied
/// to a book.
#[derive(Debug, Clone)]
pub struct Trade {
    pub asset_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub venue_ts: Option<DateTime<Utc>>,
}

/// Everything a venue decoder can produce from one inbound message.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Snapshot(BookSnapshot),
    Change(PriceChange),
    Trade(Trade),
    Pong,
    SubscriptionAck,
}
