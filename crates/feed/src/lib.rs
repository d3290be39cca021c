//! Market-data feed capture.
//!
//! Venue websocket sessions decode wire messages into canonical [`events`],
//! a generic [`connection`] loop maintains per-asset [`book`] state and
//! records depth snapshots and trades through `bookcap-store`.

pub mod binance;
pub mod book;
pub mod connection;
pub mod error;
pub mod events;
pub mod hyperliquid;
pub mod polymarket;
pub mod reference;
mod transport;
mod wire;

pub use book::OrderBook;
pub use connection::{FeedConnection, FeedHandle, VenueSession};
pub use error::{DecodeError, FeedError, MarketInfoError, ReferenceError};
pub use events::{FeedEvent, PriceLevel, Side};
