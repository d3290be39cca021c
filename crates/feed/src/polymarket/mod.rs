//! Polymarket CLOB capture: wire decoding, websocket session, and hourly
//! market resolution via the Gamma REST API.

pub mod market_info;
pub mod messages;
pub mod session;

pub use market_info::{hourly_slug, MarketInfo, MarketResolver, TokenInfo};
pub use session::{Channel, Credentials, PolymarketSession, POLYMARKET_WS_URL};
