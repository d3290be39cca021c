//! Hyperliquid l2Book capture.

pub mod messages;
pub mod session;

pub use session::{HyperliquidSession, HYPERLIQUID_WS_URL};
