//! Binance spot book-ticker capture.

pub mod messages;
pub mod session;

pub use session::{BinanceSession, BINANCE_WS_URL};
