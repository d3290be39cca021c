//! Binance spot websocket session.
//!
//! No client keepalive: the server pings at the websocket protocol level and
//! the transport answers those in its receive path.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::binance::messages;
use crate::connection::{Frame, VenueSession};
use crate::error::{DecodeError, FeedError};
use crate::events::FeedEvent;
use crate::transport::WsTransport;

pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

pub struct BinanceSession {
    url: String,
    symbol: String,
    transport: WsTransport,
}

impl BinanceSession {
    pub fn new(url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into(),
            transport: WsTransport::new(),
        }
    }

    fn subscription_request(&self) -> serde_json::Value {
        json!({
            "method": "SUBSCRIBE",
            "params": [format!("{}@bookTicker", self.symbol.to_lowercase())],
            "id": 1,
        })
    }
}

#[async_trait]
impl VenueSession for BinanceSession {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn connect(&mut self) -> Result<(), FeedError> {
        self.transport.connect(&self.url).await
    }

    async fn subscribe(&mut self) -> Result<(), FeedError> {
        let request = self.subscription_request();
        debug!(symbol = %self.symbol, "subscribing to book ticker");
        self.transport.send_text(request.to_string()).await
    }

    async fn send_ping(&mut self) -> Result<(), FeedError> {
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, FeedError> {
        self.transport.next_frame().await
    }

    fn decode(&self, text: &str) -> Result<Vec<FeedEvent>, DecodeError> {
        messages::decode(text)
    }

    fn asset_name(&self, asset_id: &str) -> String {
        asset_id.to_string()
    }

    async fn close(&mut self) {
        self.transport.close().await;
    }
}
