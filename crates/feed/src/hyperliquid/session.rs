//! Hyperliquid websocket session. No client keepalive.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::connection::{Frame, VenueSession};
use crate::error::{DecodeError, FeedError};
use crate::events::FeedEvent;
use crate::hyperliquid::messages;
use crate::transport::WsTransport;

pub const HYPERLIQUID_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";

/// Significant figures requested for book levels.
const N_SIG_FIGS: u32 = 5;

pub struct HyperliquidSession {
    url: String,
    coin: String,
    transport: WsTransport,
}

impl HyperliquidSession {
    pub fn new(url: impl Into<String>, coin: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            coin: coin.into(),
            transport: WsTransport::new(),
        }
    }

    fn subscription_request(&self) -> serde_json::Value {
        json!({
            "method": "subscribe",
            "subscription": {
                "type": "l2Book",
                "coin": self.coin,
                "nSigFigs": N_SIG_FIGS,
            },
        })
    }
}

#[async_trait]
impl VenueSession for HyperliquidSession {
    fn name(&self) -> &'static str {
        "hyperliquid"
    }

    async fn connect(&mut self) -> Result<(), FeedError> {
        self.transport.connect(&self.url).await
    }

    async fn subscribe(&mut self) -> Result<(), FeedError> {
        let request = self.subscription_request();
        debug!(coin = %self.coin, "subscribing to l2Book");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_shape() {
        let session = HyperliquidSession::new(HYPERLIQUID_WS_URL, "BTC");
        let request = session.subscription_request();
        assert_eq!(request["method"], "subscribe");
        assert_eq!(request["subscription"]["type"], "l2Book");
        assert_eq!(request["subscription"]["coin"], "BTC");
        assert_eq!(request["subscription"]["nSigFigs"], 5);
    }

    #[test]
    fn no_client_keepalive() {
        let session = HyperliquidSession::new(HYPERLIQUID_WS_URL, "BTC");
        assert!(session.ping_interval().is_none());
    }
}
