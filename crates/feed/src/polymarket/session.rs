//! Polymarket CLOB websocket session.
//!
//! The market channel needs no authentication; the user channel requires an
//! auth block derived from `API_KEY` / `API_SECRET` / `PASSPHRASE` in the
//! environment, checked at construction time before any transport is opened.
//! Keepalive is a raw text `"PING"` every 10 seconds, not a ws ping frame.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::connection::{ChangeSemantics, Frame, VenueSession};
use crate::error::{DecodeError, FeedError};
use crate::events::FeedEvent;
use crate::polymarket::market_info::MarketInfo;
use crate::polymarket::messages;
use crate::transport::WsTransport;

pub const POLYMARKET_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com";

const PING_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Market,
    User,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Market => "market",
            Channel::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl Credentials {
    /// Read credentials from the environment. Missing variables fail the
    /// session before a transport is ever opened.
    pub fn from_env() -> Result<Self, FeedError> {
        Ok(Self {
            api_key: std::env::var("API_KEY")
                .map_err(|_| FeedError::MissingCredentials("API_KEY"))?,
            secret: std::env::var("API_SECRET")
                .map_err(|_| FeedError::MissingCredentials("API_SECRET"))?,
            passphrase: std::env::var("PASSPHRASE")
                .map_err(|_| FeedError::MissingCredentials("PASSPHRASE"))?,
        })
    }
}

pub struct PolymarketSession {
    base_url: String,
    channel: Channel,
    token_ids: Vec<String>,
    names: HashMap<String, String>,
    condition_id: String,
    auth: Option<Credentials>,
    transport: WsTransport,
}

impl PolymarketSession {
    /// Public market-data channel for the given market's tokens.
    pub fn market(base_url: impl Into<String>, market: &MarketInfo) -> Self {
        Self::new(base_url, Channel::Market, market, None)
    }

    /// Authenticated user channel; fails fast when credentials are absent.
    pub fn user(base_url: impl Into<String>, market: &MarketInfo) -> Result<Self, FeedError> {
        let credentials = Credentials::from_env()?;
        Ok(Self::new(base_url, Channel::User, market, Some(credentials)))
    }

    fn new(
        base_url: impl Into<String>,
        channel: Channel,
        market: &MarketInfo,
        auth: Option<Credentials>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            channel,
            token_ids: market
                .tokens
                .iter()
                .map(|token| token.token_id.clone())
                .collect(),
            names: market
                .tokens
                .iter()
                .map(|token| (token.token_id.clone(), token.token_name.clone()))
                .collect(),
            condition_id: market.condition_id.clone(),
            auth,
            transport: WsTransport::new(),
        }
    }

    fn subscription_request(&self) -> Result<serde_json::Value, FeedError> {
        match self.channel {
            Channel::Market => Ok(json!({
                "assets_ids": self.token_ids,
                "type": Channel::Market.as_str(),
            })),
            Channel::User => {
                let auth = self
                    .auth
                    .as_ref()
                    .ok_or(FeedError::MissingCredentials("auth"))?;
                Ok(json!({
                    "markets": [self.condition_id],
                    "type": Channel::User.as_str(),
                    "auth": {
                        "apiKey": auth.api_key,
                        "secret": auth.secret,
                        "passphrase": auth.passphrase,
                    },
                }))
            }
        }
    }
}

#[async_trait]
impl VenueSession for PolymarketSession {
    fn name(&self) -> &'static str {
        "polymarket"
    }

    fn ping_interval(&self) -> Option<Duration> {
        Some(PING_INTERVAL)
    }

    fn change_semantics(&self) -> ChangeSemantics {
        ChangeSemantics::RequirePresence
    }

    async fn connect(&mut self) -> Result<(), FeedError> {
        let url = format!("{}/ws/{}", self.base_url, self.channel.as_str());
        self.transport.connect(&url).await
    }

    async fn subscribe(&mut self) -> Result<(), FeedError> {
        let request = self.subscription_request()?;
        debug!(channel = self.channel.as_str(), tokens = self.token_ids.len(), "subscribing");
        self.transport.send_text(request.to_string()).await
    }

    async fn send_ping(&mut self) -> Result<(), FeedError> {
        self.transport.send_text("PING".to_string()).await
    }

    async fn next_frame(&mut self) -> Result<Frame, FeedError> {
        self.transport.next_frame().await
    }

    fn decode(&self, text: &str) -> Result<Vec<FeedEvent>, DecodeError> {
        messages::decode(text)
    }

    fn asset_name(&self, asset_id: &str) -> String {
        self.names
            .get(asset_id)
            .cloned()
            .unwrap_or_else(|| asset_id.to_string())
    }

    async fn close(&mut self) {
        self.transport.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polymarket::market_info::TokenInfo;

    fn market_info() -> MarketInfo {
        MarketInfo {
            slug: "bitcoin-up-or-down-january-5-3pm-et".to_string(),
            condition_id: "0xabc".to_string(),
            tokens: vec![
                TokenInfo {
                    token_id: "111".to_string(),
                    token_name: "Up".to_string(),
                },
                TokenInfo {
                    token_id: "222".to_string(),
                    token_name: "Down".to_string(),
                },
            ],
        }
    }

    #[test]
    fn market_subscription_shape() {
        let session = PolymarketSession::market(POLYMARKET_WS_URL, &market_info());
        let request = session.subscription_request().unwrap();
        assert_eq!(request["type"], "market");
        assert_eq!(request["assets_ids"][0], "111");
        assert_eq!(request["assets_ids"][1], "222");
        assert!(request.get("auth").is_none());
    }

    #[test]
    fn asset_names_resolve_to_token_outcomes() {
        let session = PolymarketSession::market(POLYMARKET_WS_URL, &market_info());
        assert_eq!(session.asset_name("111"), "Up");
        assert_eq!(session.asset_name("222"), "Down");
        // Unknown ids fall back to the id itself.
        assert_eq!(session.asset_name("999"), "999");
    }

    #[test]
    fn user_channel_requires_credentials() {
        // Single test owns these variables to avoid races between tests.
        std::env::remove_var("API_KEY");
        std::env::remove_var("API_SECRET");
        std::env::remove_var("PASSPHRASE");
        assert!(matches!(
            PolymarketSession::user(POLYMARKET_WS_URL, &market_info()),
            Err(FeedError::MissingCredentials("API_KEY"))
        ));

        std::env::set_var("API_KEY", "key");
        std::env::set_var("API_SECRET", "secret");
        std::env::set_var("PASSPHRASE", "phrase");
        let session = PolymarketSession::user(POLYMARKET_WS_URL, &market_info()).unwrap();
        let request = session.subscription_request().unwrap();
        assert_eq!(request["type"], "user");
        assert_eq!(request["markets"][0], "0xabc");
        assert_eq!(request["auth"]["apiKey"], "key");
        assert_eq!(request["auth"]["passphrase"], "phrase");
        std::env::remove_var("API_KEY");
        std::env::remove_var("API_SECRET");
        std::env::remove_var("PASSPHRASE");
    }

    #[test]
    fn ping_interval_is_ten_seconds() {
        let session = PolymarketSession::market(POLYMARKET_WS_URL, &market_info());
        assert_eq!(session.ping_interval(), Some(Duration::from_secs(10)));
    }
}
