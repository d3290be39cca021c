//! Hourly reference prices.
//!
//! Each spot venue exposes the open of the first one-minute candle of the
//! current UTC hour. Fetches retry a fixed number of times and degrade to
//! `None` rather than failing the capture cycle.

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::error::ReferenceError;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// One venue's reference-price endpoint. `Ok(None)` means the venue answered
/// but has no candle yet for the current hour.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    fn venue(&self) -> &'static str;

    async fn fetch(&self) -> Result<Option<f64>, ReferenceError>;
}

/// Retries the fetch with a fixed delay, giving up after [`MAX_ATTEMPTS`].
/// Never errors: a venue without a reference price is logged and skipped.
pub async fn fetch_with_retry(source: &dyn ReferenceSource) -> Option<f64> {
    for attempt in 1..=MAX_ATTEMPTS {
        match source.fetch().await {
            Ok(Some(price)) => {
                info!(venue = source.venue(), price, "fetched reference price");
                return Some(price);
            }
            Ok(None) => {
                warn!(
                    venue = source.venue(),
                    attempt, "no candle yet for current hour"
                );
            }
            Err(err) => {
                warn!(venue = source.venue(), attempt, %err, "reference fetch failed");
            }
        }
        if attempt < MAX_ATTEMPTS {
            sleep(RETRY_DELAY).await;
        }
    }
    warn!(
        venue = source.venue(),
        attempts = MAX_ATTEMPTS,
        "giving up on reference price"
    );
    None
}

/// Millisecond bounds of the first minute of the current UTC hour.
pub fn candle_window(now: DateTime<Utc>) -> (i64, i64) {
    let hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let start = hour_start.timestamp_millis();
    (start, start + 60_000)
}

pub struct BinanceReference {
    api_url: String,
    symbol: String,
    client: reqwest::Client,
}

impl BinanceReference {
    pub fn new(api_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            symbol: symbol.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReferenceSource for BinanceReference {
    fn venue(&self) -> &'static str {
        "binance"
    }

    async fn fetch(&self) -> Result<Option<f64>, ReferenceError> {
        let (start, end) = candle_window(Utc::now());
        let url = format!("{}/v3/klines", self.api_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", "1m"),
                ("startTime", &start.to_string()),
                ("endTime", &end.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ReferenceError::Status(response.status()));
        }

        // Klines are heterogeneous arrays; index 1 is the open price string.
        let klines: Vec<Vec<serde_json::Value>> = response.json().await?;
        let Some(first) = klines.first() else {
            return Ok(None);
        };
        let open = first
            .get(1)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ReferenceError::Malformed("kline open missing".to_string()))?;
        let price: f64 = open
            .parse()
            .map_err(|_| ReferenceError::Malformed(format!("kline open: {open}")))?;
        Ok(Some(price))
    }
}

pub struct HyperliquidReference {
    info_url: String,
    coin: String,
    client: reqwest::Client,
}

impl HyperliquidReference {
    pub fn new(info_url: impl Into<String>, coin: impl Into<String>) -> Self {
        Self {
            info_url: info_url.into(),
            coin: coin.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candle {
    o: String,
}

#[async_trait]
impl ReferenceSource for HyperliquidReference {
    fn venue(&self) -> &'static str {
        "hyperliquid"
    }

    async fn fetch(&self) -> Result<Option<f64>, ReferenceError> {
        let (start, end) = candle_window(Utc::now());
        let body = json!({
            "type": "candleSnapshot",
            "req": {
                "coin": self.coin,
                "interval": "1m",
                "startTime": start,
                "endTime": end,
            },
        });
        let response = self.client.post(&self.info_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ReferenceError::Status(response.status()));
        }

        let candles: Vec<Candle> = response.json().await?;
        let Some(first) = candles.first() else {
            return Ok(None);
        };
        let price: f64 = first
            .o
            .parse()
            .map_err(|_| ReferenceError::Malformed(format!("candle open: {}", first.o)))?;
        Ok(Some(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Scripted {
        calls: AtomicU32,
        succeed_on: Option<u32>,
    }

    #[async_trait]
    impl ReferenceSource for Scripted {
        fn venue(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self) -> Result<Option<f64>, ReferenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.succeed_on {
                Ok(Some(101.5))
            } else {
                Err(ReferenceError::Malformed("scripted failure".to_string()))
            }
        }
    }

    #[test]
    fn candle_window_covers_first_minute_of_hour() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 20, 43, 17).unwrap();
        let (start, end) = candle_window(now);
        let hour_start = Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap();
        assert_eq!(start, hour_start.timestamp_millis());
        assert_eq!(end - start, 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_attempts() {
        let source = Scripted {
            calls: AtomicU32::new(0),
            succeed_on: None,
        };
        assert_eq!(fetch_with_retry(&source).await, None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_final_attempt() {
        let source = Scripted {
            calls: AtomicU32::new(0),
            succeed_on: Some(5),
        };
        assert_eq!(fetch_with_retry(&source).await, Some(101.5));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn binance_reads_first_kline_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/klines"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("interval", "1m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [1706000000000i64, "42123.50", "42150.0", "42100.0", "42140.0", "31.2", 1706000059999i64, "0", 100, "0", "0", "0"]
            ])))
            .mount(&server)
            .await;

        let source = BinanceReference::new(server.uri(), "BTCUSDT");
        assert_eq!(source.fetch().await.unwrap(), Some(42123.5));
    }

    #[tokio::test]
    async fn binance_empty_klines_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let source = BinanceReference::new(server.uri(), "BTCUSDT");
        assert_eq!(source.fetch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn binance_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/klines"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = BinanceReference::new(server.uri(), "BTCUSDT");
        assert!(matches!(
            source.fetch().await,
            Err(ReferenceError::Status(status)) if status.as_u16() == 429
        ));
    }

    #[tokio::test]
    async fn hyperliquid_reads_first_candle_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "type": "candleSnapshot",
                "req": {"coin": "BTC", "interval": "1m"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"t": 1706000000000i64, "o": "42120.0", "c": "42135.0", "h": "42140.0", "l": "42110.0", "v": "12.5"}
            ])))
            .mount(&server)
            .await;

        let source = HyperliquidReference::new(server.uri(), "BTC");
        assert_eq!(source.fetch().await.unwrap(), Some(42120.0));
    }

    #[tokio::test]
    async fn hyperliquid_empty_snapshot_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let source = HyperliquidReference::new(server.uri(), "BTC");
        assert_eq!(source.fetch().await.unwrap(), None);
    }
}
