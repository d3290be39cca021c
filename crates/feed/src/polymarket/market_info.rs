//! Hourly market resolution via the Polymarket Gamma REST API.
//!
//! The traded market changes every hour; its slug is derived from the
//! current wall-clock hour in US-Eastern time, e.g.
//! `bitcoin-up-or-down-january-5-3pm-et`.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::America::New_York;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::MarketInfoError;

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// One tradable token (outcome) of a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub token_id: String,
    pub token_name: String,
}

/// Everything a capture cycle needs to know about the current hourly market.
/// Fetched once per cycle and discarded at the next restart.
#[derive(Debug, Clone)]
pub struct MarketInfo {
    pub slug: String,
    pub condition_id: String,
    pub tokens: Vec<TokenInfo>,
}

/// Slug for the market covering the hour containing `now`: series name,
/// lowercase full month, un-padded day, 12-hour clock with am/pm, all in
/// US-Eastern wall-clock time.
pub fn hourly_slug(series: &str, now: DateTime<Utc>) -> String {
    let eastern = now.with_timezone(&New_York);
    let month = eastern.format("%B").to_string().to_lowercase();
    let (is_pm, hour) = eastern.hour12();
    let meridiem = if is_pm { "pm" } else { "am" };
    format!(
        "{}-{}-{}-{}{}-et",
        series,
        month,
        eastern.day(),
        hour,
        meridiem
    )
}

// Gamma encodes token ids and outcome names as JSON strings inside JSON.
#[derive(Debug, Deserialize)]
struct GammaMarket {
    #[serde(rename = "conditionId")]
    condition_id: Option<String>,
    #[serde(rename = "clobTokenIds")]
    clob_token_ids: Option<String>,
    outcomes: Option<String>,
}

pub struct MarketResolver {
    client: reqwest::Client,
    base_url: String,
}

impl MarketResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Resolve the market for `slug`. An empty result is fatal to the cycle;
    /// more than one match logs a warning and uses the first.
    pub async fn resolve(&self, slug: &str) -> Result<MarketInfo, MarketInfoError> {
        let url = format!("{}/markets", self.base_url);
        debug!(slug, "resolving market via gamma");
        let markets: Vec<GammaMarket> = self
            .client
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if markets.len() > 1 {
            warn!(slug, count = markets.len(), "more than one market matched, using first");
        }
        let market = markets
            .into_iter()
            .next()
            .ok_or_else(|| MarketInfoError::NoMarket(slug.to_string()))?;

        let condition_id = market
            .condition_id
            .ok_or(MarketInfoError::BadField("conditionId"))?;
        let token_ids: Vec<String> = serde_json::from_str(
            &market
                .clob_token_ids
                .ok_or(MarketInfoError::BadField("clobTokenIds"))?,
        )?;
        let outcomes: Vec<String> =
            serde_json::from_str(&market.outcomes.ok_or(MarketInfoError::BadField("outcomes"))?)?;
        if token_ids.len() != outcomes.len() {
            return Err(MarketInfoError::BadField("outcomes"));
        }

        Ok(MarketInfo {
            slug: slug.to_string(),
            condition_id,
            tokens: token_ids
                .into_iter()
                .zip(outcomes)
                .map(|(token_id, token_name)| TokenInfo {
                    token_id,
                    token_name,
                })
                .collect(),
        })
    }
}
