//! Capture configuration.
//!
//! Everything has a default tuned for the standard BTC hourly capture, so the
//! binary runs with no config file at all. A YAML file overrides per field.

use std::path::{Path, PathBuf};

use bookcap_feed::binance::BINANCE_WS_URL;
use bookcap_feed::hyperliquid::HYPERLIQUID_WS_URL;
use bookcap_feed::polymarket::market_info::GAMMA_API_URL;
use bookcap_feed::polymarket::POLYMARKET_WS_URL;
use serde::Deserialize;
use thiserror::Error;

pub const BINANCE_API_URL: &str = "https://api.binance.com/api";
pub const HYPERLIQUID_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory parquet files and `targets.json` land in before relocation.
    pub output_dir: PathBuf,
    /// Market-slug series prefix, completed with the current ET hour.
    pub series: String,
    pub gamma_url: String,
    /// Seconds after cycle start to fetch the hourly reference prices.
    pub reference_delay_secs: u64,
    pub polymarket: PolymarketConfig,
    pub binance: BinanceConfig,
    pub hyperliquid: HyperliquidConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolymarketConfig {
    pub enabled: bool,
    pub ws_url: String,
    /// Subscribe the authenticated user channel instead of the public
    /// market channel. Requires API_KEY / API_SECRET / PASSPHRASE.
    pub user_channel: bool,
    pub depth: usize,
    pub flush_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub enabled: bool,
    pub ws_url: String,
    pub api_url: String,
    pub symbol: String,
    pub depth: usize,
    pub flush_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HyperliquidConfig {
    pub enabled: bool,
    pub ws_url: String,
    pub info_url: String,
    pub coin: String,
    pub depth: usize,
    pub flush_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            series: "bitcoin-up-or-down".to_string(),
            gamma_url: GAMMA_API_URL.to_string(),
            reference_delay_secs: 60,
            polymarket: PolymarketConfig::default(),
            binance: BinanceConfig::default(),
            hyperliquid: HyperliquidConfig::default(),
        }
    }
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: POLYMARKET_WS_URL.to_string(),
            user_channel: false,
            depth: 5,
            flush_rows: 1000,
        }
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: BINANCE_WS_URL.to_string(),
            api_url: BINANCE_API_URL.to_string(),
            symbol: "BTCUSDT".to_string(),
            depth: 1,
            flush_rows: 10_000,
        }
    }
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: HYPERLIQUID_WS_URL.to_string(),
            info_url: HYPERLIQUID_INFO_URL.to_string(),
            coin: "BTC".to_string(),
            depth: 10,
            flush_rows: 1000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
