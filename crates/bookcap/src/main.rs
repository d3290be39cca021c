//! bookcap binary entry point

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod relocate;
mod supervisor;

use config::Config;
use supervisor::{spawn_signal_listener, CaptureSupervisor};

#[derive(Parser, Debug)]
#[command(name = "bookcap")]
#[command(about = "Hourly order-book capture for prediction and spot venues")]
struct Args {
    /// Path to YAML configuration file; without one the built-in defaults
    /// run the standard BTC hourly capture
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load config");
            e
        })?,
        None => Config::default(),
    };

    info!(
        output_dir = %config.output_dir.display(),
        series = %config.series,
        polymarket = config.polymarket.enabled,
        binance = config.binance.enabled,
        hyperliquid = config.hyperliquid.enabled,
        "starting capture"
    );

    let (tx, rx) = mpsc::channel(16);
    let _signals = spawn_signal_listener(tx.clone())?;

    CaptureSupervisor::new(config, tx, rx).run().await?;

    info!("capture stopped");
    Ok(())
}
