//! Capture supervisor: one capture cycle per hourly market.
//!
//! The supervisor is a plain state-machine loop driven by a `ControlEvent`
//! channel. Signal handlers and timers only translate into channel sends;
//! all teardown and restart decisions happen in one place, and the
//! escalation rule is a pure function over the events seen during teardown.

use std::time::Duration;

use bookcap_feed::connection::{FeedConnection, FeedHandle};
use bookcap_feed::polymarket::{hourly_slug, MarketInfo, MarketResolver, PolymarketSession};
use bookcap_feed::reference::{fetch_with_retry, BinanceReference, HyperliquidReference};
use bookcap_feed::{binance::BinanceSession, hyperliquid::HyperliquidSession, MarketInfoError};
use bookcap_store::BufferedColumnStore;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::relocate::relocate_outputs;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("market resolution failed: {0}")]
    Market(#[from] MarketInfoError),
}

/// Everything that can end a capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// SIGINT / SIGTERM: stop capturing and exit.
    Shutdown,
    /// SIGUSR1: tear the cycle down and start a fresh one.
    SoftRestart,
    /// The hourly boundary timer fired.
    Rollover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEnd {
    Restart,
    Exit,
}

/// Teardown decision. `trigger` ended the cycle; `pending` is whatever else
/// arrived on the control channel while we were tearing down. A shutdown
/// anywhere wins, and a second soft-restart before the first completed
/// escalates to exit rather than looping a wedged process forever. A
/// rollover landing mid-teardown is absorbed: the restart it wanted is
/// already happening.
pub fn decide_cycle_end(trigger: ControlEvent, pending: &[ControlEvent]) -> CycleEnd {
    if trigger == ControlEvent::Shutdown {
        return CycleEnd::Exit;
    }
    for event in pending {
        match event {
            ControlEvent::Shutdown | ControlEvent::SoftRestart => return CycleEnd::Exit,
            ControlEvent::Rollover => {}
        }
    }
    CycleEnd::Restart
}

/// Time until the next top-of-hour boundary. A boundary less than a second
/// away is skipped: the cycle that is about to start should own the full
/// hour, not roll over immediately.
pub fn rollover_delay(now: DateTime<Utc>) -> Duration {
    const HOUR_MS: i64 = 3_600_000;
    let mut remaining = HOUR_MS - now.timestamp_millis().rem_euclid(HOUR_MS);
    if remaining < 1000 {
        remaining += HOUR_MS;
    }
    Duration::from_millis(remaining as u64)
}

/// Translate process signals into control events until the channel closes.
pub fn spawn_signal_listener(
    tx: mpsc::Sender<ControlEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = sigint.recv() => {
                    info!("SIGINT received");
                    ControlEvent::Shutdown
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received");
                    ControlEvent::Shutdown
                }
                _ = sigusr1.recv() => {
                    info!("SIGUSR1 received");
                    ControlEvent::SoftRestart
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }))
}

pub struct CaptureSupervisor {
    config: Config,
    tx: mpsc::Sender<ControlEvent>,
    rx: mpsc::Receiver<ControlEvent>,
}

impl CaptureSupervisor {
    pub fn new(
        config: Config,
        tx: mpsc::Sender<ControlEvent>,
        rx: mpsc::Receiver<ControlEvent>,
    ) -> Self {
        Self { config, tx, rx }
    }

    pub async fn run(mut self) -> Result<(), SupervisorError> {
        loop {
            match self.run_cycle().await? {
                CycleEnd::Restart => info!("starting next capture cycle"),
                CycleEnd::Exit => break,
            }
        }
        info!("supervisor stopped");
        Ok(())
    }

    /// One capture cycle: resolve the hourly market, run the venue
    /// connections until a control event arrives, tear everything down, and
    /// relocate the cycle's files.
    async fn run_cycle(&mut self) -> Result<CycleEnd, SupervisorError> {
        let market = self.resolve_market().await?;
        let handles = self.start_connections(&market);
        if handles.is_empty() {
            warn!("no venue connections established this cycle");
        }

        let cycle = CancellationToken::new();
        let rollover = self.spawn_rollover_timer(cycle.child_token());
        let reference = self.spawn_reference_timer(cycle.child_token());

        // Running: nothing to do but wait for a reason to stop.
        let trigger = self.rx.recv().await.unwrap_or(ControlEvent::Shutdown);
        info!(event = ?trigger, "capture cycle ending");

        // Stopping: timers first so a late rollover cannot fire into the
        // channel, then the connections, then the files.
        cycle.cancel();
        let _ = rollover.await;
        let _ = reference.await;

        for handle in handles {
            let venue = handle.venue();
            let status = handle.stop().await;
            if status == 0 {
                info!(venue, "connection stopped");
            } else {
                warn!(venue, status, "connection stopped with errors");
            }
        }

        match &market {
            Some(market) => {
                if let Err(e) = relocate_outputs(&self.config.output_dir, &market.slug) {
                    error!(error = %e, "relocation failed");
                }
            }
            None => warn!("no market resolved this cycle; leaving outputs in place"),
        }

        let mut pending = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            pending.push(event);
        }
        Ok(decide_cycle_end(trigger, &pending))
    }

    /// Resolution failure is fatal: without a market there is nothing to
    /// name this hour's capture after.
    async fn resolve_market(&self) -> Result<Option<MarketInfo>, SupervisorError> {
        if !self.config.polymarket.enabled {
            return Ok(None);
        }
        let slug = hourly_slug(&self.config.series, Utc::now());
        info!(slug = %slug, "resolving hourly market");
        let resolver = MarketResolver::new(self.config.gamma_url.clone());
        let market = resolver.resolve(&slug).await?;
        info!(
            slug = %market.slug,
            condition_id = %market.condition_id,
            tokens = market.tokens.len(),
            "resolved market"
        );
        Ok(Some(market))
    }

    fn start_connections(&self, market: &Option<MarketInfo>) -> Vec<FeedHandle> {
        let mut handles = Vec::new();

        if let Some(market) = market {
            let settings = &self.config.polymarket;
            let store = BufferedColumnStore::new(
                &self.config.output_dir,
                settings.depth,
                settings.flush_rows,
            );
            if settings.user_channel {
                match PolymarketSession::user(settings.ws_url.clone(), market) {
                    Ok(session) => handles.push(FeedConnection::spawn(session, store)),
                    Err(e) => warn!(error = %e, "skipping polymarket user channel"),
                }
            } else {
                let session = PolymarketSession::market(settings.ws_url.clone(), market);
                handles.push(FeedConnection::spawn(session, store));
            }
        }

        if self.config.binance.enabled {
            let settings = &self.config.binance;
            let store = BufferedColumnStore::new(
                &self.config.output_dir,
                settings.depth,
                settings.flush_rows,
            );
            let session = BinanceSession::new(settings.ws_url.clone(), settings.symbol.clone());
            handles.push(FeedConnection::spawn(session, store));
        }

        if self.config.hyperliquid.enabled {
            let settings = &self.config.hyperliquid;
            let store = BufferedColumnStore::new(
                &self.config.output_dir,
                settings.depth,
                settings.flush_rows,
            );
            let session = HyperliquidSession::new(settings.ws_url.clone(), settings.coin.clone());
            handles.push(FeedConnection::spawn(session, store));
        }

        handles
    }

    fn spawn_rollover_timer(&self, token: CancellationToken) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let delay = rollover_delay(Utc::now());
            info!(seconds = delay.as_secs(), "rollover armed");
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if tx.send(ControlEvent::Rollover).await.is_err() {
                        warn!("control channel closed before rollover could fire");
                    }
                }
            }
        })
    }

    fn spawn_reference_timer(&self, token: CancellationToken) -> JoinHandle<()> {
        let config = self.config.clone();
        tokio::spawn(async move {
            let delay = Duration::from_secs(config.reference_delay_secs);
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let binance = if config.binance.enabled {
                let source = BinanceReference::new(
                    config.binance.api_url.clone(),
                    config.binance.symbol.clone(),
                );
                Some(fetch_with_retry(&source).await)
            } else {
                None
            };
            let hyperliquid = if config.hyperliquid.enabled {
                let source = HyperliquidReference::new(
                    config.hyperliquid.info_url.clone(),
                    config.hyperliquid.coin.clone(),
                );
                Some(fetch_with_retry(&source).await)
            } else {
                None
            };

            let targets = targets_map(binance, hyperliquid);
            if targets.is_empty() {
                warn!("no spot venue enabled; skipping targets.json");
                return;
            }
            write_targets(&config.output_dir, &targets);
        })
    }
}

/// One entry per enabled spot venue. A venue whose fetch came up empty is
/// recorded as `null` so the file's shape does not depend on venue health.
fn targets_map(
    binance: Option<Option<f64>>,
    hyperliquid: Option<Option<f64>>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut targets = serde_json::Map::new();
    if let Some(price) = binance {
        targets.insert(
            "binance_target".to_string(),
            price.map_or(serde_json::Value::Null, serde_json::Value::from),
        );
    }
    if let Some(price) = hyperliquid {
        targets.insert(
            "hyperliquid_target".to_string(),
            price.map_or(serde_json::Value::Null, serde_json::Value::from),
        );
    }
    targets
}

fn write_targets(out_dir: &std::path::Path, targets: &serde_json::Map<String, serde_json::Value>) {
    let path = out_dir.join("targets.json");
    match serde_json::to_string_pretty(targets) {
        Ok(json) => match std::fs::write(&path, json) {
            Ok(()) => info!(path = %path.display(), venues = targets.len(), "wrote reference prices"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to write targets.json"),
        },
        Err(e) => error!(error = %e, "failed to serialize reference prices"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn failed_fetches_become_null_targets() {
        let targets = targets_map(Some(Some(42123.5)), Some(None));
        assert_eq!(targets["binance_target"], 42123.5);
        assert!(targets["hyperliquid_target"].is_null());
    }

    #[test]
    fn disabled_venues_are_omitted_from_targets() {
        let targets = targets_map(None, Some(Some(42120.0)));
        assert!(!targets.contains_key("binance_target"));
        assert_eq!(targets["hyperliquid_target"], 42120.0);

        assert!(targets_map(None, None).is_empty());
    }

    #[test]
    fn targets_file_is_written_even_when_every_fetch_failed() {
        let tmp = TempDir::new().unwrap();
        let targets = targets_map(Some(None), Some(None));
        write_targets(tmp.path(), &targets);

        let raw = std::fs::read_to_string(tmp.path().join("targets.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(parsed["binance_target"].is_null());
        assert!(parsed["hyperliquid_target"].is_null());
    }

    #[test]
    fn shutdown_always_exits() {
        assert_eq!(
            decide_cycle_end(ControlEvent::Shutdown, &[]),
            CycleEnd::Exit
        );
        assert_eq!(
            decide_cycle_end(ControlEvent::Shutdown, &[ControlEvent::Rollover]),
            CycleEnd::Exit
        );
    }

    #[test]
    fn single_soft_restart_restarts() {
        assert_eq!(
            decide_cycle_end(ControlEvent::SoftRestart, &[]),
            CycleEnd::Restart
        );
    }

    #[test]
    fn repeated_soft_restart_escalates_to_exit() {
        assert_eq!(
            decide_cycle_end(ControlEvent::SoftRestart, &[ControlEvent::SoftRestart]),
            CycleEnd::Exit
        );
    }

    #[test]
    fn rollover_restarts_and_absorbs_pending_rollovers() {
        assert_eq!(
            decide_cycle_end(ControlEvent::Rollover, &[]),
            CycleEnd::Restart
        );
        assert_eq!(
            decide_cycle_end(ControlEvent::Rollover, &[ControlEvent::Rollover]),
            CycleEnd::Restart
        );
    }

    #[test]
    fn pending_shutdown_overrides_a_restart_trigger() {
        assert_eq!(
            decide_cycle_end(ControlEvent::Rollover, &[ControlEvent::Shutdown]),
            CycleEnd::Exit
        );
    }

    #[test]
    fn rollover_fires_at_the_top_of_the_hour() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 20, 15, 0).unwrap();
        assert_eq!(rollover_delay(now), Duration::from_secs(45 * 60));
    }

    #[test]
    fn imminent_boundary_is_skipped_to_the_following_hour() {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 5, 20, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(500))
            .unwrap();
        assert_eq!(rollover_delay(now), Duration::from_millis(3_600_500));
    }

    #[test]
    fn exact_boundary_waits_a_full_hour() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 21, 0, 0).unwrap();
        // At the boundary the remainder is a full hour, which is what the
        // fresh cycle wants.
        assert_eq!(rollover_delay(now), Duration::from_secs(3600));
    }
}
