//! Generic feed-connection run loop.
//!
//! One `FeedConnection` owns one venue session, the order books for the
//! assets that session streams, and a private `BufferedColumnStore`. The run
//! loop selects over cancellation, an optional keepalive tick, and inbound
//! frames; every exit path closes the store so residual batches are flushed
//! exactly once.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bookcap_store::{BookRow, BufferedColumnStore, TradeRow};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::book::OrderBook;
use crate::error::{DecodeError, FeedError};
use crate::events::FeedEvent;

/// Lifecycle of one connection. Transitions are logged at debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Subscribed,
    Streaming,
    Closing,
    Closed,
}

/// How incremental price changes are applied to a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSemantics {
    /// Only prices already resident are updated; unseen prices are dropped.
    RequirePresence,
    /// Unseen prices are inserted.
    Upsert,
}

/// What the transport hands the run loop per receive.
#[derive(Debug)]
pub enum Frame {
    Text(String),
    Closed(Option<String>),
}

/// Venue-specific half of a feed connection: transport dialing, subscription
/// payloads, keepalive, and wire decoding. The run loop drives it.
#[async_trait]
pub trait VenueSession: Send + 'static {
    fn name(&self) -> &'static str;

    /// Interval for the client-side textual keepalive, if the venue needs one.
    fn ping_interval(&self) -> Option<Duration> {
        None
    }

    fn change_semantics(&self) -> ChangeSemantics {
        ChangeSemantics::RequirePresence
    }

    async fn connect(&mut self) -> Result<(), FeedError>;

    async fn subscribe(&mut self) -> Result<(), FeedError>;

    async fn send_ping(&mut self) -> Result<(), FeedError>;

    async fn next_frame(&mut self) -> Result<Frame, FeedError>;

    fn decode(&self, text: &str) -> Result<Vec<FeedEvent>, DecodeError>;

    /// Human-readable asset name for file naming and row columns.
    fn asset_name(&self, asset_id: &str) -> String;

    /// Best-effort graceful transport close.
    async fn close(&mut self);
}

/// Handle to a spawned connection. Stopping consumes the handle, so stop is
/// idempotent by construction, and blocks until the run loop has exited.
pub struct FeedHandle {
    venue: &'static str,
    token: CancellationToken,
    task: JoinHandle<i32>,
}

impl FeedHandle {
    pub fn venue(&self) -> &'static str {
        self.venue
    }

    /// Cancel the run loop and wait for it to finish. Returns the sticky
    /// exit status: 0 for a clean run, non-zero if a transport error was
    /// observed at any point.
    pub async fn stop(self) -> i32 {
        self.token.cancel();
        self.task.await.unwrap_or(1)
    }
}

pub struct FeedConnection<S: VenueSession> {
    session: S,
    store: BufferedColumnStore,
    books: HashMap<String, OrderBook>,
    state: ConnectionState,
    exit_status: i32,
}

impl<S: VenueSession> FeedConnection<S> {
    /// Spawn the connection's run loop on the current runtime.
    pub fn spawn(session: S, store: BufferedColumnStore) -> FeedHandle {
        let venue = session.name();
        let token = CancellationToken::new();
        let connection = Self {
            session,
            store,
            books: HashMap::new(),
            state: ConnectionState::Connecting,
            exit_status: 0,
        };
        let task = tokio::spawn(connection.run(token.clone()));
        FeedHandle { venue, token, task }
    }

    async fn run(mut self, token: CancellationToken) -> i32 {
        let venue = self.session.name();

        tokio::select! {
            _ = token.cancelled() => return self.finish().await,
            result = self.session.connect() => {
                if let Err(e) = result {
                    error!(venue, error = %e, "connect failed");
                    self.exit_status = 1;
                    return self.finish().await;
                }
            }
        }
        self.set_state(ConnectionState::Open);

        if let Err(e) = self.session.subscribe().await {
            error!(venue, error = %e, "subscribe failed");
            self.exit_status = 1;
            return self.finish().await;
        }
        self.set_state(ConnectionState::Subscribed);

        // First tick a full interval after open, then steady.
        let mut keepalive = self.session.ping_interval().map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                _ = keepalive_tick(&mut keepalive) => {
                    if let Err(e) = self.session.send_ping().await {
                        warn!(venue, error = %e, "keepalive ping failed");
                    }
                }

                frame = self.session.next_frame() => match frame {
                    Ok(Frame::Text(text)) => self.on_text(&text),
                    Ok(Frame::Closed(reason)) => {
                        info!(venue, reason = ?reason, "transport closed");
                        break;
                    }
                    Err(e) => {
                        // Sticky: surfaces in the exit status but does not
                        // close the connection or trigger reconnection.
                        error!(venue, error = %e, "transport error");
                        self.exit_status = 1;
                    }
                }
            }
        }

        self.finish().await
    }

    fn on_text(&mut self, text: &str) {
        let venue = self.session.name();
        let events = match self.session.decode(text) {
            Ok(events) => events,
            Err(e) => {
                warn!(venue, error = %e, "dropping undecodable message");
                return;
            }
        };

        for event in events {
            match event {
                FeedEvent::Snapshot(snapshot) => {
                    self.mark_streaming();
                    self.books
                        .entry(snapshot.asset_id.clone())
                        .or_default()
                        .apply_snapshot(snapshot.bids, snapshot.asks);
                    self.record_book(&snapshot.asset_id, snapshot.venue_ts);
                }
                FeedEvent::Change(change) => {
                    self.mark_streaming();
                    let semantics = self.session.change_semantics();
                    let book = self.books.entry(change.asset_id.clone()).or_default();
                    for item in change.changes {
                        match semantics {
                            ChangeSemantics::RequirePresence => {
                                book.apply_change(item.side, item.level)
                            }
                            ChangeSemantics::Upsert => book.apply_delta(item.side, item.level),
                        }
                    }
                    self.record_book(&change.asset_id, change.venue_ts);
                }
                FeedEvent::Trade(trade) => {
                    self.mark_streaming();
                    let row = TradeRow {
                        captured_at: Utc::now(),
                        venue_ts: trade.venue_ts,
                        asset_id: trade.asset_id.clone(),
                        asset_name: self.session.asset_name(&trade.asset_id),
                        side: trade.side.as_str().to_string(),
                        price: to_f64(trade.price),
                        size: to_f64(trade.size),
                    };
                    if let Err(e) = self.store.write_trade(row) {
                        error!(venue, error = %e, "trade row write failed");
                        self.exit_status = 1;
                    }
                }
                FeedEvent::Pong => debug!(venue, "pong"),
                FeedEvent::SubscriptionAck => debug!(venue, "subscription acknowledged"),
            }
        }
    }

    fn record_book(&mut self, asset_id: &str, venue_ts: Option<DateTime<Utc>>) {
        let Some(book) = self.books.get(asset_id) else {
            return;
        };
        let (bids, asks) = book.top_levels(self.store.depth());
        let row = BookRow {
            captured_at: Utc::now(),
            venue_ts,
            asset_id: asset_id.to_string(),
            asset_name: self.session.asset_name(asset_id),
            bids: level_pairs(bids),
            asks: level_pairs(asks),
        };
        if let Err(e) = self.store.write_book(row) {
            error!(venue = self.session.name(), error = %e, "book row write failed");
            self.exit_status = 1;
        }
    }

    fn mark_streaming(&mut self) {
        if self.state == ConnectionState::Subscribed {
            self.set_state(ConnectionState::Streaming);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!(venue = self.session.name(), from = ?self.state, to = ?state, "state transition");
        self.state = state;
    }

    async fn finish(mut self) -> i32 {
        let venue = self.session.name();
        self.set_state(ConnectionState::Closing);
        self.session.close().await;
        match self.store.close() {
            Ok(files) => {
                if !files.is_empty() {
                    info!(venue, files = files.len(), "flushed residual batches");
                }
            }
            Err(e) => {
                error!(venue, error = %e, "final flush failed");
                self.exit_status = 1;
            }
        }
        self.set_state(ConnectionState::Closed);
        self.exit_status
    }
}

async fn keepalive_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn level_pairs(levels: Vec<(Decimal, Decimal)>) -> Vec<(f64, f64)> {
    levels
        .into_iter()
        .map(|(price, size)| (to_f64(price), to_f64(size)))
        .collect()
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
