//! Per-asset order book state machine.
//!
//! Pure state, no I/O: each side is a `BTreeMap<Decimal, Decimal>` keyed by
//! price, so sorting is implicit and a price can never appear twice. Bids are
//! read highest-first, asks lowest-first. A level with size zero is removed,
//! never stored.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::events::{PriceLevel, Side};

#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full replacement: clear both sides and insert every non-empty level.
    pub fn apply_snapshot(&mut self, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) {
        self.bids.clear();
        self.asks.clear();
        for level in bids {
            if level.size > Decimal::ZERO {
                self.bids.insert(level.price, level.size);
            }
        }
        for level in asks {
            if level.size > Decimal::ZERO {
                self.asks.insert(level.price, level.size);
            }
        }
        self.check_crossed();
    }

    /// Incremental update that only touches prices already resident: size
    /// zero removes the level (no-op if absent), a non-zero size replaces the
    /// size of an existing level and drops changes for unseen prices.
    pub fn apply_change(&mut self, side: Side, level: PriceLevel) {
        let book_side = self.side_mut(side);
        if level.size.is_zero() {
            book_side.remove(&level.price);
        } else if let Some(size) = book_side.get_mut(&level.price) {
            *size = level.size;
        }
        self.check_crossed();
    }

    /// Incremental update for venues whose feed pushes levels the client has
    /// not seen: size zero removes, anything else inserts-or-replaces.
    pub fn apply_delta(&mut self, side: Side, level: PriceLevel) {
        let book_side = self.side_mut(side);
        if level.size.is_zero() {
            book_side.remove(&level.price);
        } else {
            book_side.insert(level.price, level.size);
        }
        self.check_crossed();
    }

    /// Up to `n` best levels per side as (price, size) pairs, bids descending
    /// and asks ascending. A book thinner than `n` yields fewer pairs.
    pub fn top_levels(&self, n: usize) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(n)
            .map(|(price, size)| (*price, *size))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(n)
            .map(|(price, size)| (*price, *size))
            .collect();
        (bids, asks)
    }

    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids
            .iter()
            .next_back()
            .map(|(price, size)| (*price, *size))
    }

    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.iter().next().map(|(price, size)| (*price, *size))
    }

    /// Both sides non-empty with best bid at or above best ask.
    pub fn crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    // Observability only: the book is left as-is when crossed.
    fn check_crossed(&self) {
        if self.crossed() {
            let (bids, asks) = self.top_levels(3);
            warn!(?bids, ?asks, "crossed book");
        }
    }
}
