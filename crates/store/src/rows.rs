use chrono::{DateTime, Utc};

/// Kind of normalized record a capture produces. Also the first component of
/// output file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Orderbook,
    Trade,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Orderbook => "orderbook",
            RecordKind::Trade => "trade",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of an asset's order book: the top levels of each side at
/// capture time. `bids` and `asks` hold (price, size) pairs best-first,
/// already truncated to the venue depth; a thin book yields fewer pairs.
#[derive(Debug, Clone)]
pub struct BookRow {
    pub captured_at: DateTime<Utc>,
    pub venue_ts: Option<DateTime<Utc>>,
    pub asset_id: String,
    pub asset_name: String,
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

/// One executed trade reported by a venue.
#[derive(Debug, Clone)]
pub struct TradeRow {
    pub captured_at: DateTime<Utc>,
    pub venue_ts: Option<DateTime<Utc>>,
    pub asset_id: String,
    pub asset_name: String,
    pub side: String,
    pub price: f64,
    pub size: f64,
}
