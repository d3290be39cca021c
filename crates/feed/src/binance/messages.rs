//! Binance book-ticker message decoding.
//!
//! The `<symbol>@bookTicker` stream pushes best bid/ask pairs; each update
//! decodes to a single-level book snapshot with no venue timestamp. The
//! subscription ack is `{"result": null, "id": ...}`.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::events::{BookSnapshot, FeedEvent, PriceLevel};
use crate::wire;

#[derive(Debug, Deserialize)]
struct BookTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    bid_price: String,
    #[serde(rename = "B")]
    bid_size: String,
    #[serde(rename = "a")]
    ask_price: String,
    #[serde(rename = "A")]
    ask_size: String,
}

pub fn decode(text: &str) -> Result<Vec<FeedEvent>, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("result").is_some() {
        return Ok(vec![FeedEvent::SubscriptionAck]);
    }

    let ticker: BookTicker = serde_json::from_value(value)?;
    Ok(vec![FeedEvent::Snapshot(BookSnapshot {
        asset_id: ticker.symbol,
        bids: vec![PriceLevel {
            price: wire::parse_spot_price(&ticker.bid_price)?,
            size: wire::parse_size(&ticker.bid_size)?,
        }],
        asks: vec![PriceLevel {
            price: wire::parse_spot_price(&ticker.ask_price)?,
            size: wire::parse_size(&ticker.ask_size)?,
        }],
        venue_ts: None,
    })])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKER: &str = r#"{"u":400900217,"s":"BTCUSDT","b":"42000.50000000","B":"31.21000000","a":"42000.51000000","A":"40.66000000"}"#;

    #[test]
    fn decodes_book_ticker_as_single_level_snapshot() {
        let events = decode(TICKER).unwrap();
        match &events[0] {
            FeedEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.asset_id, "BTCUSDT");
                assert_eq!(snapshot.bids.len(), 1);
                assert_eq!(snapshot.bids[0].price, "42000.5".parse().unwrap());
                assert_eq!(snapshot.asks[0].size, "40.66".parse().unwrap());
                assert!(snapshot.venue_ts.is_none());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn classifies_subscription_ack() {
        let events = decode(r#"{"result":null,"id":1}"#).unwrap();
        assert!(matches!(events[0], FeedEvent::SubscriptionAck));
    }

    #[test]
    fn rejects_non_positive_price() {
        let json = r#"{"u":1,"s":"BTCUSDT","b":"0","B":"1","a":"42000.51","A":"1"}"#;
        assert!(matches!(decode(json), Err(DecodeError::PriceOutOfRange(_))));
    }

    #[test]
    fn rejects_missing_fields() {
        let json = r#"{"u":1,"s":"BTCUSDT"}"#;
        assert!(matches!(decode(json), Err(DecodeError::Json(_))));
    }
}
