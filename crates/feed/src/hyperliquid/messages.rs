//! Hyperliquid websocket message decoding.
//!
//! Messages carry a `channel` tag. Each `l2Book` push is a full snapshot:
//! `data.levels[0]` are bids, `data.levels[1]` asks, `px`/`sz` as decimal
//! strings, `data.time` a millisecond epoch.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::events::{BookSnapshot, FeedEvent, PriceLevel};
use crate::wire;

#[derive(Debug, Deserialize)]
struct L2Book {
    data: L2Data,
}

#[derive(Debug, Deserialize)]
struct L2Data {
    coin: String,
    time: i64,
    levels: Vec<Vec<WireLevel>>,
}

#[derive(Debug, Deserialize)]
struct WireLevel {
    px: String,
    sz: String,
}

pub fn decode(text: &str) -> Result<Vec<FeedEvent>, DecodeError> {
    if text == "PONG" {
        return Ok(vec![FeedEvent::Pong]);
    }

    let value: Value = serde_json::from_str(text)?;
    let channel = value
        .get("channel")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::UnknownEvent("missing channel".to_string()))?;

    match channel {
        "subscriptionResponse" => Ok(vec![FeedEvent::SubscriptionAck]),
        "l2Book" => {
            let book: L2Book = serde_json::from_value(value)?;
            let mut sides = book.data.levels.into_iter();
            let bids = levels(sides.next().unwrap_or_default())?;
            let asks = levels(sides.next().unwrap_or_default())?;
            Ok(vec![FeedEvent::Snapshot(BookSnapshot {
                asset_id: book.data.coin,
                bids,
                asks,
                venue_ts: Some(wire::parse_millis(book.data.time)?),
            })])
        }
        other => Err(DecodeError::UnknownEvent(other.to_string())),
    }
}

fn levels(raw: Vec<WireLevel>) -> Result<Vec<PriceLevel>, DecodeError> {
    raw.into_iter()
        .map(|entry| {
            Ok(PriceLevel {
                price: wire::parse_spot_price(&entry.px)?,
                size: wire::parse_size(&entry.sz)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const L2_BOOK: &str = r#"{"channel":"l2Book","data":{"coin":"BTC","time":1706000000000,"levels":[[{"px":"42000.0","sz":"1.5","n":3},{"px":"41999.0","sz":"0.8","n":1}],[{"px":"42001.0","sz":"2.1","n":2}]]}}"#;

    #[test]
    fn decodes_l2_book_as_full_snapshot() {
        let events = decode(L2_BOOK).unwrap();
        match &events[0] {
            FeedEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.asset_id, "BTC");
                assert_eq!(snapshot.bids.len(), 2);
                assert_eq!(snapshot.bids[0].price, "42000.0".parse().unwrap());
                assert_eq!(snapshot.asks.len(), 1);
                assert_eq!(
                    snapshot.venue_ts.unwrap().timestamp_millis(),
                    1_706_000_000_000
                );
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn classifies_subscription_response() {
        let json = r#"{"channel":"subscriptionResponse","data":{"method":"subscribe"}}"#;
        let events = decode(json).unwrap();
        assert!(matches!(events[0], FeedEvent::SubscriptionAck));
    }

    #[test]
    fn tolerates_pong_text() {
        let events = decode("PONG").unwrap();
        assert!(matches!(events[0], FeedEvent::Pong));
    }

    #[test]
    fn rejects_unknown_channel() {
        let json = r#"{"channel":"trades","data":{}}"#;
        assert!(matches!(
            decode(json),
            Err(DecodeError::UnknownEvent(channel)) if channel == "trades"
        ));
    }

    #[test]
    fn empty_levels_yield_empty_sides() {
        let json = r#"{"channel":"l2Book","data":{"coin":"BTC","time":1706000000000,"levels":[[],[]]}}"#;
        let events = decode(json).unwrap();
        match &events[0] {
            FeedEvent::Snapshot(snapshot) => {
                assert!(snapshot.bids.is_empty());
                assert!(snapshot.asks.is_empty());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }
}
