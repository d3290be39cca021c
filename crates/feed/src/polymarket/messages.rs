//! Polymarket CLOB websocket message decoding.
//!
//! Messages carry a consistent `event_type` tag. Prices are decimal strings
//! in `[0, 1]`, timestamps are millisecond-epoch strings, and one inbound
//! text frame may hold a single object or an array of them.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::DecodeError;
use crate::events::{BookSnapshot, FeedEvent, LevelChange, PriceChange, PriceLevel, Side, Trade};
use crate::wire;

#[derive(Debug, Deserialize)]
struct WireLevel {
    price: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct BookMessage {
    asset_id: String,
    timestamp: Option<String>,
    #[serde(alias = "buys")]
    bids: Vec<WireLevel>,
    #[serde(alias = "sells")]
    asks: Vec<WireLevel>,
}

#[derive(Debug, Deserialize)]
struct PriceChangeMessage {
    asset_id: String,
    timestamp: Option<String>,
    changes: Vec<WireChange>,
}

#[derive(Debug, Deserialize)]
struct WireChange {
    price: String,
    size: String,
    side: String,
}

#[derive(Debug, Deserialize)]
struct TradeMessage {
    asset_id: String,
    price: String,
    side: String,
    size: String,
    timestamp: Option<String>,
}

/// Decode one inbound text frame into canonical events.
///
/// `tick_size_change` is recognized and skipped. An unknown `event_type`
/// stops processing of the remainder of the frame; events decoded before it
/// are still returned.
pub fn decode(text: &str) -> Result<Vec<FeedEvent>, DecodeError> {
    if text == "PONG" {
        return Ok(vec![FeedEvent::Pong]);
    }

    let value: Value = serde_json::from_str(text)?;
    let objects = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut events = Vec::with_capacity(objects.len());
    for object in objects {
        let tag = object
            .get("event_type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DecodeError::UnknownEvent("missing event_type".to_string()))?;

        match tag.as_str() {
            "book" => events.push(decode_book(object)?),
            "price_change" => events.push(decode_price_change(object)?),
            "last_trade_price" => events.push(decode_trade(object)?),
            "tick_size_change" => {}
            other => {
                warn!(event_type = other, "unknown polymarket event type");
                break;
            }
        }
    }
    Ok(events)
}

fn decode_book(object: Value) -> Result<FeedEvent, DecodeError> {
    let message: BookMessage = serde_json::from_value(object)?;
    Ok(FeedEvent::Snapshot(BookSnapshot {
        asset_id: message.asset_id,
        bids: levels(message.bids)?,
        asks: levels(message.asks)?,
        venue_ts: venue_ts(message.timestamp)?,
    }))
}

fn decode_price_change(object: Value) -> Result<FeedEvent, DecodeError> {
    let message: PriceChangeMessage = serde_json::from_value(object)?;
    let changes = message
        .changes
        .into_iter()
        .map(|change| {
            Ok(LevelChange {
                side: Side::from_wire(&change.side)?,
                level: level(&change.price, &change.size)?,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;
    Ok(FeedEvent::Change(PriceChange {
        asset_id: message.asset_id,
        changes,
        venue_ts: venue_ts(message.timestamp)?,
    }))
}

fn decode_trade(object: Value) -> Result<FeedEvent, DecodeError> {
    let message: TradeMessage = serde_json::from_value(object)?;
    Ok(FeedEvent::Trade(Trade {
        asset_id: message.asset_id,
        side: Side::from_wire(&message.side)?,
        price: wire::parse_unit_price(&message.price)?,
        size: wire::parse_size(&message.size)?,
        venue_ts: venue_ts(message.timestamp)?,
    }))
}

fn level(price: &str, size: &str) -> Result<PriceLevel, DecodeError> {
    Ok(PriceLevel {
        price: wire::parse_unit_price(price)?,
        size: wire::parse_size(size)?,
    })
}

fn levels(raw: Vec<WireLevel>) -> Result<Vec<PriceLevel>, DecodeError> {
    raw.into_iter()
        .map(|entry| level(&entry.price, &entry.size))
        .collect()
}

fn venue_ts(
    timestamp: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, DecodeError> {
    timestamp
        .map(|raw| wire::parse_millis_str(&raw))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"{"event_type":"book","asset_id":"2174263314","market":"0x1234abcd","timestamp":"1706000000000","bids":[{"price":"0.55","size":"1000"},{"price":"0.54","size":"500"}],"asks":[{"price":"0.56","size":"750"}]}"#;

    const PRICE_CHANGE: &str = r#"{"event_type":"price_change","asset_id":"2174263314","market":"0x1234abcd","timestamp":"1706000000000","changes":[{"price":"0.55","size":"0","side":"BUY"},{"price":"0.56","size":"120","side":"SELL"}]}"#;

    const TRADE: &str = r#"{"event_type":"last_trade_price","asset_id":"2174263314","market":"0x1234abcd","price":"0.55","side":"BUY","size":"100","timestamp":"1706000000000"}"#;

    #[test]
    fn decodes_book_snapshot() {
        let events = decode(BOOK).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FeedEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.asset_id, "2174263314");
                assert_eq!(snapshot.bids.len(), 2);
                assert_eq!(snapshot.bids[0].price, "0.55".parse().unwrap());
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
    fn accepts_buys_sells_aliases() {
        let json = r#"{"event_type":"book","asset_id":"1","timestamp":"1706000000000","buys":[{"price":"0.50","size":"10"}],"sells":[]}"#;
        let events = decode(json).unwrap();
        match &events[0] {
            FeedEvent::Snapshot(snapshot) => assert_eq!(snapshot.bids.len(), 1),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn decodes_price_change_with_removal() {
        let events = decode(PRICE_CHANGE).unwrap();
        match &events[0] {
            FeedEvent::Change(change) => {
                assert_eq!(change.asset_id, "2174263314");
                assert_eq!(change.changes.len(), 2);
                assert_eq!(change.changes[0].side, Side::Buy);
                assert!(change.changes[0].level.size.is_zero());
                assert_eq!(change.changes[1].side, Side::Sell);
            }
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[test]
    fn decodes_trade() {
        let events = decode(TRADE).unwrap();
        match &events[0] {
            FeedEvent::Trade(trade) => {
                assert_eq!(trade.side, Side::Buy);
                assert_eq!(trade.price, "0.55".parse().unwrap());
                assert_eq!(trade.size, "100".parse().unwrap());
            }
            other => panic!("expected trade, got {other:?}"),
        }
    }

    #[test]
    fn decodes_array_framing() {
        let json = format!("[{BOOK},{TRADE}]");
        let events = decode(&json).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], FeedEvent::Snapshot(_)));
        assert!(matches!(events[1], FeedEvent::Trade(_)));
    }

    #[test]
    fn pong_text_is_recognized() {
        let events = decode("PONG").unwrap();
        assert!(matches!(events[0], FeedEvent::Pong));
    }

    #[test]
    fn tick_size_change_is_skipped() {
        let json = r#"{"event_type":"tick_size_change","asset_id":"1","market":"0x1","old_tick_size":"0.01","new_tick_size":"0.001"}"#;
        assert!(decode(json).unwrap().is_empty());
    }

    #[test]
    fn unknown_event_type_truncates_the_frame() {
        let json = format!(
            r#"[{TRADE},{{"event_type":"mystery"}},{TRADE}]"#
        );
        let events = decode(&json).unwrap();
        // The trade before the unknown kind survives; the one after is dropped.
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn rejects_bad_side() {
        let json = r#"{"event_type":"price_change","asset_id":"1","timestamp":"1706000000000","changes":[{"price":"0.55","size":"10","side":"HOLD"}]}"#;
        assert!(matches!(decode(json), Err(DecodeError::Side(_))));
    }

    #[test]
    fn rejects_out_of_range_price() {
        let json = r#"{"event_type":"book","asset_id":"1","timestamp":"1706000000000","bids":[{"price":"1.5","size":"10"}],"asks":[]}"#;
        assert!(matches!(decode(json), Err(DecodeError::PriceOutOfRange(_))));
    }

    #[test]
    fn rejects_negative_size() {
        let json = r#"{"event_type":"book","asset_id":"1","timestamp":"1706000000000","bids":[{"price":"0.5","size":"-10"}],"asks":[]}"#;
        assert!(matches!(decode(json), Err(DecodeError::NegativeSize(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode("{not json"), Err(DecodeError::Json(_))));
    }
}
