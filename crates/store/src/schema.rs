//! Arrow schemas and batch construction for the two record kinds.

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::rows::{BookRow, RecordKind, TradeRow};

fn ts_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from("UTC")))
}

/// Orderbook file schema: timestamps and asset identity, then `depth`
/// (price, size) column pairs per side. Level columns are nullable so a book
/// thinner than `depth` leaves the tail columns null.
pub fn book_schema(depth: usize) -> Schema {
    let mut fields = vec![
        Field::new("timestamp", ts_type(), false),
        Field::new("exchange_timestamp", ts_type(), true),
        Field::new("asset_id", DataType::Utf8, false),
        Field::new("asset_name", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
    ];
    for i in 1..=depth {
        fields.push(Field::new(format!("bid_{i}_price"), DataType::Float64, true));
        fields.push(Field::new(format!("bid_{i}_size"), DataType::Float64, true));
    }
    for i in 1..=depth {
        fields.push(Field::new(format!("ask_{i}_price"), DataType::Float64, true));
        fields.push(Field::new(format!("ask_{i}_size"), DataType::Float64, true));
    }
    Schema::new(fields)
}

pub fn trade_schema() -> Schema {
    Schema::new(vec![
        Field::new("timestamp", ts_type(), false),
        Field::new("exchange_timestamp", ts_type(), true),
        Field::new("asset_id", DataType::Utf8, false),
        Field::new("asset_name", DataType::Utf8, false),
        Field::new("side", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
        Field::new("size", DataType::Float64, false),
    ])
}

pub fn book_batch(depth: usize, rows: &[BookRow]) -> Result<RecordBatch, ArrowError> {
    let mut captured_at = TimestampMicrosecondBuilder::new();
    let mut venue_ts = TimestampMicrosecondBuilder::new();
    let mut asset_id = StringBuilder::new();
    let mut asset_name = StringBuilder::new();
    let mut kind = StringBuilder::new();
    let mut bid_prices: Vec<Float64Builder> = (0..depth).map(|_| Float64Builder::new()).collect();
    let mut bid_sizes: Vec<Float64Builder> = (0..depth).map(|_| Float64Builder::new()).collect();
    let mut ask_prices: Vec<Float64Builder> = (0..depth).map(|_| Float64Builder::new()).collect();
    let mut ask_sizes: Vec<Float64Builder> = (0..depth).map(|_| Float64Builder::new()).collect();

    for row in rows {
        captured_at.append_value(row.captured_at.timestamp_micros());
        match row.venue_ts {
            Some(ts) => venue_ts.append_value(ts.timestamp_micros()),
            None => venue_ts.append_null(),
        }
        asset_id.append_value(&row.asset_id);
        asset_name.append_value(&row.asset_name);
        kind.append_value(RecordKind::Orderbook.as_str());
        for i in 0..depth {
            let level = row.bids.get(i);
            bid_prices[i].append_option(level.map(|l| l.0));
            bid_sizes[i].append_option(level.map(|l| l.1));
        }
        for i in 0..depth {
            let level = row.asks.get(i);
            ask_prices[i].append_option(level.map(|l| l.0));
            ask_sizes[i].append_option(level.map(|l| l.1));
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(captured_at.finish().with_timezone("UTC")),
        Arc::new(venue_ts.finish().with_timezone("UTC")),
        Arc::new(asset_id.finish()),
        Arc::new(asset_name.finish()),
        Arc::new(kind.finish()),
    ];
    for (mut price, mut size) in bid_prices.into_iter().zip(bid_sizes) {
        columns.push(Arc::new(price.finish()));
        columns.push(Arc::new(size.finish()));
    }
    for (mut price, mut size) in ask_prices.into_iter().zip(ask_sizes) {
        columns.push(Arc::new(price.finish()));
        columns.push(Arc::new(size.finish()));
    }

    RecordBatch::try_new(Arc::new(book_schema(depth)), columns)
}

pub fn trade_batch(rows: &[TradeRow]) -> Result<RecordBatch, ArrowError> {
    let mut captured_at = TimestampMicrosecondBuilder::new();
    let mut venue_ts = TimestampMicrosecondBuilder::new();
    let mut asset_id = StringBuilder::new();
    let mut asset_name = StringBuilder::new();
    let mut side = StringBuilder::new();
    let mut price = Float64Builder::new();
    let mut size = Float64Builder::new();

    for row in rows {
        captured_at.append_value(row.captured_at.timestamp_micros());
        match row.venue_ts {
            Some(ts) => venue_ts.append_value(ts.timestamp_micros()),
            None => venue_ts.append_null(),
        }
        asset_id.append_value(&row.asset_id);
        asset_name.append_value(&row.asset_name);
        side.append_value(&row.side);
        price.append_value(row.price);
        size.append_value(row.size);
    }

    RecordBatch::try_new(
        Arc::new(trade_schema()),
        vec![
            Arc::new(captured_at.finish().with_timezone("UTC")),
            Arc::new(venue_ts.finish().with_timezone("UTC")),
            Arc::new(asset_id.finish()),
            Arc::new(asset_name.finish()),
            Arc::new(side.finish()),
            Arc::new(price.finish()),
            Arc::new(size.finish()),
        ],
    )
}
