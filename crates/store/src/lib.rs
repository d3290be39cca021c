//! bookcap-store: buffered columnar persistence for market-data capture.
//!
//! Normalized rows are buffered in memory per (asset, record kind) and
//! flushed to zstd-compressed parquet files once a row-count threshold is
//! reached, with a guaranteed final flush when the store is closed.

pub mod column_store;
pub mod error;
pub mod rows;
pub mod schema;

pub use column_store::BufferedColumnStore;
pub use error::StoreError;
pub use rows::{BookRow, RecordKind, TradeRow};
