use std::collections::HashMap;
use std::fs::{self, File};
use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::error::StoreError;
use crate::rows::{BookRow, RecordKind, TradeRow};
use crate::schema;

/// Buffers normalized rows per (asset, record kind) and writes each full
/// batch to its own zstd-compressed parquet file.
///
/// File names are `<kind>-<seq>-<asset-lowercase>.parquet` where `seq` is a
/// per-(asset, kind) counter starting at 1 that never resets while the store
/// lives; a name already present in the directory is skipped, never
/// replaced. A flush covers one batch only; other keys keep buffering.
///
/// Each capture loop owns a private store and must call [`close`] on its way
/// out — that is the only thing that flushes a partial batch, there is no
/// flush-on-drop.
///
/// [`close`]: BufferedColumnStore::close
pub struct BufferedColumnStore {
    out_dir: PathBuf,
    depth: usize,
    flush_rows: usize,
    book_batches: HashMap<String, Vec<BookRow>>,
    trade_batches: HashMap<String, Vec<TradeRow>>,
    sequences: HashMap<(String, RecordKind), u64>,
}

impl BufferedColumnStore {
    pub fn new(out_dir: impl Into<PathBuf>, depth: usize, flush_rows: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            depth,
            flush_rows,
            book_batches: HashMap::new(),
            trade_batches: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Book depth the store was configured with; callers truncate
    /// `top_levels` to this.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Buffer one orderbook row. Returns the file path when this write
    /// filled the asset's batch and triggered a flush.
    pub fn write_book(&mut self, row: BookRow) -> Result<Option<PathBuf>, StoreError> {
        let asset = row.asset_name.clone();
        let batch = self.book_batches.entry(asset.clone()).or_default();
        batch.push(row);
        if batch.len() >= self.flush_rows {
            return self.flush_book(&asset).map(Some);
        }
        Ok(None)
    }

    /// Buffer one trade row, flushing on the same threshold as `write_book`.
    pub fn write_trade(&mut self, row: TradeRow) -> Result<Option<PathBuf>, StoreError> {
        let asset = row.asset_name.clone();
        let batch = self.trade_batches.entry(asset.clone()).or_default();
        batch.push(row);
        if batch.len() >= self.flush_rows {
            return self.flush_trade(&asset).map(Some);
        }
        Ok(None)
    }

    /// Flush every non-empty batch across all keys. Idempotent: a second
    /// call finds nothing buffered and writes nothing.
    pub fn close(&mut self) -> Result<Vec<PathBuf>, StoreError> {
        let mut written = Vec::new();
        let mut assets: Vec<String> = self
            .book_batches
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(asset, _)| asset.clone())
            .collect();
        assets.sort();
        for asset in assets {
            written.push(self.flush_book(&asset)?);
        }

        let mut assets: Vec<String> = self
            .trade_batches
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(asset, _)| asset.clone())
            .collect();
        assets.sort();
        for asset in assets {
            written.push(self.flush_trade(&asset)?);
        }
        Ok(written)
    }

    fn flush_book(&mut self, asset: &str) -> Result<PathBuf, StoreError> {
        let rows = self.book_batches.remove(asset).unwrap_or_default();
        let batch = schema::book_batch(self.depth, &rows)?;
        self.write_file(asset, RecordKind::Orderbook, &batch)
    }

    fn flush_trade(&mut self, asset: &str) -> Result<PathBuf, StoreError> {
        let rows = self.trade_batches.remove(asset).unwrap_or_default();
        let batch = schema::trade_batch(&rows)?;
        self.write_file(asset, RecordKind::Trade, &batch)
    }

    fn write_file(
        &mut self,
        asset: &str,
        kind: RecordKind,
        batch: &RecordBatch,
    ) -> Result<PathBuf, StoreError> {
        let seq = self
            .sequences
            .entry((asset.to_string(), kind))
            .or_insert(0);
        *seq += 1;
        // A fresh store over a directory holding a prior run's output starts
        // its sequences at 1 again; advance past any file already there so an
        // earlier run's rows are never replaced.
        let mut filename = format!("{}-{}-{}.parquet", kind.as_str(), seq, asset.to_lowercase());
        while self.out_dir.join(&filename).exists() {
            *seq += 1;
            filename = format!("{}-{}-{}.parquet", kind.as_str(), seq, asset.to_lowercase());
        }
        let tmp_path = self.out_dir.join(format!("{filename}.tmp"));
        let final_path = self.out_dir.join(&filename);

        let file = File::create(&tmp_path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .set_created_by("bookcap".to_string())
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        // Atomic rename so readers never observe a half-written file.
        fs::rename(&tmp_path, &final_path)?;

        info!(
            asset = %asset,
            kind = %kind,
            rows = batch.num_rows(),
            file = %filename,
            "flushed batch"
        );
        Ok(final_path)
    }
}
