//! Parquet dataset store.
//!
//! Layout:
//! - `{data_dir}/{SYMBOL}.parquet`: one price-bar dataset per symbol, columns
//!   `Datetime, Close, High, Low, Open, Volume, Ticker`
//! - `{earnings_file}`: the shared earnings dataset, columns
//!   `Ticker, Earnings_Date`
//!
//! Writes are atomic: the dataset is written to `.tmp`, synced, then renamed
//! over the previous file, so a failed write leaves the prior file intact.
//! Datetimes are stored as UTC milliseconds.

use crate::domain::{EarningsEvent, PriceBar};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DATASET_EXTENSION: &str = "parquet";

/// Column order of a per-symbol dataset file.
pub const BAR_COLUMNS: [&str; 7] = ["Datetime", "Close", "High", "Low", "Open", "Volume", "Ticker"];

/// Column order of the earnings dataset file.
pub const EARNINGS_COLUMNS: [&str; 2] = ["Ticker", "Earnings_Date"];

/// Errors from reading or writing datasets.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("dataset {path} is missing column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("refusing to write an empty dataset for '{key}'")]
    EmptyDataset { key: String },
}

/// Row count and time span of a persisted symbol dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStatus {
    pub symbol: String,
    pub rows: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// The on-disk dataset store.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    data_dir: PathBuf,
    earnings_file: PathBuf,
}

impl ParquetStore {
    pub fn new(data_dir: impl Into<PathBuf>, earnings_file: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            earnings_file: earnings_file.into(),
        }
    }

    /// Directory holding per-symbol datasets.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the shared earnings dataset.
    pub fn earnings_file(&self) -> &Path {
        &self.earnings_file
    }

    /// Path of a symbol's dataset: `{data_dir}/{SYMBOL}.parquet`
    pub fn dataset_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.{DATASET_EXTENSION}"))
    }

    /// Load a symbol's bars. `Ok(None)` when the symbol has never been stored.
    pub fn load_bars(&self, symbol: &str) -> Result<Option<Vec<PriceBar>>, StoreError> {
        let path = self.dataset_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let df = read_parquet(&path)?;
        require_columns(&df, &path, &BAR_COLUMNS)?;
        dataframe_to_bars(&df).map(Some)
    }

    /// Replace a symbol's dataset with `bars`.
    ///
    /// An empty slice is rejected so a fetch with no rows can never erase
    /// history.
    pub fn store_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<(), StoreError> {
        if bars.is_empty() {
            return Err(StoreError::EmptyDataset {
                key: symbol.to_string(),
            });
        }
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

        let mut df = bars_to_dataframe(bars)?;
        write_atomic(&mut df, &self.dataset_path(symbol))
    }

    /// Load the shared earnings dataset. `Ok(None)` when it does not exist yet.
    pub fn load_earnings(&self) -> Result<Option<Vec<EarningsEvent>>, StoreError> {
        if !self.earnings_file.exists() {
            return Ok(None);
        }
        let df = read_parquet(&self.earnings_file)?;
        require_columns(&df, &self.earnings_file, &EARNINGS_COLUMNS)?;
        dataframe_to_earnings(&df).map(Some)
    }

    /// Replace the shared earnings dataset with `events`.
    pub fn store_earnings(&self, events: &[EarningsEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyDataset {
                key: self.earnings_file.display().to_string(),
            });
        }
        if let Some(parent) = self.earnings_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;
        }

        let mut df = earnings_to_dataframe(events)?;
        write_atomic(&mut df, &self.earnings_file)
    }

    /// Symbols that have a persisted dataset, sorted by name.
    pub fn list_symbols(&self) -> Result<Vec<String>, StoreError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.data_dir)
            .map_err(|e| StoreError::Io(format!("read dir: {e}")))?;

        // `read_dir` paths are spelled from `data_dir`, so `./x` and `x`
        // must compare as the same file.
        let earnings_file = fs::canonicalize(&self.earnings_file).ok();

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
            let path = entry.path();

            // Skip temp files and foreign files
            if path.extension().and_then(|e| e.to_str()) != Some(DATASET_EXTENSION) {
                continue;
            }
            let is_earnings = match (&earnings_file, fs::canonicalize(&path)) {
                (Some(earnings), Ok(candidate)) => *earnings == candidate,
                _ => path == self.earnings_file,
            };
            if is_earnings {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    /// Row count and time span of a symbol's dataset, `None` if not stored.
    pub fn status(&self, symbol: &str) -> Result<Option<DatasetStatus>, StoreError> {
        Ok(self.load_bars(symbol)?.map(|bars| DatasetStatus {
            symbol: symbol.to_string(),
            rows: bars.len(),
            first: bars.first().map(|b| b.timestamp),
            last: bars.last().map(|b| b.timestamp),
        }))
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn datetime_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Convert bars to a DataFrame in on-disk column order.
fn bars_to_dataframe(bars: &[PriceBar]) -> Result<DataFrame, StoreError> {
    let datetimes: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let tickers: Vec<&str> = bars.iter().map(|b| b.symbol.as_str()).collect();

    DataFrame::new(vec![
        Column::new("Datetime".into(), datetimes)
            .cast(&datetime_dtype())
            .map_err(|e| StoreError::Parquet(format!("datetime cast: {e}")))?,
        Column::new("Close".into(), closes),
        Column::new("High".into(), highs),
        Column::new("Low".into(), lows),
        Column::new("Open".into(), opens),
        Column::new("Volume".into(), volumes),
        Column::new("Ticker".into(), tickers),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn earnings_to_dataframe(events: &[EarningsEvent]) -> Result<DataFrame, StoreError> {
    let tickers: Vec<&str> = events.iter().map(|e| e.symbol.as_str()).collect();
    let dates: Vec<i64> = events
        .iter()
        .map(|e| e.earnings_date.timestamp_millis())
        .collect();

    DataFrame::new(vec![
        Column::new("Ticker".into(), tickers),
        Column::new("Earnings_Date".into(), dates)
            .cast(&datetime_dtype())
            .map_err(|e| StoreError::Parquet(format!("datetime cast: {e}")))?,
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

/// Write to `{path}.tmp`, sync, and rename over `path`.
fn write_atomic(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let tmp_path = path.with_extension(format!("{DATASET_EXTENSION}.tmp"));

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", tmp_path.display())))?;
        ParquetWriter::new(&mut file)
            .finish(df)
            .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;
        file.sync_all()
            .map_err(|e| StoreError::Io(format!("sync {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| StoreError::Io(format!("atomic rename failed: {e}")))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path)
        .map_err(|e| StoreError::Io(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read {}: {e}", path.display())))
}

fn require_columns(df: &DataFrame, path: &Path, columns: &[&str]) -> Result<(), StoreError> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(StoreError::MissingColumn {
                path: path.display().to_string(),
                column: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Read a column cast to `dtype`.
fn column_as(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column, StoreError> {
    df.column(name)
        .and_then(|c| c.cast(dtype))
        .map_err(|e| StoreError::Parquet(format!("column '{name}': {e}")))
}

/// Epoch values of a datetime column converted to UTC instants.
fn datetime_values(df: &DataFrame, name: &str) -> Result<Vec<Option<DateTime<Utc>>>, StoreError> {
    let column = df
        .column(name)
        .map_err(|e| StoreError::Parquet(format!("column '{name}': {e}")))?;
    let unit = match column.dtype() {
        DataType::Datetime(unit, _) => *unit,
        other => {
            return Err(StoreError::Parquet(format!(
                "{name} column type: expected datetime, got {other}"
            )))
        }
    };
    let epochs = column_as(df, name, &DataType::Int64)?;
    let ca = epochs
        .i64()
        .map_err(|e| StoreError::Parquet(format!("{name} column type: {e}")))?;

    Ok(ca
        .into_iter()
        .map(|v| {
            v.and_then(|v| match unit {
                TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(v),
                TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(v),
                TimeUnit::Nanoseconds => Some(DateTime::<Utc>::from_timestamp_nanos(v)),
            })
        })
        .collect())
}

/// Convert a dataset DataFrame back to bars.
fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<PriceBar>, StoreError> {
    let datetimes = datetime_values(df, "Datetime")?;
    let closes = column_as(df, "Close", &DataType::Float64)?;
    let highs = column_as(df, "High", &DataType::Float64)?;
    let lows = column_as(df, "Low", &DataType::Float64)?;
    let opens = column_as(df, "Open", &DataType::Float64)?;
    let volumes = column_as(df, "Volume", &DataType::UInt64)?;
    let tickers = column_as(df, "Ticker", &DataType::String)?;

    let type_err = |e: PolarsError| StoreError::Parquet(format!("column type: {e}"));
    let close_ca = closes.f64().map_err(type_err)?;
    let high_ca = highs.f64().map_err(type_err)?;
    let low_ca = lows.f64().map_err(type_err)?;
    let open_ca = opens.f64().map_err(type_err)?;
    let vol_ca = volumes.u64().map_err(type_err)?;
    let ticker_ca = tickers.str().map_err(type_err)?;

    let mut bars = Vec::with_capacity(df.height());
    for (i, timestamp) in datetimes.into_iter().enumerate() {
        let timestamp =
            timestamp.ok_or_else(|| StoreError::Parquet(format!("null Datetime at row {i}")))?;
        let symbol = ticker_ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null Ticker at row {i}")))?;

        bars.push(PriceBar {
            symbol: symbol.to_string(),
            timestamp,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}

fn dataframe_to_earnings(df: &DataFrame) -> Result<Vec<EarningsEvent>, StoreError> {
    let dates = datetime_values(df, "Earnings_Date")?;
    let tickers = column_as(df, "Ticker", &DataType::String)?;
    let ticker_ca = tickers
        .str()
        .map_err(|e| StoreError::Parquet(format!("Ticker column type: {e}")))?;

    let mut events = Vec::with_capacity(df.height());
    for (i, date) in dates.into_iter().enumerate() {
        // Rows without a date carry no information; skip them
        let (Some(date), Some(symbol)) = (date, ticker_ca.get(i)) else {
            continue;
        };
        events.push(EarningsEvent::new(symbol, date));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store(dir: &Path) -> ParquetStore {
        ParquetStore::new(dir.join("stock_data"), dir.join("earnings_dates.parquet"))
    }

    fn sample_bars() -> Vec<PriceBar> {
        vec![
            PriceBar {
                symbol: "SPY".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 1000,
            },
            PriceBar {
                symbol: "SPY".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 31, 0).unwrap(),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                volume: 1100,
            },
        ]
    }

    #[test]
    fn store_and_load_bars() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.store_bars("SPY", &sample_bars()).unwrap();
        let loaded = store.load_bars("SPY").unwrap().unwrap();

        assert_eq!(loaded, sample_bars());
        assert!(store.dataset_path("SPY").ends_with("stock_data/SPY.parquet"));
    }

    #[test]
    fn dataset_has_exact_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.store_bars("SPY", &sample_bars()).unwrap();

        let df = read_parquet(&store.dataset_path("SPY")).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, BAR_COLUMNS.map(String::from).to_vec());
    }

    #[test]
    fn never_stored_symbol_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).load_bars("NONEXISTENT").unwrap().is_none());
    }

    #[test]
    fn empty_write_rejected_and_history_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.store_bars("SPY", &sample_bars()).unwrap();

        let err = store.store_bars("SPY", &[]).unwrap_err();
        assert!(matches!(err, StoreError::EmptyDataset { .. }));
        assert_eq!(store.load_bars("SPY").unwrap().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_file_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::create_dir_all(store.data_dir()).unwrap();
        fs::write(store.dataset_path("BAD"), b"not parquet").unwrap();

        assert!(store.load_bars("BAD").is_err());
    }

    #[test]
    fn earnings_roundtrip_and_listing_ignores_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), dir.path().join("earnings_dates.parquet"));
        let events = vec![EarningsEvent::new(
            "AAPL",
            Utc.with_ymd_and_hms(2025, 7, 31, 20, 0, 0).unwrap(),
        )];

        assert!(store.load_earnings().unwrap().is_none());
        store.store_earnings(&events).unwrap();
        store.store_bars("SPY", &sample_bars()).unwrap();

        assert_eq!(store.load_earnings().unwrap().unwrap(), events);
        assert_eq!(store.list_symbols().unwrap(), vec!["SPY".to_string()]);
    }

    #[test]
    fn listing_ignores_earnings_file_spelled_differently() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bars")).unwrap();
        // `bars/..` is the temp dir itself, so the listing sees
        // `bars/../earnings_dates.parquet`
        let store = ParquetStore::new(
            dir.path().join("bars").join(".."),
            dir.path().join("earnings_dates.parquet"),
        );
        store
            .store_earnings(&[EarningsEvent::new(
                "AAPL",
                Utc.with_ymd_and_hms(2025, 7, 31, 20, 0, 0).unwrap(),
            )])
            .unwrap();
        store.store_bars("AAA", &sample_bars()).unwrap();

        assert_eq!(store.list_symbols().unwrap(), vec!["AAA".to_string()]);
    }

    #[test]
    fn status_reports_span() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.store_bars("SPY", &sample_bars()).unwrap();

        let status = store.status("SPY").unwrap().unwrap();
        assert_eq!(status.rows, 2);
        assert_eq!(status.first, Some(sample_bars()[0].timestamp));
        assert_eq!(status.last, Some(sample_bars()[1].timestamp));
        assert!(store.status("QQQ").unwrap().is_none());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.store_bars("SPY", &sample_bars()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.data_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
