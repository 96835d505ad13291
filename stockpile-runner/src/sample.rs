//! Human-readable excerpt of one randomly chosen dataset.
//!
//! Written after each run so an operator can eyeball fresh data without
//! opening Parquet files: the first few and the last several trading days of
//! a random symbol, as an aligned text table.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use stockpile_core::data::{ParquetStore, StoreError};
use stockpile_core::domain::PriceBar;

use crate::config::SampleConfig;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write sample file: {0}")]
    Io(#[from] std::io::Error),
}

const HEADERS: [&str; 7] = ["Datetime", "Close", "High", "Low", "Open", "Volume", "Ticker"];

/// Pick a random stored symbol and write its excerpt to `path`.
///
/// Returns the chosen symbol, or `None` when there is nothing to sample.
pub fn write_sample<R: Rng + ?Sized>(
    store: &ParquetStore,
    path: &Path,
    config: &SampleConfig,
    rng: &mut R,
    generated_at: DateTime<Utc>,
) -> Result<Option<String>, SampleError> {
    let symbols = store.list_symbols()?;
    let Some(symbol) = symbols.choose(rng) else {
        return Ok(None);
    };
    let Some(bars) = store.load_bars(symbol)? else {
        return Ok(None);
    };
    if bars.is_empty() {
        return Ok(None);
    }

    let text = render_sample(symbol, &bars, config, generated_at);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    Ok(Some(symbol.clone()))
}

/// Render the excerpt text for an already-loaded dataset.
pub fn render_sample(
    symbol: &str,
    bars: &[PriceBar],
    config: &SampleConfig,
    generated_at: DateTime<Utc>,
) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Sample data for {symbol}");
    let _ = writeln!(out, "Generated at: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Total records: {}", bars.len());
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    let days: BTreeSet<NaiveDate> = bars.iter().map(trading_day).collect();
    let days: Vec<NaiveDate> = days.into_iter().collect();
    let head_days = &days[..config.head_days.min(days.len())];
    let tail_days = &days[days.len() - config.tail_days.min(days.len())..];

    let _ = writeln!(out, "First {} trading day(s):", head_days.len());
    out.push_str(&render_table(bars.iter().filter(|b| head_days.contains(&trading_day(b)))));
    let _ = writeln!(out);

    let _ = writeln!(out, "Last {} trading day(s):", tail_days.len());
    out.push_str(&render_table(bars.iter().filter(|b| tail_days.contains(&trading_day(b)))));
    let _ = writeln!(out);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Date range: {} to {}",
        days.first().map(NaiveDate::to_string).unwrap_or_default(),
        days.last().map(NaiveDate::to_string).unwrap_or_default()
    );
    let _ = writeln!(out, "{rule}");
    out
}

fn trading_day(bar: &PriceBar) -> NaiveDate {
    bar.timestamp.date_naive()
}

fn render_table<'a>(bars: impl Iterator<Item = &'a PriceBar>) -> String {
    let rows: Vec<[String; 7]> = bars
        .map(|b| {
            [
                b.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{:.4}", b.close),
                format!("{:.4}", b.high),
                format!("{:.4}", b.low),
                format!("{:.4}", b.open),
                b.volume.to_string(),
                b.symbol.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:>w$}"))
        .collect();
    let _ = writeln!(out, "{}", header.join("  "));
    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:>w$}"))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  "));
    }
    out
}
