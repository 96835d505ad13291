//! Single-symbol ingestion: fetch, merge into the stored dataset, persist.

use tracing::{debug, warn};

use stockpile_core::data::{DataError, DatasetMerger, MarketDataProvider, ParquetStore};
use stockpile_core::domain::{BarInterval, EarningsEvent, FetchWindow};

use crate::outcome::{FailureKind, IngestOutcome, SymbolReport};

/// Runs the fetch-merge-persist cycle for one symbol at a time.
///
/// Never panics and never returns an error: every failure becomes an
/// [`IngestOutcome`] so the batch can carry on.
pub struct SymbolIngestor<'a> {
    provider: &'a dyn MarketDataProvider,
    store: &'a ParquetStore,
}

impl<'a> SymbolIngestor<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, store: &'a ParquetStore) -> Self {
        Self { provider, store }
    }

    /// Ingest price bars, then fetch earnings dates independently.
    pub fn ingest(&self, symbol: &str, window: &FetchWindow, interval: BarInterval) -> SymbolReport {
        let outcome = match self.ingest_bars(symbol, window, interval) {
            Ok((rows, written)) => IngestOutcome::success(symbol, rows, written),
            Err(kind) => IngestOutcome::failure(symbol, kind),
        };
        let earnings = self.fetch_earnings(symbol);
        SymbolReport { outcome, earnings }
    }

    /// Returns the stored row count and whether the file was rewritten.
    fn ingest_bars(
        &self,
        symbol: &str,
        window: &FetchWindow,
        interval: BarInterval,
    ) -> Result<(usize, bool), FailureKind> {
        let incoming = self
            .provider
            .fetch_bars(symbol, window, interval)
            .map_err(classify)?;
        if incoming.is_empty() {
            return Err(FailureKind::NoData);
        }
        let fetched = incoming.len();
        let gaps = incoming.iter().filter(|b| b.has_missing_prices()).count();
        if gaps > 0 {
            warn!(symbol, gaps, "bars with missing prices kept as fetched");
        }

        // An unreadable dataset is reported, not replaced.
        let existing = self
            .store
            .load_bars(symbol)
            .map_err(|e| FailureKind::Persistence(e.to_string()))?;
        let existing_len = existing.as_ref().map(Vec::len);

        let (merged, counts) = DatasetMerger::merge_counted(existing, incoming);
        debug!(
            symbol,
            fetched,
            added = counts.added,
            revised = counts.revised,
            total = counts.total,
            "merged"
        );

        if existing_len == Some(counts.total) && counts.added == 0 && counts.revised == 0 {
            return Ok((counts.total, false));
        }

        self.store
            .store_bars(symbol, &merged)
            .map_err(|e| FailureKind::Persistence(e.to_string()))?;
        Ok((merged.len(), true))
    }

    /// Earnings failures never affect the symbol's outcome.
    fn fetch_earnings(&self, symbol: &str) -> Vec<EarningsEvent> {
        match self.provider.fetch_earnings(symbol) {
            Ok(events) => events,
            Err(e) if e.is_no_data() => Vec::new(),
            Err(e) => {
                warn!(symbol, error = %e, "earnings fetch failed");
                Vec::new()
            }
        }
    }
}

fn classify(err: DataError) -> FailureKind {
    if err.is_no_data() {
        FailureKind::NoData
    } else {
        FailureKind::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_error_classified_as_no_data() {
        let err = DataError::NoData {
            symbol: "ZZZZ".into(),
        };
        assert_eq!(classify(err), FailureKind::NoData);
    }

    #[test]
    fn other_errors_keep_their_reason() {
        let kind = classify(DataError::NetworkUnreachable("connection reset".into()));
        match kind {
            FailureKind::Provider(reason) => assert!(reason.contains("connection reset")),
            other => panic!("expected provider failure, got {other:?}"),
        }
    }
}
