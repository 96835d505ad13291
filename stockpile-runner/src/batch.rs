//! Batch orchestration over a whole universe.
//!
//! Symbols run strictly in order, one at a time, with a blocking pause after
//! each. Earnings dates collected along the way are merged into the shared
//! earnings dataset once, after the loop.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use stockpile_core::data::{EarningsMerger, MarketDataProvider, ParquetStore};
use stockpile_core::domain::{BarInterval, EarningsEvent, FetchWindow};

use crate::ingestor::SymbolIngestor;
use crate::outcome::{BatchSummary, EarningsUpdate, FailureKind, IngestOutcome, IngestStatus};

/// What one run processes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub symbols: Vec<String>,
    pub window: FetchWindow,
    pub interval: BarInterval,
    /// Blocking wait after every symbol, including the last.
    pub pacing_delay: Duration,
}

/// Progress callbacks for a batch run.
pub trait BatchProgress {
    fn on_batch_start(&self, plan: &RunPlan);

    /// `index` is zero-based.
    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize);

    fn on_symbol_complete(&self, outcome: &IngestOutcome, index: usize, total: usize);

    fn on_batch_complete(&self, summary: &BatchSummary);
}

/// Default progress reporter: structured `tracing` events.
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn on_batch_start(&self, plan: &RunPlan) {
        info!("Downloading {} data for {}", plan.interval, plan.window);
        info!(
            "Processing {} tickers, up to {} bars per session each",
            plan.symbols.len(),
            plan.interval.bars_per_session()
        );
    }

    fn on_symbol_start(&self, symbol: &str, index: usize, total: usize) {
        info!("[{}/{}] Processing {symbol}...", index + 1, total);
    }

    fn on_symbol_complete(&self, outcome: &IngestOutcome, _index: usize, _total: usize) {
        let symbol = &outcome.symbol;
        match &outcome.status {
            IngestStatus::Success { rows, written: true } => {
                info!("{symbol}: {rows} records saved");
            }
            IngestStatus::Success { rows, written: false } => {
                info!("{symbol}: {rows} records, already up to date");
            }
            IngestStatus::Failure(FailureKind::NoData) => {
                warn!("{symbol}: no data available");
            }
            IngestStatus::Failure(kind) => {
                error!("{symbol}: {kind}");
            }
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        info!("{}", "=".repeat(50));
        info!("Download complete");
        info!("Successful: {}", summary.successful);
        info!("Failed: {}", summary.failed);
        if !summary.failed_symbols.is_empty() {
            info!("Failed tickers: {}", summary.failed_symbols.join(", "));
        }
        match &summary.earnings {
            EarningsUpdate::Skipped => info!("Earnings: no new dates"),
            EarningsUpdate::Written { rows } => info!("Earnings: {rows} dates stored"),
            EarningsUpdate::Failed(reason) => error!("Earnings: not saved ({reason})"),
        }
    }
}

/// Drives a [`SymbolIngestor`] across every symbol of a [`RunPlan`].
pub struct BatchRunner<'a> {
    provider: &'a dyn MarketDataProvider,
    store: &'a ParquetStore,
    plan: RunPlan,
    progress: &'a dyn BatchProgress,
}

impl<'a> BatchRunner<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, store: &'a ParquetStore, plan: RunPlan) -> Self {
        Self {
            provider,
            store,
            plan,
            progress: &LogProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn BatchProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Process every symbol, then update the earnings dataset.
    ///
    /// Never fails: per-symbol and earnings failures are folded into the
    /// returned summary.
    pub fn run(&self) -> BatchSummary {
        let plan = &self.plan;
        let total = plan.symbols.len();
        let ingestor = SymbolIngestor::new(self.provider, self.store);

        self.progress.on_batch_start(plan);

        let mut outcomes = Vec::with_capacity(total);
        let mut failed_symbols = Vec::new();
        let mut earnings: Vec<EarningsEvent> = Vec::new();
        let mut blocked_reported = false;

        for (i, symbol) in plan.symbols.iter().enumerate() {
            self.progress.on_symbol_start(symbol, i, total);

            let report = ingestor.ingest(symbol, &plan.window, plan.interval);
            self.progress.on_symbol_complete(&report.outcome, i, total);

            if !report.outcome.is_success() {
                failed_symbols.push(symbol.clone());
            }
            earnings.extend(report.earnings);
            outcomes.push(report.outcome);

            let remaining = total - i - 1;
            if !blocked_reported && remaining > 0 && !self.provider.is_available() {
                warn!(
                    provider = self.provider.name(),
                    remaining, "provider unavailable; remaining symbols will fail fast"
                );
                blocked_reported = true;
            }

            if !plan.pacing_delay.is_zero() {
                thread::sleep(plan.pacing_delay);
            }
        }

        let earnings = self.persist_earnings(earnings);

        let summary = BatchSummary {
            total,
            successful: total - failed_symbols.len(),
            failed: failed_symbols.len(),
            failed_symbols,
            earnings,
            outcomes,
        };
        self.progress.on_batch_complete(&summary);
        summary
    }

    fn persist_earnings(&self, collected: Vec<EarningsEvent>) -> EarningsUpdate {
        if collected.is_empty() {
            return EarningsUpdate::Skipped;
        }

        let existing = match self.store.load_earnings() {
            Ok(existing) => existing,
            Err(e) => {
                error!(error = %e, "cannot read earnings dataset; leaving it unchanged");
                return EarningsUpdate::Failed(e.to_string());
            }
        };

        let merged = EarningsMerger::merge(existing, collected);
        match self.store.store_earnings(&merged) {
            Ok(()) => EarningsUpdate::Written { rows: merged.len() },
            Err(e) => {
                error!(error = %e, "failed to write earnings dataset");
                EarningsUpdate::Failed(e.to_string())
            }
        }
    }
}
