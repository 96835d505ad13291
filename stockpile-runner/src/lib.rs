//! Stockpile Runner: batch ingestion over a symbol universe.
//!
//! This crate builds on `stockpile-core` to provide:
//! - TOML run configuration (paths, universe, interval, pacing, provider)
//! - Per-symbol fetch → merge → persist with failure isolation
//! - Sequential batch runner with pacing and a once-per-run earnings merge
//! - Run summary line appended to the download log
//! - Random-symbol sample excerpt for operators

pub mod batch;
pub mod config;
pub mod ingestor;
pub mod outcome;
pub mod sample;
pub mod summary;

pub use batch::{BatchProgress, BatchRunner, LogProgress, RunPlan};
pub use config::{ConfigError, IngestConfig, ProviderConfig, SampleConfig};
pub use ingestor::SymbolIngestor;
pub use outcome::{
    BatchSummary, EarningsUpdate, FailureKind, IngestOutcome, IngestStatus, SymbolReport,
};
pub use sample::{render_sample, write_sample, SampleError};
pub use summary::{log_run_totals, summary_line, RunSummaryLog};
