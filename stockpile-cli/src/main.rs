//! Stockpile CLI: daily intraday ingestion and dataset inspection.
//!
//! Commands:
//! - `run` (default): fetch the window for every symbol, merge into the
//!   per-symbol datasets, update earnings, append the run summary
//! - `sample`: write the text excerpt of a random stored dataset
//! - `status`: list stored datasets with row counts and time spans

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockpile_core::data::{MarketDataProvider, ParquetStore, YahooProvider};
use stockpile_runner::{
    log_run_totals, write_sample, BatchRunner, IngestConfig, RunSummaryLog,
};

const DEFAULT_CONFIG: &str = "stockpile.toml";

#[derive(Parser)]
#[command(
    name = "stockpile",
    about = "Stockpile: incremental intraday price and earnings ingestion"
)]
struct Cli {
    /// Path to the TOML config. Defaults to ./stockpile.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the configured universe (the default).
    Run,
    /// Write the sample excerpt of a random stored dataset.
    Sample,
    /// Report stored datasets: rows and first/last timestamp.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_logging(&config)?;
            run_ingest(&config)
        }
        Commands::Sample => {
            init_logging(&config)?;
            run_sample(&config);
            Ok(())
        }
        Commands::Status => run_status(&config.store()),
    }
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    match path {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => IngestConfig::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("loading config {DEFAULT_CONFIG}")),
        None => Ok(IngestConfig::default()),
    }
}

/// Stdout plus a plain-text copy appended to the configured log file.
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &IngestConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log_level {:?}", config.log_level))?,
    };

    if let Some(parent) = config.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

fn run_ingest(config: &IngestConfig) -> Result<()> {
    let started = Instant::now();
    let plan = config.run_plan(Local::now().date_naive())?;

    let circuit_breaker = config.provider.circuit_breaker();
    let provider = YahooProvider::new(circuit_breaker, config.provider.yahoo_settings())?;
    let store = config.store();
    info!("Provider: {}, data dir: {}", provider.name(), store.data_dir().display());

    let summary = BatchRunner::new(&provider, &store, plan).run();

    let summary_log = RunSummaryLog::new(&config.log_file);
    if let Err(e) = summary_log.append(&summary, Local::now().naive_local()) {
        error!(error = %e, path = %summary_log.path().display(), "failed to append run summary");
    }

    let dataset_count = match store.list_symbols() {
        Ok(symbols) => symbols.len(),
        Err(e) => {
            warn!(error = %e, "could not count stored datasets");
            0
        }
    };
    log_run_totals(&summary, started.elapsed(), dataset_count);

    if config.sample.enabled {
        run_sample(config);
    }

    // Partial failure is a normal outcome; the summary line records it.
    Ok(())
}

fn run_sample(config: &IngestConfig) {
    let store = config.store();
    let mut rng = rand::thread_rng();
    match write_sample(&store, &config.sample_file, &config.sample, &mut rng, Utc::now()) {
        Ok(Some(symbol)) => info!(
            "Sample data for {symbol} written to {}",
            config.sample_file.display()
        ),
        Ok(None) => warn!("no stored datasets to sample"),
        Err(e) => error!(error = %e, "failed to write sample file"),
    }
}

fn run_status(store: &ParquetStore) -> Result<()> {
    if !store.data_dir().exists() {
        println!("Data directory does not exist: {}", store.data_dir().display());
        return Ok(());
    }

    let symbols = store.list_symbols()?;
    println!(
        "{:<10} {:>10}  {:<20}  {:<20}",
        "Symbol", "Rows", "First", "Last"
    );
    println!("{}", "-".repeat(66));

    let mut total_rows = 0;
    for symbol in &symbols {
        match store.status(symbol) {
            Ok(Some(status)) => {
                total_rows += status.rows;
                let fmt_ts = |ts: Option<chrono::DateTime<Utc>>| {
                    ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".into())
                };
                println!(
                    "{:<10} {:>10}  {:<20}  {:<20}",
                    status.symbol,
                    status.rows,
                    fmt_ts(status.first),
                    fmt_ts(status.last)
                );
            }
            Ok(None) => {}
            Err(e) => println!("{symbol:<10} {:>10}  ({e})", "unreadable"),
        }
    }

    println!("{}", "-".repeat(66));
    println!("{} datasets, {total_rows} rows", symbols.len());

    match store.load_earnings() {
        Ok(Some(events)) => println!("Earnings: {} dates", events.len()),
        Ok(None) => println!("Earnings: none stored"),
        Err(e) => println!("Earnings: unreadable ({e})"),
    }
    Ok(())
}
