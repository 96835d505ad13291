//! Serializable ingestion configuration.
//!
//! Everything a run needs (paths, universe, interval, window length, pacing,
//! provider behaviour) lives in one TOML file. Every field has a default, so
//! an empty file describes a valid run over the built-in universe.
//!
//! Relative paths in a config file are resolved against the file's own
//! directory. Built-in defaults, used when no file is loaded, stay relative
//! to the working directory.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stockpile_core::data::{CircuitBreaker, ParquetStore, Universe, YahooSettings};
use stockpile_core::domain::{BarInterval, FetchWindow};
use thiserror::Error;

use crate::batch::RunPlan;

/// Upper bound on `provider.max_retries`.
const MAX_RETRIES_LIMIT: u32 = 10;

/// Errors from loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("universe: {0}")]
    Universe(String),
}

/// Top-level configuration for one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory of per-symbol datasets.
    pub data_dir: PathBuf,
    /// Shared earnings dataset.
    pub earnings_file: PathBuf,
    /// Log file; also receives the one-line run summary.
    pub log_file: PathBuf,
    /// Human-readable excerpt written after each run.
    pub sample_file: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub interval: BarInterval,
    /// Days before today included in each fetch.
    pub lookback_days: u32,
    /// Blocking wait after every symbol.
    pub pacing_delay_ms: u64,
    /// Inline universe. Ignored when `universe_file` is set.
    pub symbols: Vec<String>,
    /// Universe TOML file.
    pub universe_file: Option<PathBuf>,
    pub provider: ProviderConfig,
    pub sample: SampleConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("stock_data"),
            earnings_file: PathBuf::from("earnings_dates.parquet"),
            log_file: PathBuf::from("download_log.txt"),
            sample_file: PathBuf::from("sample_data.txt"),
            log_level: "info".into(),
            interval: BarInterval::OneMinute,
            lookback_days: 1,
            pacing_delay_ms: 200,
            symbols: Vec::new(),
            universe_file: None,
            provider: ProviderConfig::default(),
            sample: SampleConfig::default(),
        }
    }
}

/// HTTP and circuit-breaker settings for the market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl ProviderConfig {
    pub fn yahoo_settings(&self) -> YahooSettings {
        YahooSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            Duration::from_secs(self.breaker_cooldown_secs),
            self.breaker_failure_threshold,
        ))
    }
}

/// Which trading days the sample excerpt shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleConfig {
    pub enabled: bool,
    pub head_days: usize,
    pub tail_days: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            head_days: 3,
            tail_days: 30,
        }
    }
}

impl IngestConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Anchor every relative path at `base`.
    fn resolve_paths(&mut self, base: &Path) {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        anchor(&mut self.data_dir);
        anchor(&mut self.earnings_file);
        anchor(&mut self.log_file);
        anchor(&mut self.sample_file);
        if let Some(universe) = self.universe_file.as_mut() {
            anchor(universe);
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid("lookback_days must be at least 1".into()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.earnings_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("earnings_file must not be empty".into()));
        }
        if self.provider.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "provider.max_retries must be at most {MAX_RETRIES_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Resolve the universe: `universe_file`, else inline `symbols`, else the
    /// built-in default.
    pub fn universe(&self) -> Result<Universe, ConfigError> {
        let universe = match (&self.universe_file, self.symbols.is_empty()) {
            (Some(path), _) => Universe::from_file(path).map_err(ConfigError::Universe)?,
            (None, false) => Universe::from_symbols(&self.symbols),
            (None, true) => Universe::default_us(),
        };
        if universe.is_empty() {
            return Err(ConfigError::Universe("universe has no symbols".into()));
        }
        Ok(universe)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// The trailing fetch window ending on `today`.
    pub fn window(&self, today: NaiveDate) -> FetchWindow {
        FetchWindow::trailing_days(today, self.lookback_days)
    }

    pub fn store(&self) -> ParquetStore {
        ParquetStore::new(&self.data_dir, &self.earnings_file)
    }

    /// Everything the batch runner needs for a run ending on `today`.
    pub fn run_plan(&self, today: NaiveDate) -> Result<RunPlan, ConfigError> {
        Ok(RunPlan {
            symbols: self.universe()?.symbols,
            window: self.window(today),
            interval: self.interval,
            pacing_delay: self.pacing_delay(),
        })
    }
}
