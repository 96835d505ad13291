//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over the bar and earnings source so
//! the ingestion pipeline can be driven by Yahoo Finance in production and by
//! scripted providers in tests.

use crate::domain::{BarInterval, EarningsEvent, FetchWindow, PriceBar};
use thiserror::Error;

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data available for {symbol}")]
    NoData { symbol: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider error: {0}")]
    Other(String),
}

impl DataError {
    /// True for the "provider answered, but had nothing" case.
    pub fn is_no_data(&self) -> bool {
        matches!(self, DataError::NoData { .. })
    }
}

/// Trait for market-data providers.
///
/// Providers only fetch; they know nothing about the on-disk datasets.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch intraday bars for a symbol over a window at the given interval.
    ///
    /// Every returned bar carries `symbol`. An empty vector means the
    /// provider had no rows for the window.
    fn fetch_bars(
        &self,
        symbol: &str,
        window: &FetchWindow,
        interval: BarInterval,
    ) -> Result<Vec<PriceBar>, DataError>;

    /// Fetch the next scheduled earnings date for a symbol.
    ///
    /// Providers publish only the upcoming report, so past dates exist only
    /// as far as earlier runs captured them.
    fn fetch_earnings(&self, symbol: &str) -> Result<Vec<EarningsEvent>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
