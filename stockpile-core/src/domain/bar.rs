//! PriceBar: one intraday OHLCV observation for a symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single symbol at a single timestamp.
///
/// Identity is `(symbol, timestamp)`: a canonical dataset holds at most one
/// bar per identity, and a freshly fetched bar replaces a stored one with the
/// same identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Field-wise equality where a missing (NaN) price matches another
    /// missing price, so a re-fetched partial bar is not a revision.
    pub fn same_values(&self, other: &PriceBar) -> bool {
        fn price_eq(a: f64, b: f64) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        self.symbol == other.symbol
            && self.timestamp == other.timestamp
            && self.volume == other.volume
            && price_eq(self.open, other.open)
            && price_eq(self.high, other.high)
            && price_eq(self.low, other.low)
            && price_eq(self.close, other.close)
    }

    /// Returns true if any price field is NaN (provider returned a partial row).
    pub fn has_missing_prices(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> PriceBar {
        PriceBar {
            symbol: "SPY".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
        }
    }

    #[test]
    fn missing_prices_compare_equal() {
        let mut a = sample_bar();
        a.open = f64::NAN;
        let b = a.clone();
        assert_ne!(a, b);
        assert!(a.same_values(&b));

        let mut c = b.clone();
        c.open = 100.0;
        assert!(!a.same_values(&c));
    }

    #[test]
    fn missing_prices_detected() {
        let mut bar = sample_bar();
        assert!(!bar.has_missing_prices());
        bar.low = f64::NAN;
        assert!(bar.has_missing_prices());
    }
}
