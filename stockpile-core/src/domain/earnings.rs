//! EarningsEvent: a reported or scheduled earnings date for a symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An earnings date for one symbol. Identity and ordering are both
/// `(symbol, earnings_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub symbol: String,
    pub earnings_date: DateTime<Utc>,
}

impl EarningsEvent {
    pub fn new(symbol: impl Into<String>, earnings_date: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            earnings_date,
        }
    }
}
