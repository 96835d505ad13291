//! Per-symbol outcomes and the batch summary.

use std::fmt;

use stockpile_core::domain::EarningsEvent;

/// Why a symbol's price ingestion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider answered with no rows for the window.
    NoData,
    /// Network, HTTP, or response-shape failure.
    Provider(String),
    /// The existing dataset could not be read or the merged one written.
    Persistence(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data"),
            Self::Provider(reason) => write!(f, "provider error: {reason}"),
            Self::Persistence(reason) => write!(f, "persistence error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// The dataset now holds `rows` rows; `written` is false when the merge
    /// changed nothing and the file was left alone.
    Success { rows: usize, written: bool },
    Failure(FailureKind),
}

/// Result of ingesting one symbol's price data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub symbol: String,
    pub status: IngestStatus,
}

impl IngestOutcome {
    pub fn success(symbol: impl Into<String>, rows: usize, written: bool) -> Self {
        Self {
            symbol: symbol.into(),
            status: IngestStatus::Success { rows, written },
        }
    }

    pub fn failure(symbol: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            symbol: symbol.into(),
            status: IngestStatus::Failure(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, IngestStatus::Success { .. })
    }

    /// Row count of the stored dataset on success.
    pub fn rows(&self) -> Option<usize> {
        match self.status {
            IngestStatus::Success { rows, .. } => Some(rows),
            IngestStatus::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<&FailureKind> {
        match &self.status {
            IngestStatus::Success { .. } => None,
            IngestStatus::Failure(kind) => Some(kind),
        }
    }
}

/// Everything one symbol contributed to a run.
///
/// Earnings are independent of the price outcome: a symbol whose bars failed
/// may still carry earnings dates, and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub outcome: IngestOutcome,
    pub earnings: Vec<EarningsEvent>,
}

/// What happened to the shared earnings dataset at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EarningsUpdate {
    /// No symbol returned earnings dates; the dataset was not touched.
    Skipped,
    /// The merged dataset was written with `rows` rows.
    Written { rows: usize },
    /// Loading or writing failed; the previous dataset is unchanged.
    Failed(String),
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Failed symbols in universe order.
    pub failed_symbols: Vec<String>,
    pub earnings: EarningsUpdate,
    pub outcomes: Vec<IngestOutcome>,
}

impl BatchSummary {
    pub fn earnings_written(&self) -> bool {
        matches!(self.earnings, EarningsUpdate::Written { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_render() {
        assert_eq!(FailureKind::NoData.to_string(), "no data");
        assert_eq!(
            FailureKind::Provider("HTTP 500".into()).to_string(),
            "provider error: HTTP 500"
        );
    }

    #[test]
    fn outcome_accessors() {
        let ok = IngestOutcome::success("AAPL", 780, true);
        assert!(ok.is_success());
        assert_eq!(ok.rows(), Some(780));
        assert!(ok.failure_kind().is_none());

        let failed = IngestOutcome::failure("ZZZZ", FailureKind::NoData);
        assert!(!failed.is_success());
        assert_eq!(failed.rows(), None);
        assert_eq!(failed.failure_kind(), Some(&FailureKind::NoData));
    }
}
