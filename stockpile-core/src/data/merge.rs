//! Merge engine: reconcile freshly fetched rows with persisted history.
//!
//! Both dataset shapes use the same three steps: concatenate existing then
//! incoming, deduplicate by identity keeping the incoming row, and sort by
//! the ordering key. For both shapes the identity key and the ordering key
//! coincide, so a single ordered map does the dedup and the sort.

use crate::domain::{EarningsEvent, PriceBar};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A row that can be merged into a canonical dataset.
pub trait MergeRecord: Clone + PartialEq {
    /// Identity key, also the ascending storage order.
    type Key: Ord;

    fn merge_key(&self) -> Self::Key;

    /// Whether `self` carries the same values as `previous`. A replacement
    /// that is not the same counts as a revision.
    fn same_values(&self, previous: &Self) -> bool {
        self == previous
    }
}

impl MergeRecord for PriceBar {
    // Timestamp first: storage order is by time, the symbol is constant
    // within a per-symbol dataset.
    type Key = (DateTime<Utc>, String);

    fn merge_key(&self) -> Self::Key {
        (self.timestamp, self.symbol.clone())
    }

    fn same_values(&self, previous: &Self) -> bool {
        PriceBar::same_values(self, previous)
    }
}

impl MergeRecord for EarningsEvent {
    type Key = (String, DateTime<Utc>);

    fn merge_key(&self) -> Self::Key {
        (self.symbol.clone(), self.earnings_date)
    }
}

/// What a merge did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Rows in the merged dataset.
    pub total: usize,
    /// Identities that were not in the existing dataset.
    pub added: usize,
    /// Existing rows replaced by an incoming row with different values.
    pub revised: usize,
}

/// Concatenate, deduplicate (last write wins), sort.
pub fn merge_records<T: MergeRecord>(existing: Option<Vec<T>>, incoming: Vec<T>) -> (Vec<T>, MergeCounts) {
    let mut by_key: BTreeMap<T::Key, T> = BTreeMap::new();

    for row in existing.into_iter().flatten() {
        by_key.insert(row.merge_key(), row);
    }
    let existing_len = by_key.len();

    let mut revised = 0;
    for row in incoming {
        if let Some(previous) = by_key.insert(row.merge_key(), row.clone()) {
            if !row.same_values(&previous) {
                revised += 1;
            }
        }
    }

    let counts = MergeCounts {
        total: by_key.len(),
        added: by_key.len() - existing_len,
        revised,
    };
    (by_key.into_values().collect(), counts)
}

/// Merger for one symbol's price-bar history.
pub struct DatasetMerger;

impl DatasetMerger {
    /// Merge `incoming` bars over `existing` (absent on a symbol's first run).
    ///
    /// On a `(symbol, timestamp)` collision the incoming bar wins; the result
    /// is sorted ascending by timestamp.
    pub fn merge(existing: Option<Vec<PriceBar>>, incoming: Vec<PriceBar>) -> Vec<PriceBar> {
        merge_records(existing, incoming).0
    }

    /// Same as [`DatasetMerger::merge`], also reporting what changed.
    pub fn merge_counted(
        existing: Option<Vec<PriceBar>>,
        incoming: Vec<PriceBar>,
    ) -> (Vec<PriceBar>, MergeCounts) {
        merge_records(existing, incoming)
    }
}

/// Merger for the shared, universe-wide earnings dataset.
pub struct EarningsMerger;

impl EarningsMerger {
    /// Merge `incoming` events over `existing`, ordered by `(symbol, earnings_date)`.
    pub fn merge(
        existing: Option<Vec<EarningsEvent>>,
        incoming: Vec<EarningsEvent>,
    ) -> Vec<EarningsEvent> {
        merge_records(existing, incoming).0
    }
}
