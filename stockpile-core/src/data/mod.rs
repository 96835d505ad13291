//! Market-data retrieval, merge engine, and dataset persistence

pub mod circuit_breaker;
pub mod merge;
pub mod provider;
pub mod store;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use merge::{merge_records, DatasetMerger, EarningsMerger, MergeCounts, MergeRecord};
pub use provider::{DataError, MarketDataProvider};
pub use store::{DatasetStatus, ParquetStore, StoreError};
pub use universe::Universe;
pub use yahoo::{YahooProvider, YahooSettings};
