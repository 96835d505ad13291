//! Stockpile Core: domain types, market-data provider, merge engine, dataset store.
//!
//! This crate contains everything below the batch orchestration:
//! - Domain types (price bars, earnings events, intervals, fetch windows)
//! - Provider trait with a Yahoo Finance implementation and circuit breaker
//! - Merge engine that keeps each dataset deduplicated and time-ordered
//! - Parquet store with atomic, whole-file replacement
//! - Universe (symbol list) configuration

pub mod data;
pub mod domain;
