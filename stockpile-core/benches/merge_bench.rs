//! Criterion benchmarks for the merge engine.
//!
//! Benchmarks:
//! 1. Daily incremental merge: one session of 1m bars over a year of history
//! 2. First-run merge: unsorted incoming bars with no history
//! 3. Earnings merge across a 1000-symbol universe

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stockpile_core::data::{DatasetMerger, EarningsMerger};
use stockpile_core::domain::{EarningsEvent, PriceBar};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
}

fn make_bars(start_minute: usize, n: usize) -> Vec<PriceBar> {
    (start_minute..start_minute + n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.01).sin() * 10.0;
            PriceBar {
                symbol: "SPY".into(),
                timestamp: base_time() + Duration::minutes(i as i64),
                open: close - 0.05,
                high: close + 0.1,
                low: close - 0.1,
                close,
                volume: 10_000 + (i as u64 % 5_000),
            }
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_incremental_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_merge");

    for sessions in [20usize, 250] {
        let history = make_bars(0, sessions * 390);
        // Today's fetch overlaps yesterday's last session
        let incoming = make_bars((sessions - 1) * 390, 2 * 390);

        group.bench_with_input(
            BenchmarkId::new("one_minute_sessions", sessions),
            &sessions,
            |b, _| {
                b.iter(|| {
                    DatasetMerger::merge(
                        black_box(Some(history.clone())),
                        black_box(incoming.clone()),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_first_run_merge(c: &mut Criterion) {
    let mut incoming = make_bars(0, 2 * 390);
    incoming.reverse();

    c.bench_function("first_run_reverse_sorted_780", |b| {
        b.iter(|| DatasetMerger::merge(None, black_box(incoming.clone())))
    });
}

fn bench_earnings_merge(c: &mut Criterion) {
    let existing: Vec<EarningsEvent> = (0..1000)
        .flat_map(|s| {
            (0..8).map(move |q| {
                EarningsEvent::new(format!("SYM{s:04}"), base_time() + Duration::days(91 * q))
            })
        })
        .collect();
    let incoming: Vec<EarningsEvent> = (0..1000)
        .map(|s| EarningsEvent::new(format!("SYM{s:04}"), base_time() + Duration::days(91 * 8)))
        .collect();

    c.bench_function("earnings_1000_symbols", |b| {
        b.iter(|| {
            EarningsMerger::merge(
                black_box(Some(existing.clone())),
                black_box(incoming.clone()),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_incremental_merge,
    bench_first_run_merge,
    bench_earnings_merge,
);
criterion_main!(benches);
