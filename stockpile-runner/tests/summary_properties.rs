//! Property tests for the run summary line.

use chrono::NaiveDate;
use proptest::prelude::*;
use stockpile_runner::{summary_line, BatchSummary, EarningsUpdate};

fn arb_summary() -> impl Strategy<Value = BatchSummary> {
    prop::collection::btree_set("[A-Z]{1,5}", 0..20).prop_flat_map(|failed| {
        let failed: Vec<String> = failed.into_iter().collect();
        (Just(failed.clone()), failed.len()..failed.len() + 50).prop_map(|(failed, total)| {
            BatchSummary {
                total,
                successful: total - failed.len(),
                failed: failed.len(),
                failed_symbols: failed,
                earnings: EarningsUpdate::Skipped,
                outcomes: Vec::new(),
            }
        })
    })
}

proptest! {
    #[test]
    fn line_reports_counts_and_every_failed_symbol(summary in arb_summary()) {
        let at = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let line = summary_line(&summary, at);

        let prefix = format!("{}/{} - ", summary.successful, summary.total);
        prop_assert!(line.starts_with(&prefix));
        prop_assert!(line.ends_with("2025-08-22 09:00:00"));
        prop_assert_eq!(line.contains("Failed: ["), summary.failed > 0);
        for symbol in &summary.failed_symbols {
            let quoted = format!("'{}'", symbol);
            prop_assert!(line.contains(&quoted));
        }
        prop_assert!(!line.contains('\n'));
    }
}
