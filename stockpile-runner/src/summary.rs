//! One-line run summary appended to the download log.
//!
//! Format: `<successful>/<total> - <timestamp>` on a clean run, or
//! `<successful>/<total> - Failed: ['A', 'B'] - <timestamp>` when some
//! symbols failed.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::info;

use crate::outcome::BatchSummary;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appends run summaries to a plain-text log file.
pub struct RunSummaryLog {
    path: PathBuf,
}

impl RunSummaryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the summary line, creating the file (and parent) if needed.
    pub fn append(&self, summary: &BatchSummary, at: NaiveDateTime) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", summary_line(summary, at))
    }
}

pub fn summary_line(summary: &BatchSummary, at: NaiveDateTime) -> String {
    let ts = at.format(TIMESTAMP_FORMAT);
    if summary.failed_symbols.is_empty() {
        format!("{}/{} - {ts}", summary.successful, summary.total)
    } else {
        let quoted: Vec<String> = summary
            .failed_symbols
            .iter()
            .map(|s| format!("'{s}'"))
            .collect();
        format!(
            "{}/{} - Failed: [{}] - {ts}",
            summary.successful,
            summary.total,
            quoted.join(", ")
        )
    }
}

/// End-of-run totals: elapsed time and the persisted dataset count.
pub fn log_run_totals(summary: &BatchSummary, elapsed: Duration, dataset_count: usize) {
    info!("Total time: {:.2} minutes", elapsed.as_secs_f64() / 60.0);
    info!(
        "Successful: {}, Failed: {}",
        summary.successful, summary.failed
    );
    info!("Datasets on disk: {dataset_count}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::EarningsUpdate;
    use chrono::NaiveDate;

    fn summary(total: usize, failed: &[&str]) -> BatchSummary {
        BatchSummary {
            total,
            successful: total - failed.len(),
            failed: failed.len(),
            failed_symbols: failed.iter().map(|s| s.to_string()).collect(),
            earnings: EarningsUpdate::Skipped,
            outcomes: Vec::new(),
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 22)
            .unwrap()
            .and_hms_opt(18, 5, 9)
            .unwrap()
    }

    #[test]
    fn clean_run_line() {
        assert_eq!(summary_line(&summary(3, &[]), at()), "3/3 - 2025-08-22 18:05:09");
    }

    #[test]
    fn failed_symbols_are_listed() {
        assert_eq!(
            summary_line(&summary(1000, &["ABC", "XYZ"]), at()),
            "998/1000 - Failed: ['ABC', 'XYZ'] - 2025-08-22 18:05:09"
        );
    }

    #[test]
    fn append_keeps_previous_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunSummaryLog::new(dir.path().join("logs/download_log.txt"));

        log.append(&summary(2, &[]), at()).unwrap();
        log.append(&summary(2, &["MSFT"]), at()).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            [
                "2/2 - 2025-08-22 18:05:09",
                "1/2 - Failed: ['MSFT'] - 2025-08-22 18:05:09"
            ]
        );
    }
}
