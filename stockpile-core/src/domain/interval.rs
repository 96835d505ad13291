//! Bar interval and fetch window.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minutes in a regular US equity session (09:30–16:00).
const SESSION_MINUTES: u32 = 390;

/// Bar interval accepted by the market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m", alias = "1h")]
    SixtyMinutes,
    #[serde(rename = "90m")]
    NinetyMinutes,
    #[serde(rename = "1d")]
    Daily,
}

impl BarInterval {
    /// Provider query-string form (`1m`, `30m`, `1d`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            BarInterval::OneMinute => "1m",
            BarInterval::TwoMinutes => "2m",
            BarInterval::FiveMinutes => "5m",
            BarInterval::FifteenMinutes => "15m",
            BarInterval::ThirtyMinutes => "30m",
            BarInterval::SixtyMinutes => "60m",
            BarInterval::NinetyMinutes => "90m",
            BarInterval::Daily => "1d",
        }
    }

    /// Length of one bar in minutes (a daily bar counts as one session).
    pub fn minutes(&self) -> u32 {
        match self {
            BarInterval::OneMinute => 1,
            BarInterval::TwoMinutes => 2,
            BarInterval::FiveMinutes => 5,
            BarInterval::FifteenMinutes => 15,
            BarInterval::ThirtyMinutes => 30,
            BarInterval::SixtyMinutes => 60,
            BarInterval::NinetyMinutes => 90,
            BarInterval::Daily => SESSION_MINUTES,
        }
    }

    /// Bars in one regular session, rounding a trailing partial bar up.
    pub fn bars_per_session(&self) -> u32 {
        SESSION_MINUTES.div_ceil(self.minutes())
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(BarInterval::OneMinute),
            "2m" => Ok(BarInterval::TwoMinutes),
            "5m" => Ok(BarInterval::FiveMinutes),
            "15m" => Ok(BarInterval::FifteenMinutes),
            "30m" => Ok(BarInterval::ThirtyMinutes),
            "60m" | "1h" => Ok(BarInterval::SixtyMinutes),
            "90m" => Ok(BarInterval::NinetyMinutes),
            "1d" => Ok(BarInterval::Daily),
            other => Err(format!(
                "unknown interval '{other}'. Valid: 1m, 2m, 5m, 15m, 30m, 60m, 1h, 90m, 1d"
            )),
        }
    }
}

/// Inclusive calendar-date range requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Window covering `days` days before `today` through `today`.
    pub fn trailing_days(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    /// Unix seconds at 00:00:00 UTC on `start`.
    pub fn start_timestamp(&self) -> i64 {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
    }

    /// Unix seconds at 23:59:59 UTC on `end`.
    pub fn end_timestamp(&self) -> i64 {
        self.end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parse_and_display_agree() {
        for s in ["1m", "2m", "5m", "15m", "30m", "60m", "90m", "1d"] {
            let interval: BarInterval = s.parse().unwrap();
            assert_eq!(interval.to_string(), s);
        }
        assert_eq!("1h".parse::<BarInterval>().unwrap(), BarInterval::SixtyMinutes);
        assert!("3m".parse::<BarInterval>().is_err());
    }

    #[test]
    fn thirty_minute_session_has_thirteen_bars() {
        assert_eq!(BarInterval::ThirtyMinutes.bars_per_session(), 13);
        assert_eq!(BarInterval::OneMinute.bars_per_session(), 390);
        assert_eq!(BarInterval::Daily.bars_per_session(), 1);
    }

    #[test]
    fn interval_deserializes_from_provider_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            interval: BarInterval,
        }
        let w: Wrapper = toml::from_str(r#"interval = "1h""#).unwrap();
        assert_eq!(w.interval, BarInterval::SixtyMinutes);
    }

    #[test]
    fn trailing_window_spans_requested_days() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
        let w = FetchWindow::trailing_days(today, 1);
        assert_eq!(w.start, NaiveDate::from_ymd_opt(2025, 8, 21).unwrap());
        assert_eq!(w.end, today);
        assert_eq!(w.end_timestamp() - w.start_timestamp(), 2 * 86_400 - 1);
    }

    #[test]
    fn inverted_window_rejected() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(FetchWindow::new(a, b).is_none());
        assert!(FetchWindow::new(b, a).is_some());
    }
}
