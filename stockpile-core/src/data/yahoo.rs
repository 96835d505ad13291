//! Yahoo Finance data provider.
//!
//! Fetches intraday OHLCV bars from Yahoo's v8 chart API and earnings dates
//! from the v10 quote-summary API. Handles rate limiting, retries with
//! exponential backoff, response parsing, and the circuit breaker.
//!
//! The quote-summary API wants a session cookie plus a matching "crumb".
//! The crumb is fetched once, cached, and refreshed once when a request is
//! rejected with 401.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; parse failures surface as `ResponseFormatChanged`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataProvider};
use crate::domain::{BarInterval, EarningsEvent, FetchWindow, PriceBar};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

/// Upper bound on a single wait between attempts, `retry-after` included.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

// ── Chart API response ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ── Quote-summary API response ──────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryModules>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryModules {
    calendar_events: Option<CalendarEvents>,
}

#[derive(Debug, Deserialize)]
struct CalendarEvents {
    earnings: Option<CalendarEarnings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEarnings {
    #[serde(default)]
    earnings_date: Vec<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
struct RawTimestamp {
    raw: Option<i64>,
}

/// HTTP behaviour knobs for the Yahoo provider.
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: YahooSettings,
    crumb: Mutex<Option<String>>,
}

impl YahooProvider {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        settings: YahooSettings,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .cookie_store(true)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            settings,
            crumb: Mutex::new(None),
        })
    }

    /// Cached crumb, performing the cookie handshake on first use.
    ///
    /// `None` when the handshake fails; the request then goes out without a
    /// crumb and a 401 surfaces as `AuthenticationRequired`.
    fn crumb(&self) -> Option<String> {
        let mut cached = self.crumb.lock().unwrap_or_else(|e| e.into_inner());
        if cached.is_none() && self.circuit_breaker.is_allowed() {
            *cached = self.fetch_crumb();
        }
        cached.clone()
    }

    fn forget_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn fetch_crumb(&self) -> Option<String> {
        // The cookie host answers 404 but still sets the session cookie
        if let Err(e) = self.client.get(COOKIE_URL).send() {
            tracing::debug!(error = %e, "cookie handshake failed");
            return None;
        }
        let resp = self.client.get(CRUMB_URL).send().ok()?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "crumb request rejected");
            return None;
        }
        let crumb = resp.text().ok()?;
        let crumb = crumb.trim();
        // An HTML error page is not a crumb
        if crumb.is_empty() || crumb.contains('<') {
            return None;
        }
        Some(crumb.to_string())
    }

    /// Chart API URL for a symbol, window, and interval.
    fn chart_url(symbol: &str, window: &FetchWindow, interval: BarInterval) -> String {
        format!(
            "{CHART_BASE}/{symbol}?period1={}&period2={}&interval={interval}&includePrePost=false",
            window.start_timestamp(),
            window.end_timestamp(),
        )
    }

    fn quote_summary_url(symbol: &str, crumb: Option<&str>) -> String {
        match crumb {
            Some(crumb) => {
                format!("{QUOTE_SUMMARY_BASE}/{symbol}?modules=calendarEvents&crumb={crumb}")
            }
            None => format!("{QUOTE_SUMMARY_BASE}/{symbol}?modules=calendarEvents"),
        }
    }

    /// Parse the chart API response into bars tagged with `symbol`.
    ///
    /// A result without timestamps (no trades in the window) is an empty
    /// vector, not an error.
    fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => return Err(api_error(symbol, resp.chart.error)),
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Rows with no prices and no volume are placeholders, not trades
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(PriceBar {
                symbol: symbol.to_string(),
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        Ok(bars)
    }

    /// Parse the quote-summary response into earnings events for `symbol`.
    ///
    /// Yahoo publishes the next report as a one- or two-date window; the
    /// window start is kept, so each report yields one event.
    fn parse_earnings(
        symbol: &str,
        resp: QuoteSummaryResponse,
    ) -> Result<Vec<EarningsEvent>, DataError> {
        let result = match resp.quote_summary.result {
            Some(result) => result,
            None => return Err(api_error(symbol, resp.quote_summary.error)),
        };

        let events = result
            .into_iter()
            .filter_map(|modules| modules.calendar_events)
            .filter_map(|calendar| calendar.earnings)
            .filter_map(|earnings| earnings.earnings_date.into_iter().filter_map(|d| d.raw).min())
            .filter_map(|raw| DateTime::<Utc>::from_timestamp(raw, 0))
            .map(|date| EarningsEvent::new(symbol, date))
            .collect();

        Ok(events)
    }

    /// GET `url` and decode JSON, with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, symbol: &str, url: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            tracing::debug!(
                symbol,
                cooldown = ?self.circuit_breaker.remaining_cooldown(),
                "circuit breaker open, skipping request"
            );
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.settings.base_delay, attempt, retry_after.take());
                tracing::debug!(symbol, attempt, ?delay, "retrying provider request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after_secs = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        retry_after = Some(Duration::from_secs(retry_after_secs));
                        last_error = Some(DataError::RateLimited { retry_after_secs });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    // Unknown symbols come back as 404 with a JSON error body
                    if status == reqwest::StatusCode::NOT_FOUND {
                        self.circuit_breaker.record_success();
                        return Err(DataError::NoData {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Wait before retry `attempt` (1-based): exponential backoff from `base`,
/// stretched to the server's `retry-after` when given, capped at
/// [`MAX_RETRY_DELAY`].
fn retry_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let backoff = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    backoff
        .max(retry_after.unwrap_or(Duration::ZERO))
        .min(MAX_RETRY_DELAY)
}

/// Map an API-level error object to a `DataError`.
fn api_error(symbol: &str, error: Option<ApiError>) -> DataError {
    match error {
        Some(err) if err.code == "Not Found" => DataError::NoData {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        window: &FetchWindow,
        interval: BarInterval,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = Self::chart_url(symbol, window, interval);
        let chart: ChartResponse = self.get_json(symbol, &url)?;
        Self::parse_chart(symbol, chart)
    }

    fn fetch_earnings(&self, symbol: &str) -> Result<Vec<EarningsEvent>, DataError> {
        let crumb = self.crumb();
        let url = Self::quote_summary_url(symbol, crumb.as_deref());
        let summary = match self.get_json::<QuoteSummaryResponse>(symbol, &url) {
            // A stale session: handshake again and retry once
            Err(DataError::AuthenticationRequired(_)) if crumb.is_some() => {
                self.forget_crumb();
                let url = Self::quote_summary_url(symbol, self.crumb().as_deref());
                self.get_json(symbol, &url)?
            }
            other => other?,
        };
        Self::parse_earnings(symbol, summary)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn chart_url_carries_window_and_interval() {
        let window = FetchWindow::new(
            NaiveDate::from_ymd_opt(2025, 8, 21).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 22).unwrap(),
        )
        .unwrap();
        let url = YahooProvider::chart_url("AAPL", &window, BarInterval::OneMinute);
        assert!(url.contains("/chart/AAPL?"));
        assert!(url.contains(&format!("period1={}", window.start_timestamp())));
        assert!(url.contains(&format!("period2={}", window.end_timestamp())));
        assert!(url.contains("interval=1m"));
    }

    #[test]
    fn parses_bars_and_tags_symbol() {
        let resp = chart(
            r#"{"chart":{"result":[{"timestamp":[1724247000,1724247060,1724247120],
            "indicators":{"quote":[{"open":[100.0,null,101.0],"high":[101.0,null,102.0],
            "low":[99.5,null,100.5],"close":[100.5,null,101.5],"volume":[1200,null,900]}]}}],
            "error":null}}"#,
        );
        let bars = YahooProvider::parse_chart("AAPL", resp).unwrap();

        // Middle row is all-null and skipped
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.symbol == "AAPL"));
        assert_eq!(bars[0].timestamp, Utc.timestamp_opt(1724247000, 0).unwrap());
        assert_eq!(bars[1].close, 101.5);
        assert_eq!(bars[1].volume, 900);
    }

    #[test]
    fn missing_timestamps_is_empty_not_error() {
        let resp = chart(
            r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#,
        );
        let bars = YahooProvider::parse_chart("AAPL", resp).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn not_found_maps_to_no_data() {
        let resp = chart(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        );
        let err = YahooProvider::parse_chart("ZZZZ", resp).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn other_api_error_is_format_change() {
        let resp = chart(
            r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid interval"}}}"#,
        );
        let err = YahooProvider::parse_chart("AAPL", resp).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn parses_calendar_earnings_dates() {
        let resp: QuoteSummaryResponse = serde_json::from_str(
            r#"{"quoteSummary":{"result":[{"calendarEvents":{"earnings":{
            "earningsDate":[{"raw":1761854400,"fmt":"2025-10-30"},{"fmt":"n/a"}]}}}],"error":null}}"#,
        )
        .unwrap();
        let events = YahooProvider::parse_earnings("AAPL", resp).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, "AAPL");
        assert_eq!(
            events[0].earnings_date,
            Utc.timestamp_opt(1761854400, 0).unwrap()
        );
    }

    #[test]
    fn missing_calendar_module_yields_no_events() {
        let resp: QuoteSummaryResponse =
            serde_json::from_str(r#"{"quoteSummary":{"result":[{}],"error":null}}"#).unwrap();
        assert!(YahooProvider::parse_earnings("AAPL", resp).unwrap().is_empty());
    }

    #[test]
    fn estimated_window_yields_one_event_at_its_start() {
        let json = r#"{"quoteSummary":{"result":[{"calendarEvents":{"earnings":{
            "earningsDate":[{"raw":1762200000},{"raw":1761854400}]}}}],"error":null}}"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let events = YahooProvider::parse_earnings("AAPL", resp).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].earnings_date.timestamp(), 1761854400);
    }

    #[test]
    fn quote_summary_url_carries_crumb() {
        let url = YahooProvider::quote_summary_url("AAPL", Some("abc123"));
        assert!(url.ends_with("/AAPL?modules=calendarEvents&crumb=abc123"));
        let bare = YahooProvider::quote_summary_url("AAPL", None);
        assert!(!bare.contains("crumb"));
    }

    #[test]
    fn retry_delay_doubles_from_base() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(base, 1, None), Duration::from_millis(500));
        assert_eq!(retry_delay(base, 2, None), Duration::from_secs(1));
        assert_eq!(retry_delay(base, 3, None), Duration::from_secs(2));
    }

    #[test]
    fn retry_delay_waits_at_least_retry_after() {
        let base = Duration::from_millis(500);
        assert_eq!(
            retry_delay(base, 1, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        // Backoff already longer than the hint
        assert_eq!(
            retry_delay(Duration::from_secs(10), 3, Some(Duration::from_secs(5))),
            Duration::from_secs(40)
        );
    }

    #[test]
    fn retry_delay_is_capped() {
        let base = Duration::from_millis(500);
        assert_eq!(retry_delay(base, 1, Some(Duration::from_secs(3600))), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, 40, None), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(Duration::MAX, u32::MAX, None), MAX_RETRY_DELAY);
    }
}
