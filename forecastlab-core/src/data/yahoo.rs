//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API using the `range`
//! parameter, so provider period tokens ("6mo", "1y", ...) pass straight
//! through. Descriptive metadata comes from the `meta` block of the same
//! response and is cached per symbol, so `get_info` after `get_history` costs
//! no extra request. The chart meta carries no sector or industry, so those
//! read as "Unknown" on records from this provider. Handles rate limiting,
//! retries with exponential backoff, and the shared circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataProvider};
use crate::domain::{Metadata, PriceBar};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<serde_json::Map<String, serde_json::Value>>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
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

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
    /// Chart meta from the last history request, by symbol.
    meta_cache: Mutex<HashMap<String, Metadata>>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            meta_cache: Mutex::new(HashMap::new()),
        })
    }

    fn cache_meta(&self, symbol: &str, meta: Metadata) {
        self.meta_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string(), meta);
    }

    fn cached_meta(&self, symbol: &str) -> Option<Metadata> {
        self.meta_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .cloned()
    }

    fn chart_url(symbol: &str, range: &str) -> String {
        format!("{BASE_URL}/{symbol}?range={range}&interval=1d&includeAdjustedClose=true")
    }

    /// Unwrap the single chart result, mapping provider errors.
    fn chart_data(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Parse the chart payload into bars, skipping rows with no data at all.
    fn parse_bars(symbol: &str, data: ChartData) -> Result<Vec<PriceBar>, DataError> {
        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            // Holidays and halted sessions come back as all-null rows
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(PriceBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close: adj_close.or(close).unwrap_or(f64::NAN),
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }

    /// Pull the descriptive fields out of the chart `meta` block.
    fn parse_meta(data: &ChartData) -> Metadata {
        let mut meta = Metadata::new();
        if let Some(raw) = &data.meta {
            for key in [
                "shortName",
                "longName",
                "currency",
                "exchangeName",
                "fullExchangeName",
                "instrumentType",
                "timezone",
                "regularMarketPrice",
                "fiftyTwoWeekHigh",
                "fiftyTwoWeekLow",
            ] {
                if let Some(v) = raw.get(key) {
                    meta.insert(key.to_string(), v.clone());
                }
            }
        }
        meta
    }

    /// Execute a chart request with retry and circuit breaker logic.
    fn fetch_chart(&self, symbol: &str, range: &str) -> Result<ChartData, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(symbol, range);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(%symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;

            let data = Self::chart_data(symbol, chart)?;
            self.circuit_breaker.record_success();
            return Ok(data);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn get_history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>, DataError> {
        let data = self.fetch_chart(symbol, period)?;
        self.cache_meta(symbol, Self::parse_meta(&data));
        Self::parse_bars(symbol, data)
    }

    /// Meta cached by `get_history`; a short chart request otherwise.
    fn get_info(&self, symbol: &str) -> Result<Metadata, DataError> {
        if let Some(meta) = self.cached_meta(symbol) {
            return Ok(meta);
        }
        let data = self.fetch_chart(symbol, "5d")?;
        let meta = Self::parse_meta(&data);
        self.cache_meta(symbol, meta.clone());
        Ok(meta)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
