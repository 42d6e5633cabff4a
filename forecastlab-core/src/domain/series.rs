//! Price history for a single instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive fields reported by the market-data provider (name, sector, currency, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Daily OHLCV bar. Values the provider did not report are `NaN` (volume `0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

impl PriceBar {
    /// Returns true if every price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            && self.high.is_nan()
            && self.low.is_nan()
            && self.close.is_nan()
            && self.adj_close.is_nan()
    }
}

/// Historical series and metadata for one symbol, as returned by the fetcher.
///
/// `history` is ascending by date and never empty for a record produced by
/// [`crate::data::fetch_series`]. Downstream stages only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub symbol: String,
    pub history: Vec<PriceBar>,
    pub metadata: Metadata,
}

impl SeriesRecord {
    pub fn new(symbol: impl Into<String>, history: Vec<PriceBar>, metadata: Metadata) -> Self {
        Self {
            symbol: symbol.into(),
            history,
            metadata,
        }
    }

    /// Display name: `shortName`, then `longName`, then the ticker itself.
    pub fn name(&self) -> &str {
        self.metadata_str("shortName")
            .or_else(|| self.metadata_str("longName"))
            .unwrap_or(&self.symbol)
    }

    pub fn sector(&self) -> &str {
        self.metadata_str("sector").unwrap_or("Unknown")
    }

    pub fn industry(&self) -> &str {
        self.metadata_str("industry").unwrap_or("Unknown")
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Closing prices in date order (may contain NaN).
    pub fn closes(&self) -> Vec<f64> {
        self.history.iter().map(|b| b.close).collect()
    }

    /// Adjusted closing prices in date order (may contain NaN).
    pub fn adj_closes(&self) -> Vec<f64> {
        self.history.iter().map(|b| b.adj_close).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.history.last().map(|b| b.date)
    }

    /// Mean traded volume over the history, 0 when empty.
    pub fn mean_volume(&self) -> u64 {
        if self.history.is_empty() {
            return 0;
        }
        let total: u128 = self.history.iter().map(|b| b.volume as u128).sum();
        (total / self.history.len() as u128) as u64
    }

    /// Flatten into the market-data response shape printed by the CLI.
    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            symbol: self.symbol.clone(),
            name: self.name().to_string(),
            sector: self.sector().to_string(),
            data_points: self
                .history
                .iter()
                .map(|b| DataPoint {
                    date: b.date.format("%Y-%m-%d").to_string(),
                    open: finite_or_zero(b.open),
                    high: finite_or_zero(b.high),
                    low: finite_or_zero(b.low),
                    close: finite_or_zero(b.close),
                    volume: b.volume,
                })
                .collect(),
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// One row of [`SeriesSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Symbol, descriptive name and sector, and the flattened price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub data_points: Vec<DataPoint>,
}
