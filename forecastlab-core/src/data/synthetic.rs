//! Synthetic market data for offline runs.
//!
//! Produces a deterministic random walk per symbol (seeded from the BLAKE3
//! hash of the ticker) over the weekdays covered by the period token. The
//! metadata is tagged `"synthetic": true` so reports never pass it off as
//! real market data.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::provider::{period_to_days, DataError, MarketDataProvider};
use crate::domain::{Metadata, PriceBar};

/// Deterministic random-walk provider anchored at a fixed end date.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    end: NaiveDate,
}

impl SyntheticProvider {
    pub fn new(end: NaiveDate) -> Self {
        Self { end }
    }

    /// Anchored at today's date (UTC).
    pub fn today() -> Self {
        Self::new(chrono::Utc::now().date_naive())
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn get_history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>, DataError> {
        let days = period_to_days(period)
            .ok_or_else(|| DataError::Other(format!("unsupported period token '{period}'")))?;
        let start = self.end - chrono::Duration::days(days);
        Ok(generate_bars(symbol, start, self.end))
    }

    fn get_info(&self, symbol: &str) -> Result<Metadata, DataError> {
        let mut meta = Metadata::new();
        meta.insert("shortName".into(), json!(format!("{symbol} (synthetic)")));
        meta.insert("sector".into(), json!("Synthetic"));
        meta.insert("currency".into(), json!("USD"));
        meta.insert("synthetic".into(), json!(true));
        Ok(meta)
    }
}

/// Random walk from 100.0 with ±3% daily moves, weekends skipped.
pub fn generate_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(PriceBar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
            adj_close: close,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SyntheticProvider {
        SyntheticProvider::new(NaiveDate::from_ymd_opt(2024, 6, 28).unwrap())
    }

    #[test]
    fn history_is_deterministic_per_symbol() {
        let a = provider().get_history("SPY", "3mo").unwrap();
        let b = provider().get_history("SPY", "3mo").unwrap();
        assert_eq!(a, b);
        assert!(a.len() > 55);
    }

    #[test]
    fn different_symbols_get_different_paths() {
        let spy = provider().get_history("SPY", "1mo").unwrap();
        let qqq = provider().get_history("QQQ", "1mo").unwrap();
        assert_eq!(spy.len(), qqq.len());
        assert_ne!(spy[0].close, qqq[0].close);
    }

    #[test]
    fn no_weekend_bars() {
        let bars = provider().get_history("IWM", "1mo").unwrap();
        assert!(bars
            .iter()
            .all(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn unknown_period_is_rejected() {
        assert!(provider().get_history("SPY", "fortnight").is_err());
    }

    #[test]
    fn metadata_is_tagged_synthetic() {
        let meta = provider().get_info("SPY").unwrap();
        assert_eq!(meta["synthetic"], json!(true));
    }
}
