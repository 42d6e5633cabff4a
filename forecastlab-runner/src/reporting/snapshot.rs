//! Per-symbol market snapshot fed to report generators.

use serde::{Deserialize, Serialize};

use forecastlab_core::domain::{ForecastRecord, SeriesRecord};

/// Bars back for the "monthly" change.
const MONTH_BARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDetail {
    /// 1-based horizon day.
    pub day: usize,
    pub price: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

/// Summary of one symbol's recent history and forecast, values rounded to
/// two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub current_price: f64,
    pub daily_change_pct: f64,
    pub monthly_change_pct: f64,
    pub predicted_avg_price: f64,
    pub predicted_change_pct: f64,
    pub trading_volume: u64,
    pub forecast_details: Vec<ForecastDetail>,
}

impl MarketSnapshot {
    pub fn build(series: &SeriesRecord, prediction: &ForecastRecord) -> Self {
        let closes: Vec<f64> = series.closes().into_iter().filter(|c| c.is_finite()).collect();

        Self {
            symbol: series.symbol.clone(),
            name: series.name().to_string(),
            sector: series.sector().to_string(),
            industry: series.industry().to_string(),
            current_price: round2(prediction.last_price),
            daily_change_pct: round2(daily_change_pct(&closes)),
            monthly_change_pct: round2(monthly_change_pct(&closes)),
            predicted_avg_price: round2(prediction.mean_forecast()),
            predicted_change_pct: round2(prediction.expected_change_pct()),
            trading_volume: series.mean_volume(),
            forecast_details: prediction
                .horizon
                .iter()
                .map(|s| ForecastDetail {
                    day: s.step,
                    price: round2(s.point_forecast),
                    lower_ci: round2(s.lower_bound),
                    upper_ci: round2(s.upper_bound),
                })
                .collect(),
        }
    }
}

/// One snapshot per prediction that has matching raw data, in prediction order.
pub fn build_snapshots(raw: &[SeriesRecord], predictions: &[ForecastRecord]) -> Vec<MarketSnapshot> {
    predictions
        .iter()
        .filter_map(|p| {
            raw.iter()
                .find(|r| r.symbol == p.symbol)
                .map(|r| MarketSnapshot::build(r, p))
        })
        .collect()
}

fn daily_change_pct(closes: &[f64]) -> f64 {
    match closes {
        [.., prev, last] => pct_change(*prev, *last),
        _ => 0.0,
    }
}

/// Change over the last 30 bars, or since the first bar for shorter series.
fn monthly_change_pct(closes: &[f64]) -> f64 {
    let Some(&last) = closes.last() else {
        return 0.0;
    };
    let base = if closes.len() >= MONTH_BARS {
        closes[closes.len() - MONTH_BARS]
    } else {
        closes[0]
    };
    pct_change(base, last)
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        0.0
    } else {
        (to - from) / from * 100.0
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecastlab_core::domain::{ForecastStep, Metadata, ModelOrder, PriceBar};
    use serde_json::json;

    fn series(closes: &[f64]) -> SeriesRecord {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 100,
                adj_close: c,
            })
            .collect();
        let mut meta = Metadata::new();
        meta.insert("shortName".into(), json!("Apple Inc."));
        meta.insert("sector".into(), json!("Technology"));
        SeriesRecord::new("AAPL", bars, meta)
    }

    fn prediction(last: f64, points: &[f64]) -> ForecastRecord {
        ForecastRecord {
            symbol: "AAPL".into(),
            last_price: last,
            horizon: points
                .iter()
                .enumerate()
                .map(|(i, &p)| ForecastStep {
                    step: i + 1,
                    date: NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap(),
                    point_forecast: p,
                    lower_bound: p - 2.0,
                    upper_bound: p + 2.0,
                })
                .collect(),
            order: ModelOrder::new(1, 1, 1),
            confidence: 0.95,
        }
    }

    #[test]
    fn changes_use_recent_bars() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let snap = MarketSnapshot::build(&series(&closes), &prediction(139.0, &[140.0, 142.0]));
        // daily: 138 -> 139
        assert_eq!(snap.daily_change_pct, round2(1.0 / 138.0 * 100.0));
        // monthly: closes[10] = 110 -> 139
        assert_eq!(snap.monthly_change_pct, round2(29.0 / 110.0 * 100.0));
        assert_eq!(snap.predicted_avg_price, 141.0);
        assert_eq!(snap.name, "Apple Inc.");
        assert_eq!(snap.industry, "Unknown");
        assert_eq!(snap.forecast_details[0].day, 1);
    }

    #[test]
    fn short_history_uses_first_bar_for_monthly_change() {
        let snap = MarketSnapshot::build(&series(&[50.0, 55.0, 60.0]), &prediction(60.0, &[61.0]));
        assert_eq!(snap.monthly_change_pct, 20.0);
    }

    #[test]
    fn single_bar_has_zero_daily_change() {
        let snap = MarketSnapshot::build(&series(&[50.0]), &prediction(50.0, &[50.0]));
        assert_eq!(snap.daily_change_pct, 0.0);
    }

    #[test]
    fn predictions_without_raw_data_are_skipped() {
        let mut other = prediction(10.0, &[11.0]);
        other.symbol = "MSFT".into();
        let snaps = build_snapshots(&[series(&[10.0, 11.0])], &[other, prediction(11.0, &[12.0])]);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].symbol, "AAPL");
    }
}
