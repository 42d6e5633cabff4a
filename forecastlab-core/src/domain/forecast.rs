//! Model order and forecast output types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ARIMA order `(p, d, q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    /// Autoregressive lag count.
    pub p: usize,
    /// Differencing order, 0..=2.
    pub d: usize,
    /// Moving-average lag count.
    pub q: usize,
}

impl ModelOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// One step of a forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    /// 1-based offset from the last observed bar.
    pub step: usize,
    /// Trading day this step forecasts.
    pub date: NaiveDate,
    pub point_forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastStep {
    pub fn is_ordered(&self) -> bool {
        self.lower_bound <= self.point_forecast && self.point_forecast <= self.upper_bound
    }
}

/// Forecast for one successfully modeled symbol.
///
/// `horizon.len()` equals the configured horizon and every step satisfies
/// `lower_bound <= point_forecast <= upper_bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub symbol: String,
    pub last_price: f64,
    pub horizon: Vec<ForecastStep>,
    pub order: ModelOrder,
    /// Two-sided interval coverage, e.g. 0.95.
    pub confidence: f64,
}

impl ForecastRecord {
    /// Mean of the point forecasts, or `last_price` for an empty horizon.
    pub fn mean_forecast(&self) -> f64 {
        if self.horizon.is_empty() {
            return self.last_price;
        }
        self.horizon.iter().map(|s| s.point_forecast).sum::<f64>() / self.horizon.len() as f64
    }

    /// Percent change from `last_price` to the mean forecast.
    pub fn expected_change_pct(&self) -> f64 {
        if self.last_price == 0.0 {
            return 0.0;
        }
        (self.mean_forecast() - self.last_price) / self.last_price * 100.0
    }

    /// Flattened response shape used by the CLI's JSON output.
    pub fn to_response(&self) -> ForecastResponse {
        ForecastResponse {
            symbol: self.symbol.clone(),
            last_price: self.last_price,
            forecast: self
                .horizon
                .iter()
                .enumerate()
                .map(|(day, s)| ForecastPoint {
                    day,
                    date: s.date,
                    forecast: s.point_forecast,
                    lower_ci: s.lower_bound,
                    upper_ci: s.upper_bound,
                })
                .collect(),
            model_info: ModelInfo {
                order: [self.order.p, self.order.d, self.order.q],
                confidence: self.confidence,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 0-based horizon index.
    pub day: usize,
    pub date: NaiveDate,
    pub forecast: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub order: [usize; 3],
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub symbol: String,
    pub last_price: f64,
    pub forecast: Vec<ForecastPoint>,
    pub model_info: ModelInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, point: f64) -> ForecastStep {
        ForecastStep {
            step: n,
            date: NaiveDate::from_ymd_opt(2024, 1, 1 + n as u32).unwrap(),
            point_forecast: point,
            lower_bound: point - 1.0,
            upper_bound: point + 1.0,
        }
    }

    #[test]
    fn order_displays_as_tuple() {
        assert_eq!(ModelOrder::new(1, 2, 1).to_string(), "(1,2,1)");
    }

    #[test]
    fn expected_change_uses_mean_forecast() {
        let rec = ForecastRecord {
            symbol: "SPY".into(),
            last_price: 100.0,
            horizon: vec![step(1, 101.0), step(2, 103.0)],
            order: ModelOrder::new(1, 1, 1),
            confidence: 0.95,
        };
        assert!((rec.mean_forecast() - 102.0).abs() < 1e-12);
        assert!((rec.expected_change_pct() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn response_uses_zero_based_days() {
        let rec = ForecastRecord {
            symbol: "QQQ".into(),
            last_price: 50.0,
            horizon: vec![step(1, 51.0), step(2, 52.0)],
            order: ModelOrder::new(1, 0, 1),
            confidence: 0.9,
        };
        let resp = rec.to_response();
        assert_eq!(resp.forecast[0].day, 0);
        assert_eq!(resp.forecast[1].forecast, 52.0);
        assert_eq!(resp.model_info.order, [1, 0, 1]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["forecast"][0]["lower_ci"], serde_json::json!(50.0));
    }

    #[test]
    fn step_ordering_check() {
        let mut s = step(1, 10.0);
        assert!(s.is_ordered());
        s.lower_bound = 11.0;
        assert!(!s.is_ordered());
    }
}
