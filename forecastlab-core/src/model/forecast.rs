//! Forecast engine: price column → order selection → ARIMA → repaired band.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::arima::{ArimaModel, FitError};
use super::order::select_order;
use super::repair::repair_band;
use crate::domain::{ForecastRecord, ForecastStep, SeriesRecord};

pub const DEFAULT_HORIZON: usize = 5;
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Horizon length and interval coverage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub horizon: usize,
    pub confidence: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl ForecastSettings {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.horizon == 0 {
            return Err(ForecastError::InvalidSettings(
                "horizon must be at least 1".into(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ForecastError::InvalidSettings(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("'{symbol}' has no usable close or adjusted-close prices")]
    DataShape { symbol: String },

    #[error("model fit failed for '{symbol}': {source}")]
    ModelFit {
        symbol: String,
        #[source]
        source: FitError,
    },

    #[error("invalid forecast settings: {0}")]
    InvalidSettings(String),
}

impl ForecastError {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::DataShape { symbol } | Self::ModelFit { symbol, .. } => Some(symbol),
            Self::InvalidSettings(_) => None,
        }
    }
}

/// Predictions for the symbols that could be modeled, plus a failure log.
#[derive(Debug, Clone, Default)]
pub struct ModelingReport {
    pub predictions: Vec<ForecastRecord>,
    pub failures: Vec<ForecastError>,
}

/// Forecast one series.
pub fn forecast(
    record: &SeriesRecord,
    settings: &ForecastSettings,
) -> Result<ForecastRecord, ForecastError> {
    settings.validate()?;

    let (dates, prices) = price_column(record).ok_or_else(|| ForecastError::DataShape {
        symbol: record.symbol.clone(),
    })?;
    let last_price = prices[prices.len() - 1];
    let last_date = record
        .last_date()
        .or_else(|| dates.last().copied())
        .ok_or_else(|| ForecastError::DataShape {
            symbol: record.symbol.clone(),
        })?;

    let order = select_order(&prices);
    let model = ArimaModel::fit(&prices, order).map_err(|source| ForecastError::ModelFit {
        symbol: record.symbol.clone(),
        source,
    })?;

    let mut path = model.forecast(settings.horizon, settings.confidence);
    repair_band(&mut path.point, &mut path.lower, &mut path.upper, last_price);

    let horizon = next_weekdays(last_date, settings.horizon)
        .into_iter()
        .enumerate()
        .map(|(i, date)| ForecastStep {
            step: i + 1,
            date,
            point_forecast: path.point[i],
            lower_bound: path.lower[i],
            upper_bound: path.upper[i],
        })
        .collect();

    tracing::info!(
        symbol = %record.symbol,
        %order,
        observations = prices.len(),
        aic = model.aic(),
        last_price,
        "forecast generated"
    );

    Ok(ForecastRecord {
        symbol: record.symbol.clone(),
        last_price,
        horizon,
        order,
        confidence: settings.confidence,
    })
}

/// Forecast every record; a failure drops only that symbol.
pub fn forecast_all(records: &[SeriesRecord], settings: &ForecastSettings) -> ModelingReport {
    let mut report = ModelingReport::default();
    for record in records {
        match forecast(record, settings) {
            Ok(prediction) => report.predictions.push(prediction),
            Err(e) => {
                tracing::warn!(symbol = %record.symbol, error = %e, "skipping symbol in modeling");
                report.failures.push(e);
            }
        }
    }
    tracing::info!(
        modeled = report.predictions.len(),
        failed = report.failures.len(),
        "modeling complete"
    );
    report
}

/// Finite closes, or finite adjusted closes when no close is usable.
fn price_column(record: &SeriesRecord) -> Option<(Vec<NaiveDate>, Vec<f64>)> {
    let pick = |value: fn(&crate::domain::PriceBar) -> f64| {
        let (dates, prices): (Vec<NaiveDate>, Vec<f64>) = record
            .history
            .iter()
            .filter(|b| value(b).is_finite())
            .map(|b| (b.date, value(b)))
            .unzip();
        (!prices.is_empty()).then_some((dates, prices))
    };
    pick(|b| b.close).or_else(|| {
        tracing::debug!(symbol = %record.symbol, "no usable close, falling back to adjusted close");
        pick(|b| b.adj_close)
    })
}

/// The `n` weekdays strictly after `after`.
pub fn next_weekdays(after: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut day = after;
    while out.len() < n {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
    }
    out
}
