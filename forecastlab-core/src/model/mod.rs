//! Statistical modeling: stationarity testing, order selection, ARIMA
//! estimation and the per-symbol forecast engine.

pub mod arima;
pub mod forecast;
pub mod ols;
pub mod optimize;
pub mod order;
pub mod repair;
pub mod stationarity;

pub use arima::{ArimaModel, FitError, ForecastPath, MIN_FIT_OBS};
pub use forecast::{
    forecast, forecast_all, next_weekdays, ForecastError, ForecastSettings, ModelingReport,
    DEFAULT_CONFIDENCE, DEFAULT_HORIZON,
};
pub use order::select_order;
pub use stationarity::{adf_test, StationarityResult};
