//! ForecastLab Core — market data ingestion and ARIMA price forecasting.
//!
//! This crate contains:
//! - Domain types (price bars, series records, model orders, forecasts)
//! - Market data providers (Yahoo chart API, deterministic synthetic data)
//!   behind a circuit breaker
//! - Concurrent, failure-tolerant ingestion across symbols
//! - Augmented Dickey–Fuller stationarity test and order selection
//! - ARIMA estimation and forecasting with confidence bands

pub mod data;
pub mod domain;
pub mod model;
