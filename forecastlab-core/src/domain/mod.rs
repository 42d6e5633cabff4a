//! Domain types for ForecastLab

pub mod forecast;
pub mod series;

pub use forecast::{
    ForecastPoint, ForecastRecord, ForecastResponse, ForecastStep, ModelInfo, ModelOrder,
};
pub use series::{DataPoint, Metadata, PriceBar, SeriesRecord, SeriesSummary};
