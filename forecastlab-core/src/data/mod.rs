//! Market data: provider abstraction, Yahoo and synthetic providers, and the
//! fetch/ingest layer on top of them.

pub mod circuit_breaker;
pub mod fetcher;
pub mod ingest;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use fetcher::{fetch_series, FetchFailure};
pub use ingest::{fetch_all, IngestionReport, DEFAULT_WORKERS};
pub use provider::{period_to_days, DataError, MarketDataProvider};
pub use synthetic::{generate_bars, SyntheticProvider};
pub use yahoo::YahooProvider;
