//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over data sources (Yahoo Finance,
//! synthetic data, test stubs) so the pipeline can swap implementations.

use crate::domain::{Metadata, PriceBar};
use thiserror::Error;

/// Structured error types for provider operations.
///
/// These are designed to be displayable in CLI output and in logs.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider returned no bars for '{symbol}' over period '{period}'")]
    EmptyHistory { symbol: String, period: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data providers.
///
/// `period` is a provider-defined token such as `"6mo"` or `"1y"`; providers
/// reject tokens they do not understand. Implementations must be shareable
/// across the ingestion worker threads.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily OHLCV bars for `symbol` over `period`, ascending by date.
    fn get_history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>, DataError>;

    /// Descriptive fields for `symbol` (name, sector, currency, ...).
    fn get_info(&self, symbol: &str) -> Result<Metadata, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_history(&self, symbol: &str, period: &str) -> Result<Vec<PriceBar>, DataError> {
        (**self).get_history(symbol, period)
    }

    fn get_info(&self, symbol: &str) -> Result<Metadata, DataError> {
        (**self).get_info(symbol)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Number of calendar days a period token covers, for providers that work in
/// date ranges. Returns `None` for tokens outside the Yahoo vocabulary.
pub fn period_to_days(period: &str) -> Option<i64> {
    let days = match period {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 31,
        "3mo" => 92,
        "6mo" => 183,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1826,
        "10y" => 3652,
        "ytd" => {
            use chrono::Datelike;
            let today = chrono::Utc::now().date_naive();
            i64::from(today.ordinal())
        }
        "max" => 365 * 30,
        _ => return None,
    };
    Some(days)
}
