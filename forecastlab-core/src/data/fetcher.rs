//! Series fetcher: one symbol's history and metadata from a provider.

use thiserror::Error;

use super::provider::{DataError, MarketDataProvider};
use crate::domain::{Metadata, SeriesRecord};

/// A single symbol could not be fetched.
#[derive(Debug, Clone, Error)]
#[error("failed to fetch '{symbol}': {cause}")]
pub struct FetchFailure {
    pub symbol: String,
    pub cause: DataError,
}

impl FetchFailure {
    pub fn new(symbol: impl Into<String>, cause: DataError) -> Self {
        Self {
            symbol: symbol.into(),
            cause,
        }
    }
}

/// Fetch history and metadata for `symbol` over `period`.
///
/// The period token is passed through untouched; the provider rejects
/// malformed ones. An empty history is a failure. A metadata lookup failure
/// only costs the descriptive fields, not the symbol.
pub fn fetch_series(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    period: &str,
) -> Result<SeriesRecord, FetchFailure> {
    tracing::info!(%symbol, %period, provider = provider.name(), "fetching series");

    let mut history = provider
        .get_history(symbol, period)
        .map_err(|e| FetchFailure::new(symbol, e))?;

    history.retain(|b| !b.is_void());
    if history.is_empty() {
        return Err(FetchFailure::new(
            symbol,
            DataError::EmptyHistory {
                symbol: symbol.to_string(),
                period: period.to_string(),
            },
        ));
    }
    history.sort_by_key(|b| b.date);

    let metadata = match provider.get_info(symbol) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "metadata unavailable, continuing without it");
            Metadata::new()
        }
    };

    Ok(SeriesRecord::new(symbol, history, metadata))
}
