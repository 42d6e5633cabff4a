//! Ingestion coordinator — concurrent, best-effort fetch across symbols.
//!
//! Each symbol is fetched on a dedicated rayon pool capped at `workers`
//! threads; requests beyond the cap queue behind it. Every task yields a
//! `Result`, and failures are split into a side log instead of aborting the
//! batch. Result order is not part of the contract: index by symbol.

use rayon::prelude::*;
use std::collections::HashSet;

use super::fetcher::{fetch_series, FetchFailure};
use super::provider::MarketDataProvider;
use crate::domain::SeriesRecord;

/// Default worker cap, sized for provider rate limits.
pub const DEFAULT_WORKERS: usize = 5;

/// Outcome of a batch fetch.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub records: Vec<SeriesRecord>,
    pub failures: Vec<FetchFailure>,
}

impl IngestionReport {
    pub fn requested(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn all_failed(&self) -> bool {
        self.records.is_empty() && !self.failures.is_empty()
    }

    pub fn record(&self, symbol: &str) -> Option<&SeriesRecord> {
        self.records.iter().find(|r| r.symbol == symbol)
    }
}

/// Fetch every symbol in `symbols` concurrently and keep the successes.
///
/// Duplicates are collapsed. Empty input yields an empty report.
pub fn fetch_all<S: AsRef<str>>(
    provider: &dyn MarketDataProvider,
    symbols: &[S],
    period: &str,
    workers: usize,
) -> IngestionReport {
    let unique = dedup_symbols(symbols);
    if unique.is_empty() {
        return IngestionReport::default();
    }

    let workers = workers.max(1);
    tracing::info!(
        symbols = unique.len(),
        workers,
        %period,
        "starting ingestion"
    );

    let fetch_one = |symbol: &&str| fetch_series(provider, symbol, period);

    let results: Vec<Result<SeriesRecord, FetchFailure>> =
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| unique.par_iter().map(fetch_one).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "could not build worker pool, fetching sequentially");
                unique.iter().map(fetch_one).collect()
            }
        };

    let mut report = IngestionReport::default();
    for result in results {
        match result {
            Ok(record) => {
                tracing::debug!(symbol = %record.symbol, bars = record.history.len(), "fetched");
                report.records.push(record);
            }
            Err(failure) => {
                tracing::warn!(symbol = %failure.symbol, error = %failure.cause, "dropping symbol");
                report.failures.push(failure);
            }
        }
    }

    tracing::info!(
        succeeded = report.records.len(),
        failed = report.failures.len(),
        "ingestion complete"
    );
    report
}

fn dedup_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .collect()
}
