//! Pipeline scenarios against fixed in-memory providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use forecastlab_core::data::{generate_bars, DataError, MarketDataProvider};
use forecastlab_core::domain::{Metadata, PriceBar};
use forecastlab_runner::{
    ArtifactVisualizer, MarkdownReporter, Pipeline, PipelineConfig, PipelineError, Stage,
    Visualizer,
};

/// Serves canned bars; anything else is "not found".
struct FixedProvider {
    bars: BTreeMap<String, Vec<PriceBar>>,
}

impl FixedProvider {
    fn new() -> Self {
        Self {
            bars: BTreeMap::new(),
        }
    }

    fn with(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    fn with_walk(self, symbol: &str) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
        self.with(symbol, generate_bars(symbol, start, end))
    }
}

impl MarketDataProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn get_history(&self, symbol: &str, _period: &str) -> Result<Vec<PriceBar>, DataError> {
        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }

    fn get_info(&self, symbol: &str) -> Result<Metadata, DataError> {
        let mut meta = Metadata::new();
        meta.insert("shortName".into(), serde_json::json!(format!("{symbol} Corp")));
        Ok(meta)
    }
}

struct NoopVisualizer;

impl Visualizer for NoopVisualizer {
    fn render(
        &self,
        _raw: &[forecastlab_core::domain::SeriesRecord],
        _predictions: &[forecastlab_core::domain::ForecastRecord],
    ) -> Vec<String> {
        Vec::new()
    }
}

fn flat_bars(days: usize, price: f64) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    (0..days)
        .map(|i| PriceBar {
            date: start + chrono::Duration::days(i as i64),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1_000_000,
            adj_close: price,
        })
        .collect()
}

/// Daily bars with closes from `close(i)`.
fn bars_from(days: usize, close: impl Fn(usize) -> f64) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    (0..days)
        .map(|i| {
            let c = close(i);
            PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c - 0.2,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 50_000_000,
                adj_close: c,
            }
        })
        .collect()
}

fn pipeline(provider: FixedProvider) -> Pipeline {
    Pipeline::new(
        Arc::new(provider),
        Arc::new(MarkdownReporter::new()),
        Arc::new(NoopVisualizer),
        PipelineConfig::default(),
    )
}

#[test]
fn ingest_only_run_is_idempotent() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL"));
    let first = p.run(&["AAPL"], "6mo", Stage::Ingested).unwrap();
    let second = p.run(&["AAPL"], "6mo", Stage::Ingested).unwrap();

    assert_eq!(first.completed_stage, Stage::Ingested);
    assert_eq!(first.raw_data, second.raw_data);
    assert_eq!(first.dataset_hash, second.dataset_hash);
    assert!(first.predictions.is_none());
    assert!(first.report_text.is_none());
}

#[test]
fn two_symbols_are_modeled() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL").with_walk("GOOGL"));
    let state = p.run(&["AAPL", "GOOGL"], "6mo", Stage::Modeled).unwrap();

    assert_eq!(state.completed_stage, Stage::Modeled);
    let predictions = state.predictions.as_ref().unwrap();
    assert_eq!(predictions.len(), 2);
    for prediction in predictions {
        assert_eq!(prediction.order.p, 1);
        assert_eq!(prediction.order.q, 1);
        assert_eq!(prediction.horizon.len(), 5);
        assert!(prediction.horizon.iter().all(|s| s.is_ordered()));
        let last = state.series(&prediction.symbol).unwrap().history.last().unwrap().close;
        assert_eq!(prediction.last_price, last);
    }
    assert!(state.report_text.is_none());
}

#[test]
fn flat_series_gives_flat_forecast() {
    let p = pipeline(FixedProvider::new().with("FLAT", flat_bars(40, 150.0)));
    let state = p.run(&["FLAT"], "3mo", Stage::Modeled).unwrap();

    let prediction = state.prediction("FLAT").unwrap();
    assert_eq!(prediction.order.d, 0);
    for step in &prediction.horizon {
        assert!((step.point_forecast - 150.0).abs() < 1e-6);
        assert!(step.is_ordered());
    }
}

#[test]
fn feedback_is_recorded_and_changes_the_report() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL"));
    let plain = p.run(&["AAPL"], "6mo", Stage::Reported).unwrap();
    let revised = p
        .apply_feedback(&["AAPL"], "6mo", "Earnings beat expectations last week")
        .unwrap();

    assert_eq!(revised.analyst_feedback.as_deref(), Some("Earnings beat expectations last week"));
    assert_ne!(plain.report_text, revised.report_text);
    assert!(revised
        .report_text
        .as_deref()
        .unwrap()
        .contains("Earnings beat expectations"));
}

#[test]
fn all_symbols_failing_is_an_error() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL"));
    let err = p.run(&["NOPE", "ALSO"], "6mo", Stage::Visualized).unwrap_err();
    assert!(matches!(err, PipelineError::NoDataAvailable { requested: 2 }));
}

#[test]
fn partial_failure_keeps_the_rest() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL"));
    let state = p.run(&["AAPL", "NOPE"], "6mo", Stage::Modeled).unwrap();
    assert_eq!(state.raw_data.len(), 1);
    assert_eq!(state.failed_symbols, vec!["NOPE".to_string()]);
    assert_eq!(state.predictions.as_ref().unwrap().len(), 1);
}

#[test]
fn failed_fetch_leaves_trending_symbol_modeled() {
    let aapl = bars_from(60, |i| 150.0 + 0.5 * i as f64 + 0.4 * (i as f64 * 1.7).sin());
    let final_close = aapl[59].close;
    let p = pipeline(FixedProvider::new().with("AAPL", aapl));
    let state = p.run(&["AAPL", "GOOGL"], "6mo", Stage::Modeled).unwrap();

    assert_eq!(state.completed_stage, Stage::Modeled);
    assert_eq!(state.raw_data.len(), 1);
    assert_eq!(state.failed_symbols, vec!["GOOGL".to_string()]);
    let predictions = state.predictions.as_ref().unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].symbol, "AAPL");
    assert_eq!(predictions[0].last_price, final_close);
    assert!(predictions[0].horizon.iter().all(|s| s.is_ordered()));
}

#[test]
fn alternating_noise_around_trend_is_modeled() {
    let aapl = bars_from(60, |i| 100.0 + i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 });
    let final_close = aapl[59].close;
    let p = pipeline(FixedProvider::new().with("AAPL", aapl));
    let state = p.run(&["AAPL", "GOOGL"], "6mo", Stage::Modeled).unwrap();

    let prediction = state.prediction("AAPL").unwrap();
    assert_eq!(prediction.order.d, 1);
    assert_eq!(prediction.last_price, final_close);
    assert_eq!(state.predictions.as_ref().unwrap().len(), 1);
}

#[test]
fn level_shift_is_modeled() {
    let step = bars_from(60, |i| if i < 30 { 100.0 } else { 101.0 });
    let p = pipeline(FixedProvider::new().with("STEP", step));
    let state = p.run(&["STEP"], "3mo", Stage::Modeled).unwrap();
    assert_eq!(state.prediction("STEP").unwrap().last_price, 101.0);
}

#[test]
fn feedback_on_unmodelable_series_is_reported() {
    let p = pipeline(FixedProvider::new().with("TINY", flat_bars(5, 10.0)));
    let state = p.apply_feedback(&["TINY"], "5d", "Thin trading").unwrap();
    assert_eq!(state.completed_stage, Stage::Reported);
    assert_eq!(state.predictions, Some(Vec::new()));
    assert!(state.report_text.as_deref().unwrap().contains("> Thin trading"));
}

#[test]
fn empty_request_stops_after_ingestion() {
    let p = pipeline(FixedProvider::new());
    let state = p.run::<&str>(&[], "6mo", Stage::Visualized).unwrap();
    assert_eq!(state.completed_stage, Stage::Ingested);
    assert!(state.raw_data.is_empty());
    assert!(state.predictions.is_none());
}

#[test]
fn short_series_skips_reporting() {
    // Too short to fit: modeled with no predictions, so no report.
    let p = pipeline(FixedProvider::new().with("TINY", flat_bars(5, 10.0)));
    let state = p.run(&["TINY"], "5d", Stage::Visualized).unwrap();
    assert_eq!(state.completed_stage, Stage::Modeled);
    assert_eq!(state.predictions, Some(Vec::new()));
    assert!(state.report_text.is_none());
}

#[test]
fn full_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let p = Pipeline::new(
        Arc::new(FixedProvider::new().with_walk("AAPL").with_walk("MSFT")),
        Arc::new(MarkdownReporter::new()),
        Arc::new(ArtifactVisualizer::new(dir.path())),
        PipelineConfig::default(),
    );
    let state = p.run(&["AAPL", "MSFT"], "6mo", Stage::Visualized).unwrap();

    assert_eq!(state.completed_stage, Stage::Visualized);
    let refs = state.visualization_refs.unwrap();
    assert_eq!(refs.len(), 5);
    assert!(refs.iter().all(|r| std::path::Path::new(r).exists()));
    assert!(dir.path().join("comparison.svg").exists());
    assert!(state.report_text.unwrap().contains("### AAPL Corp (AAPL)"));
}

#[test]
fn state_serializes_to_json() {
    let p = pipeline(FixedProvider::new().with_walk("AAPL"));
    let state = p.run(&["AAPL"], "6mo", Stage::Reported).unwrap();
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["completed_stage"], "reported");
    assert_eq!(json["raw_data"][0]["symbol"], "AAPL");
}

const UNIVERSE: [&str; 6] = ["AAPL", "GOOGL", "MSFT", "BAD1", "BAD2", "BAD3"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn ingested_symbols_are_a_subset_of_the_request(
        picks in proptest::sample::subsequence(UNIVERSE.to_vec(), 1..=UNIVERSE.len()),
    ) {
        let p = pipeline(
            FixedProvider::new().with_walk("AAPL").with_walk("GOOGL").with_walk("MSFT"),
        );
        match p.run(&picks, "6mo", Stage::Ingested) {
            Ok(state) => {
                prop_assert!(state.raw_data.len() <= picks.len());
                for record in &state.raw_data {
                    prop_assert!(picks.contains(&record.symbol.as_str()));
                }
                prop_assert_eq!(state.raw_data.len() + state.failed_symbols.len(), picks.len());
            }
            Err(PipelineError::NoDataAvailable { requested }) => {
                prop_assert_eq!(requested, picks.len());
                prop_assert!(picks.iter().all(|s| s.starts_with("BAD")));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
