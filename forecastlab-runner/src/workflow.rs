//! Workflow controller — the staged pipeline from ingestion to visualization.
//!
//! ```text
//! Init ──► Ingested ──► Modeled ──► Reported ──► Visualized
//!           always      raw data     predictions   upto == Visualized
//! ```
//!
//! Each call to [`Pipeline::run`] starts from scratch; nothing is cached
//! between calls. Per-symbol failures (fetch, fit) are absorbed and logged;
//! only a request where every symbol failed surfaces as an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use forecastlab_core::data::{fetch_all, MarketDataProvider};
use forecastlab_core::domain::{ForecastRecord, SeriesRecord};
use forecastlab_core::model::{forecast_all, ForecastSettings};

use crate::config::{LlmConfig, PipelineConfig};
use crate::reporting::{failure_placeholder, LlmClient, LlmReporter, MarkdownReporter, ReportGenerator};
use crate::visualize::{ArtifactVisualizer, Visualizer};

/// Pipeline stages, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Ingested,
    Modeled,
    Reported,
    Visualized,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Init,
        Stage::Ingested,
        Stage::Modeled,
        Stage::Reported,
        Stage::Visualized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Ingested => "ingested",
            Stage::Modeled => "modeled",
            Stage::Reported => "reported",
            Stage::Visualized => "visualized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "init" => Ok(Stage::Init),
            "ingested" | "data_ingestion" | "data_preprocessing" => Ok(Stage::Ingested),
            "modeled" | "predictive_modeling" => Ok(Stage::Modeled),
            "reported" | "report_generation" => Ok(Stage::Reported),
            "visualized" | "visualization" => Ok(Stage::Visualized),
            _ => Err(PipelineError::UnknownStage(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no data available: all {requested} requested symbols failed to fetch")]
    NoDataAvailable { requested: usize },
    #[error("invalid run settings: {0}")]
    InvalidSettings(String),
    #[error("unknown stage '{0}'")]
    UnknownStage(String),
}

/// Everything one run produced. Later fields are `None` when their stage
/// did not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Successfully fetched series, sorted by symbol.
    pub raw_data: Vec<SeriesRecord>,
    pub failed_symbols: Vec<String>,
    pub predictions: Option<Vec<ForecastRecord>>,
    pub report_text: Option<String>,
    pub visualization_refs: Option<Vec<String>>,
    pub analyst_feedback: Option<String>,
    pub completed_stage: Stage,
    /// BLAKE3 over the ingested bars; equal inputs give equal hashes.
    pub dataset_hash: String,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            raw_data: Vec::new(),
            failed_symbols: Vec::new(),
            predictions: None,
            report_text: None,
            visualization_refs: None,
            analyst_feedback: None,
            completed_stage: Stage::Init,
            dataset_hash: String::new(),
        }
    }

    pub fn series(&self, symbol: &str) -> Option<&SeriesRecord> {
        self.raw_data.iter().find(|r| r.symbol == symbol)
    }

    pub fn prediction(&self, symbol: &str) -> Option<&ForecastRecord> {
        self.predictions
            .as_deref()
            .and_then(|p| p.iter().find(|r| r.symbol == symbol))
    }
}

/// Per-call overrides layered over [`PipelineConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOverrides {
    pub horizon: Option<usize>,
    pub confidence: Option<f64>,
    pub workers: Option<usize>,
}

/// Owns the collaborators; each run builds its own state.
pub struct Pipeline {
    provider: Arc<dyn MarketDataProvider>,
    reporter: Arc<dyn ReportGenerator>,
    visualizer: Arc<dyn Visualizer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        reporter: Arc<dyn ReportGenerator>,
        visualizer: Arc<dyn Visualizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            reporter,
            visualizer,
            config,
        }
    }

    /// Reporter chosen from the LLM config, artifact visualizer under
    /// `config.output_dir`.
    pub fn from_config(provider: Arc<dyn MarketDataProvider>, config: PipelineConfig) -> Self {
        let reporter = default_reporter(&config.llm);
        let visualizer = Arc::new(ArtifactVisualizer::new(&config.output_dir));
        Self::new(provider, reporter, visualizer, config)
    }

    pub fn reporter_name(&self) -> &str {
        self.reporter.name()
    }

    pub fn run<S: AsRef<str>>(
        &self,
        symbols: &[S],
        period: &str,
        upto: Stage,
    ) -> Result<PipelineState, PipelineError> {
        self.run_with(symbols, period, upto, &RunOverrides::default())
    }

    pub fn run_with<S: AsRef<str>>(
        &self,
        symbols: &[S],
        period: &str,
        upto: Stage,
        overrides: &RunOverrides,
    ) -> Result<PipelineState, PipelineError> {
        let (settings, workers) = self.resolve(overrides)?;
        let mut state = PipelineState::new();

        // Ingestion always runs.
        let report = fetch_all(self.provider.as_ref(), symbols, period, workers);
        if report.all_failed() {
            return Err(PipelineError::NoDataAvailable {
                requested: report.requested(),
            });
        }
        state.raw_data = report.records;
        state.raw_data.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        state.failed_symbols = report.failures.into_iter().map(|f| f.symbol).collect();
        state.failed_symbols.sort();
        state.dataset_hash = dataset_hash(&state.raw_data);
        state.completed_stage = Stage::Ingested;
        tracing::info!(
            symbols = state.raw_data.len(),
            failed = state.failed_symbols.len(),
            hash = %&state.dataset_hash[..12],
            "stage ingested"
        );

        if state.raw_data.is_empty() || upto < Stage::Modeled {
            return Ok(state);
        }

        let modeling = forecast_all(&state.raw_data, &settings);
        for failure in &modeling.failures {
            tracing::warn!(error = %failure, "no forecast for symbol");
        }
        let has_predictions = !modeling.predictions.is_empty();
        state.predictions = Some(modeling.predictions);
        state.completed_stage = Stage::Modeled;
        tracing::info!(
            forecasts = state.predictions.as_ref().map_or(0, Vec::len),
            "stage modeled"
        );

        if !has_predictions || upto < Stage::Reported {
            return Ok(state);
        }

        let predictions = state.predictions.as_deref().unwrap_or_default();
        let text = match self.reporter.generate(&state.raw_data, predictions) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(reporter = self.reporter.name(), error = %e, "report generation failed");
                failure_placeholder(&e)
            }
        };
        state.report_text = Some(text);
        state.completed_stage = Stage::Reported;
        tracing::info!(reporter = self.reporter.name(), "stage reported");

        if upto < Stage::Visualized {
            return Ok(state);
        }

        let refs = self.visualizer.render(&state.raw_data, predictions);
        state.visualization_refs = Some(refs);
        state.completed_stage = Stage::Visualized;
        tracing::info!("stage visualized");

        Ok(state)
    }

    /// Fresh run through `Reported`, then a report regenerated with the
    /// analyst's notes. The feedback is recorded on the returned state.
    pub fn apply_feedback<S: AsRef<str>>(
        &self,
        symbols: &[S],
        period: &str,
        feedback: &str,
    ) -> Result<PipelineState, PipelineError> {
        let mut state = self.run(symbols, period, Stage::Reported)?;

        let predictions = state.predictions.as_deref().unwrap_or_default();
        let text = match self
            .reporter
            .generate_with_feedback(&state.raw_data, predictions, feedback)
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(reporter = self.reporter.name(), error = %e, "feedback report failed");
                failure_placeholder(&e)
            }
        };
        state.report_text = Some(text);
        state.analyst_feedback = Some(feedback.to_string());
        // A written report means at least Reported, even with nothing modeled.
        state.predictions.get_or_insert_with(Vec::new);
        state.completed_stage = state.completed_stage.max(Stage::Reported);
        tracing::info!(chars = feedback.len(), "feedback applied");
        Ok(state)
    }

    fn resolve(&self, overrides: &RunOverrides) -> Result<(ForecastSettings, usize), PipelineError> {
        let settings = ForecastSettings {
            horizon: overrides.horizon.unwrap_or(self.config.horizon),
            confidence: overrides.confidence.unwrap_or(self.config.confidence),
        };
        settings
            .validate()
            .map_err(|e| PipelineError::InvalidSettings(e.to_string()))?;
        let workers = overrides.workers.unwrap_or(self.config.workers);
        if workers == 0 {
            return Err(PipelineError::InvalidSettings(
                "workers must be at least 1".into(),
            ));
        }
        Ok((settings, workers))
    }
}

/// LLM reporter when a key is configured, offline Markdown otherwise.
pub fn default_reporter(llm: &LlmConfig) -> Arc<dyn ReportGenerator> {
    match LlmClient::new(llm.clone()) {
        Ok(client) => Arc::new(LlmReporter::new(Arc::new(client))),
        Err(e) => {
            tracing::info!(reason = %e, "using offline markdown reporter");
            Arc::new(MarkdownReporter::new())
        }
    }
}

/// Deterministic BLAKE3 hash over every bar, in symbol order.
fn dataset_hash(records: &[SeriesRecord]) -> String {
    let mut sorted: Vec<&SeriesRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let mut hasher = blake3::Hasher::new();
    for record in sorted {
        hasher.update(record.symbol.as_bytes());
        for bar in &record.history {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
            hasher.update(&bar.adj_close.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
