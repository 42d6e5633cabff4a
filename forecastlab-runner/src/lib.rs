//! ForecastLab Runner — staged forecasting pipeline and its collaborators.
//!
//! This crate builds on `forecastlab-core` to provide:
//! - The workflow controller (`Init → Ingested → Modeled → Reported → Visualized`)
//! - Report generators (LLM chat completions, offline Markdown)
//! - Visualization artifacts (CSV tables, SVG charts)
//! - TOML pipeline configuration with environment overrides

pub mod config;
pub mod reporting;
pub mod visualize;
pub mod workflow;

pub use config::{ConfigError, LlmConfig, PipelineConfig};
pub use reporting::{
    failure_placeholder, LlmClient, LlmReporter, MarkdownReporter, MarketSnapshot, ReportError,
    ReportGenerator,
};
pub use visualize::{ArtifactVisualizer, Visualizer};
pub use workflow::{default_reporter, Pipeline, PipelineError, PipelineState, RunOverrides, Stage};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_is_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
    }

    #[test]
    fn state_is_send_sync() {
        assert_send::<PipelineState>();
        assert_sync::<PipelineState>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }

    #[test]
    fn collaborators_are_send_sync() {
        assert_send::<LlmReporter>();
        assert_sync::<LlmReporter>();
        assert_send::<MarkdownReporter>();
        assert_sync::<MarkdownReporter>();
        assert_send::<ArtifactVisualizer>();
        assert_sync::<ArtifactVisualizer>();
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }
}
