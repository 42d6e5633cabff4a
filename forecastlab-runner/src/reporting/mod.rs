//! Report generation collaborators.
//!
//! The workflow only sees the [`ReportGenerator`] trait. Two implementations:
//! - [`LlmReporter`]: OpenAI-compatible chat completions (Groq by default)
//! - [`MarkdownReporter`]: deterministic offline report from the same data

pub mod llm;
pub mod markdown;
pub mod snapshot;

pub use llm::{LlmClient, LlmReporter};
pub use markdown::MarkdownReporter;
pub use snapshot::{build_snapshots, ForecastDetail, MarketSnapshot};

use thiserror::Error;

use forecastlab_core::domain::{ForecastRecord, SeriesRecord};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("LLM API key is not configured (set GROQ_API_KEY)")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("rate limited by LLM provider")]
    RateLimited,
    #[error("LLM provider rejected the API key")]
    Authentication,
    #[error("unexpected LLM response: {0}")]
    BadResponse(String),
}

/// Produces narrative text from ingested series and their forecasts.
///
/// Implementations must tolerate empty `predictions`.
pub trait ReportGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
    ) -> Result<String, ReportError>;

    fn generate_with_feedback(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
        feedback: &str,
    ) -> Result<String, ReportError>;
}

/// Report for a run with nothing to analyze. Generators return this without
/// doing any work.
pub fn empty_report(feedback: Option<&str>) -> String {
    let mut out =
        String::from("# Market Analysis Report\n\nNo forecasts were available for this run.\n");
    append_feedback(&mut out, feedback);
    out
}

/// Quote the analyst's notes under their own heading.
pub(crate) fn append_feedback(out: &mut String, feedback: Option<&str>) {
    if let Some(feedback) = feedback {
        out.push_str("\n## Analyst Feedback\n\n");
        for line in feedback.lines() {
            out.push_str(&format!("> {line}\n"));
        }
    }
}

/// Report text substituted when a generator fails.
pub fn failure_placeholder(error: &ReportError) -> String {
    format!("Unable to generate analysis report due to an error: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_quotes_feedback() {
        let plain = empty_report(None);
        assert!(plain.starts_with("# Market Analysis Report"));
        assert!(plain.contains("No forecasts were available"));
        assert!(!plain.contains("Analyst Feedback"));

        let with = empty_report(Some("Rates decision Wednesday\nWatch guidance"));
        assert!(with.contains("## Analyst Feedback"));
        assert!(with.contains("> Rates decision Wednesday\n> Watch guidance\n"));
    }

    #[test]
    fn placeholder_embeds_error() {
        let text = failure_placeholder(&ReportError::RateLimited);
        assert_eq!(
            text,
            "Unable to generate analysis report due to an error: rate limited by LLM provider"
        );
    }
}
