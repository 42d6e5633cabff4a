//! LLM-backed report generation over an OpenAI-compatible chat API.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use forecastlab_core::domain::{ForecastRecord, SeriesRecord};

use super::snapshot::{build_snapshots, MarketSnapshot};
use super::{empty_report, ReportError, ReportGenerator};
use crate::config::LlmConfig;

/// Blocking chat-completions client. Build once, share via `Arc`.
#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::blocking::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Fails with [`ReportError::MissingApiKey`] when no key is configured.
    pub fn new(config: LlmConfig) -> Result<Self, ReportError> {
        if !config.has_api_key() {
            return Err(ReportError::MissingApiKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReportError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// One system + user exchange; returns the assistant message text.
    pub fn chat(&self, system: &str, user: &str) -> Result<String, ReportError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
        });

        tracing::info!(model = %self.config.model, "requesting LLM report");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| ReportError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ReportError::RateLimited);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ReportError::Authentication);
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ReportError::Http(format!("status {status}: {text}")));
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|e| ReportError::BadResponse(e.to_string()))?;
        parse_completion(&payload)
    }
}

/// Extract `choices[0].message.content`.
fn parse_completion(payload: &serde_json::Value) -> Result<String, ReportError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ReportError::BadResponse("missing choices[0].message.content".into()))
}

const REPORT_SECTIONS: &str = "\
The report should include:

1. Market Overview: overall trends and patterns across the provided stocks.
2. Individual Stock Analysis: for each stock, current performance, technical patterns, \
an assessment of the ARIMA forecast{FEEDBACK_ITEM}, and potential risks and opportunities.
3. Sector Comparison: compare performance across sectors where applicable.
4. Investment Recommendations: a bullish or bearish outlook grounded in the data{FEEDBACK_REC}.
5. Key Metrics to Watch: what investors should monitor next.

Use specific numbers and percentages from the data. Format the response as Markdown: \
# and ## headings, **bold** key figures, bullet lists, and Markdown tables where useful.";

pub(crate) fn system_prompt(with_feedback: bool) -> String {
    let intro = if with_feedback {
        "You are an expert financial analyst specializing in stock market analysis and forecasting. \
Generate a market analysis report from the provided financial data, ARIMA model predictions, \
and expert analyst feedback. Aim for 600-800 words."
    } else {
        "You are an expert financial analyst specializing in stock market analysis and forecasting. \
Generate a market analysis report from the provided financial data and ARIMA model predictions. \
Aim for 500-700 words."
    };
    let sections = REPORT_SECTIONS
        .replace(
            "{FEEDBACK_ITEM}",
            if with_feedback { ", how the analyst feedback applies" } else { "" },
        )
        .replace(
            "{FEEDBACK_REC}",
            if with_feedback { " and the analyst feedback" } else { "" },
        );
    format!("{intro}\n\n{sections}")
}

pub(crate) fn user_prompt(snapshots: &[MarketSnapshot], feedback: Option<&str>) -> String {
    let data = serde_json::to_string_pretty(snapshots).unwrap_or_else(|_| "[]".to_string());
    match feedback {
        Some(feedback) => format!(
            "Generate a market analysis report from the following stock data, ARIMA predictions, \
and analyst feedback.\n\nFINANCIAL DATA:\n{data}\n\nANALYST FEEDBACK:\n{feedback}\n\n\
Focus on key trends, incorporate the analyst's insights, and give actionable recommendations."
        ),
        None => format!(
            "Generate a market analysis report from the following stock data and ARIMA predictions.\
\n\nFINANCIAL DATA:\n{data}\n\n\
Focus on key trends and technical patterns, and give actionable recommendations."
        ),
    }
}

/// [`ReportGenerator`] that sends market snapshots to an LLM.
#[derive(Debug, Clone)]
pub struct LlmReporter {
    client: Arc<LlmClient>,
}

impl LlmReporter {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    fn run(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
        feedback: Option<&str>,
    ) -> Result<String, ReportError> {
        let snapshots = build_snapshots(raw, predictions);
        if snapshots.is_empty() {
            tracing::info!("no forecasts to analyze, skipping LLM request");
            return Ok(empty_report(feedback));
        }
        let system = system_prompt(feedback.is_some());
        let user = user_prompt(&snapshots, feedback);
        self.client.chat(&system, &user)
    }
}

impl ReportGenerator for LlmReporter {
    fn name(&self) -> &str {
        "llm"
    }

    fn generate(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
    ) -> Result<String, ReportError> {
        self.run(raw, predictions, None)
    }

    fn generate_with_feedback(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
        feedback: &str,
    ) -> Result<String, ReportError> {
        self.run(raw, predictions, Some(feedback))
    }
}
