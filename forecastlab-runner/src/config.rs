//! Pipeline configuration: TOML file, environment overrides, validation.
//!
//! ```toml
//! symbols = ["AAPL", "MSFT"]
//! period = "1y"
//! horizon = 10
//!
//! [llm]
//! model = "llama3-70b-8192"
//! ```
//!
//! Every field has a default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use forecastlab_core::data::DEFAULT_WORKERS;
use forecastlab_core::model::{ForecastSettings, DEFAULT_CONFIDENCE, DEFAULT_HORIZON};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Chat-completions endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Empty means no key; the offline Markdown reporter is used instead.
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.5,
            base_url: GROQ_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub symbols: Vec<String>,
    /// Provider period token, e.g. "6mo".
    pub period: String,
    pub horizon: usize,
    pub confidence: f64,
    pub workers: usize,
    pub llm: LlmConfig,
    /// Where the visualizer writes artifacts.
    pub output_dir: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"]
                .into_iter()
                .map(String::from)
                .collect(),
            period: "6mo".to_string(),
            horizon: DEFAULT_HORIZON,
            confidence: DEFAULT_CONFIDENCE,
            workers: DEFAULT_WORKERS,
            llm: LlmConfig::default(),
            output_dir: "visualizations".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GROQ_API_KEY` and `LLM_MODEL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Environment lookup is injected so tests need not mutate process state.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GROQ_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.trim().is_empty() {
            return Err(ConfigError::Invalid("period must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        self.forecast_settings()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            horizon: self.horizon,
            confidence: self.confidence,
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.symbols.len(), 5);
        assert_eq!(config.period, "6mo");
        assert_eq!(config.horizon, 5);
        assert_eq!(config.llm.model, "llama3-8b-8192");
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = PipelineConfig::from_toml(
            r#"
symbols = ["SPY"]
horizon = 10

[llm]
temperature = 0.2
"#,
        )
        .unwrap();
        assert_eq!(config.symbols, vec!["SPY"]);
        assert_eq!(config.horizon, 10);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.base_url, GROQ_BASE_URL);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("horizon = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("confidence = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("workers = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("horizon = \"five\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_llm_settings() {
        let mut config = PipelineConfig::default();
        config.apply_env_from(|key| match key {
            "GROQ_API_KEY" => Some("gsk_test".into()),
            "LLM_MODEL" => Some("mixtral-8x7b".into()),
            _ => None,
        });
        assert!(config.llm.has_api_key());
        assert_eq!(config.llm.model, "mixtral-8x7b");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = PipelineConfig::default();
        config.apply_env_from(|_| Some("  ".into()));
        assert!(!config.llm.has_api_key());
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/forecastlab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn toml_roundtrip() {
        let config = PipelineConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }
}
