//! ForecastLab CLI — fetch market data, run the forecasting pipeline, and
//! regenerate reports with analyst feedback.
//!
//! Commands:
//! - `assets` — list the configured default symbols
//! - `fetch` — fetch history for symbols and print it as JSON
//! - `run` — run the pipeline up to a stage and print the results as JSON
//! - `feedback` — rerun through reporting with analyst notes
//!
//! JSON goes to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use forecastlab_core::data::{
    fetch_all, CircuitBreaker, MarketDataProvider, SyntheticProvider, YahooProvider,
};
use forecastlab_runner::{Pipeline, PipelineConfig, PipelineState, RunOverrides, Stage};

#[derive(Parser)]
#[command(
    name = "forecastlab",
    about = "ForecastLab CLI — ARIMA price forecasting pipeline"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// Symbols (e.g., AAPL MSFT). Defaults to the configured list.
    symbols: Vec<String>,

    /// Period token: 1mo, 3mo, 6mo, 1y, 2y, 5y, ytd, max.
    #[arg(long)]
    period: Option<String>,

    /// Use deterministic synthetic data instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured default symbols.
    Assets,
    /// Fetch price history and print it as JSON.
    Fetch {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Run the pipeline up to a stage.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Last stage to run: ingested, modeled, reported, visualized.
        #[arg(long, default_value = "visualized")]
        upto: String,

        /// Forecast horizon in trading days.
        #[arg(long)]
        horizon: Option<usize>,

        /// Confidence level for the forecast bands, in (0, 1).
        #[arg(long)]
        confidence: Option<f64>,

        /// Concurrent fetch workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Directory for charts and CSV tables.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Regenerate the report with analyst feedback.
    Feedback {
        #[command(flatten)]
        data: DataArgs,

        /// The analyst's notes.
        #[arg(long, required = true)]
        text: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Assets => print_json(&serde_json::json!({ "assets": config.symbols })),
        Commands::Fetch { data } => run_fetch(&config, data),
        Commands::Run {
            data,
            upto,
            horizon,
            confidence,
            workers,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir.display().to_string();
            }
            let upto: Stage = upto.parse()?;
            let overrides = RunOverrides {
                horizon,
                confidence,
                workers,
            };
            run_pipeline(config, data, upto, &overrides)
        }
        Commands::Feedback { data, text } => run_feedback(config, data, &text),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn build_provider(synthetic: bool) -> Result<Arc<dyn MarketDataProvider>> {
    if synthetic {
        return Ok(Arc::new(SyntheticProvider::today()));
    }
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(breaker).context("building Yahoo Finance provider")?;
    Ok(Arc::new(provider))
}

/// Symbols and period from the command line, falling back to the config.
fn resolve(config: &PipelineConfig, data: &DataArgs) -> (Vec<String>, String) {
    let symbols = if data.symbols.is_empty() {
        config.symbols.clone()
    } else {
        data.symbols.iter().map(|s| s.trim().to_uppercase()).collect()
    };
    let period = data.period.clone().unwrap_or_else(|| config.period.clone());
    (symbols, period)
}

fn run_fetch(config: &PipelineConfig, data: DataArgs) -> Result<()> {
    let (symbols, period) = resolve(config, &data);
    let provider = build_provider(data.synthetic)?;
    let report = fetch_all(provider.as_ref(), &symbols, &period, config.workers);

    if report.all_failed() {
        bail!("no data available for any of {} symbols", report.requested());
    }

    let mut records = report.records;
    records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    let summaries: Vec<_> = records.iter().map(|r| r.summary()).collect();
    print_json(&summaries)
}

fn run_pipeline(
    config: PipelineConfig,
    data: DataArgs,
    upto: Stage,
    overrides: &RunOverrides,
) -> Result<()> {
    let (symbols, period) = resolve(&config, &data);
    let provider = build_provider(data.synthetic)?;
    let pipeline = Pipeline::from_config(provider, config);
    tracing::info!(reporter = pipeline.reporter_name(), %upto, "starting pipeline");

    let state = pipeline.run_with(&symbols, &period, upto, overrides)?;
    print_json(&render_state(&state))
}

fn run_feedback(config: PipelineConfig, data: DataArgs, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("feedback text must not be empty");
    }
    let (symbols, period) = resolve(&config, &data);
    let provider = build_provider(data.synthetic)?;
    let pipeline = Pipeline::from_config(provider, config);

    let state = pipeline.apply_feedback(&symbols, &period, text)?;
    print_json(&render_state(&state))
}

/// Compact view of a run: forecasts in response shape, no raw bars.
fn render_state(state: &PipelineState) -> serde_json::Value {
    let forecasts: Vec<_> = state
        .predictions
        .iter()
        .flatten()
        .map(|p| p.to_response())
        .collect();
    serde_json::json!({
        "completed_stage": state.completed_stage,
        "dataset_hash": state.dataset_hash,
        "symbols": state.raw_data.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
        "failed_symbols": state.failed_symbols,
        "forecasts": forecasts,
        "report": state.report_text,
        "visualizations": state.visualization_refs,
        "analyst_feedback": state.analyst_feedback,
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{text}");
    Ok(())
}
