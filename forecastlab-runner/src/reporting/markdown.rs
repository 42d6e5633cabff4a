//! Offline Markdown report, used when no LLM key is configured.

use forecastlab_core::domain::{ForecastRecord, SeriesRecord};

use super::snapshot::{build_snapshots, MarketSnapshot};
use super::{append_feedback, empty_report, ReportError, ReportGenerator};

/// Percent move treated as flat in the outlook line.
const NEUTRAL_BAND_PCT: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct MarkdownReporter;

impl MarkdownReporter {
    pub fn new() -> Self {
        Self
    }

    fn render(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
        feedback: Option<&str>,
    ) -> String {
        let snapshots = build_snapshots(raw, predictions);
        if snapshots.is_empty() {
            return empty_report(feedback);
        }

        let rising = snapshots.iter().filter(|s| s.predicted_change_pct > 0.0).count();
        let avg_change =
            snapshots.iter().map(|s| s.predicted_change_pct).sum::<f64>() / snapshots.len() as f64;
        let mut out = format!(
            "# Market Analysis Report\n\n\
## Market Overview\n\n\
{} of {} assets are forecast to rise; the average predicted move is **{:+.2}%**.\n\n",
            rising,
            snapshots.len(),
            avg_change
        );

        out.push_str("| Symbol | Price | 1D % | 1M % | Forecast Avg | Forecast % |\n");
        out.push_str("|---|---:|---:|---:|---:|---:|\n");
        for s in &snapshots {
            out.push_str(&format!(
                "| {} | {:.2} | {:+.2} | {:+.2} | {:.2} | {:+.2} |\n",
                s.symbol,
                s.current_price,
                s.daily_change_pct,
                s.monthly_change_pct,
                s.predicted_avg_price,
                s.predicted_change_pct
            ));
        }

        out.push_str("\n## Individual Stock Analysis\n\n");
        for (s, p) in snapshots.iter().zip(matching(predictions, &snapshots)) {
            write_symbol_section(&mut out, s, p);
        }

        append_feedback(&mut out, feedback);
        out
    }
}

fn matching<'a>(
    predictions: &'a [ForecastRecord],
    snapshots: &'a [MarketSnapshot],
) -> impl Iterator<Item = Option<&'a ForecastRecord>> + 'a {
    snapshots
        .iter()
        .map(move |s| predictions.iter().find(|p| p.symbol == s.symbol))
}

fn write_symbol_section(out: &mut String, s: &MarketSnapshot, p: Option<&ForecastRecord>) {
    out.push_str(&format!(
        "### {} ({})\n\n\
- Sector: {} / {}\n\
- Last close **{:.2}**, {:+.2}% on the day, {:+.2}% over the month\n\
- Average daily volume: `{}`\n",
        s.name,
        s.symbol,
        s.sector,
        s.industry,
        s.current_price,
        s.daily_change_pct,
        s.monthly_change_pct,
        s.trading_volume
    ));
    if let Some(p) = p {
        out.push_str(&format!(
            "- Model: `ARIMA{}` with {:.0}% intervals\n",
            p.order,
            p.confidence * 100.0
        ));
    }
    if let (Some(first), Some(last)) = (s.forecast_details.first(), s.forecast_details.last()) {
        out.push_str(&format!(
            "- Day {} range {:.2} to {:.2}; day {} range {:.2} to {:.2}\n",
            first.day, first.lower_ci, first.upper_ci, last.day, last.lower_ci, last.upper_ci
        ));
    }
    out.push_str(&format!("- Outlook: **{}**\n\n", outlook(s.predicted_change_pct)));
}

fn outlook(change_pct: f64) -> &'static str {
    if change_pct > NEUTRAL_BAND_PCT {
        "bullish"
    } else if change_pct < -NEUTRAL_BAND_PCT {
        "bearish"
    } else {
        "neutral"
    }
}

impl ReportGenerator for MarkdownReporter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn generate(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
    ) -> Result<String, ReportError> {
        Ok(self.render(raw, predictions, None))
    }

    fn generate_with_feedback(
        &self,
        raw: &[SeriesRecord],
        predictions: &[ForecastRecord],
        feedback: &str,
    ) -> Result<String, ReportError> {
        Ok(self.render(raw, predictions, Some(feedback)))
    }
}
