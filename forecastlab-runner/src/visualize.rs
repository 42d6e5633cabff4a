//! Visualization artifacts — CSV tables and SVG charts on disk.
//!
//! Per forecast symbol, under the output directory:
//! - `<SYM>_forecast.csv` — recent history plus the forecast band
//! - `<SYM>_forecast.svg` — price line with shaded forecast band
//!
//! Plus `comparison.svg` (closes rebased to 100) when two or more symbols
//! were forecast. Rendering never fails: problems are logged and the
//! affected artifact is skipped.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

use forecastlab_core::domain::{ForecastRecord, SeriesRecord};

/// History bars shown ahead of the forecast.
pub const DEFAULT_HISTORY_TAIL: usize = 60;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const PAD: f64 = 40.0;
const PALETTE: [&str; 6] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];

/// Renders artifacts and returns their paths (possibly empty).
pub trait Visualizer: Send + Sync {
    fn render(&self, raw: &[SeriesRecord], predictions: &[ForecastRecord]) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct ArtifactVisualizer {
    output_dir: PathBuf,
    history_tail: usize,
}

impl ArtifactVisualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            history_tail: DEFAULT_HISTORY_TAIL,
        }
    }

    fn write(&self, name: &str, content: &str) -> Result<String> {
        let path = self.output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path.display().to_string())
    }

    fn render_symbol(&self, series: &SeriesRecord, prediction: &ForecastRecord) -> Vec<String> {
        let mut paths = Vec::new();
        let symbol = &series.symbol;

        let csv = export_forecast_csv(series, prediction, self.history_tail)
            .and_then(|text| self.write(&format!("{symbol}_forecast.csv"), &text));
        match csv {
            Ok(path) => paths.push(path),
            Err(e) => tracing::warn!(%symbol, error = %format!("{e:#}"), "skipping forecast CSV"),
        }

        let svg = forecast_svg(series, prediction, self.history_tail);
        match self.write(&format!("{symbol}_forecast.svg"), &svg) {
            Ok(path) => paths.push(path),
            Err(e) => tracing::warn!(%symbol, error = %format!("{e:#}"), "skipping forecast chart"),
        }
        paths
    }
}

impl Visualizer for ArtifactVisualizer {
    fn render(&self, raw: &[SeriesRecord], predictions: &[ForecastRecord]) -> Vec<String> {
        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            tracing::warn!(
                dir = %self.output_dir.display(),
                error = %e,
                "cannot create visualization directory"
            );
            return Vec::new();
        }

        let pairs: Vec<(&SeriesRecord, &ForecastRecord)> = predictions
            .iter()
            .filter_map(|p| raw.iter().find(|r| r.symbol == p.symbol).map(|r| (r, p)))
            .collect();

        let mut paths: Vec<String> = pairs
            .iter()
            .flat_map(|(series, prediction)| self.render_symbol(series, prediction))
            .collect();

        if pairs.len() >= 2 {
            let series: Vec<&SeriesRecord> = pairs.iter().map(|(s, _)| *s).collect();
            match self.write("comparison.svg", &comparison_svg(&series)) {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "skipping comparison chart"),
            }
        }

        tracing::info!(artifacts = paths.len(), dir = %self.output_dir.display(), "visualization complete");
        paths
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Columns: date, kind (history|forecast), close, forecast, lower, upper.
pub fn export_forecast_csv(
    series: &SeriesRecord,
    prediction: &ForecastRecord,
    history_tail: usize,
) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "kind", "close", "forecast", "lower", "upper"])?;

    let start = series.history.len().saturating_sub(history_tail);
    for bar in &series.history[start..] {
        wtr.write_record([
            bar.date.to_string(),
            "history".to_string(),
            format!("{:.4}", bar.close),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }
    for step in &prediction.horizon {
        wtr.write_record([
            step.date.to_string(),
            "forecast".to_string(),
            String::new(),
            format!("{:.4}", step.point_forecast),
            format!("{:.4}", step.lower_bound),
            format!("{:.4}", step.upper_bound),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── SVG ────────────────────────────────────────────────────────────

struct Frame {
    n: usize,
    lo: f64,
    hi: f64,
}

impl Frame {
    fn new(n: usize, values: impl Iterator<Item = f64>) -> Self {
        let (lo, hi) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let (lo, hi) = if lo.is_finite() { (lo, hi) } else { (0.0, 1.0) };
        let (lo, hi) = if hi - lo < 1e-9 { (lo - 1.0, hi + 1.0) } else { (lo, hi) };
        Self { n: n.max(2), lo, hi }
    }

    fn x(&self, i: usize) -> f64 {
        PAD + (WIDTH - 2.0 * PAD) * i as f64 / (self.n - 1) as f64
    }

    fn y(&self, v: f64) -> f64 {
        HEIGHT - PAD - (HEIGHT - 2.0 * PAD) * (v - self.lo) / (self.hi - self.lo)
    }
}

fn svg_open(out: &mut String, title: &str) {
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );
    let _ = writeln!(out, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        out,
        r#"<text x="{PAD}" y="24" font-family="sans-serif" font-size="16">{}</text>"#,
        escape(title)
    );
}

fn polyline(out: &mut String, points: &[(f64, f64)], color: &str, dashed: bool) {
    if points.is_empty() {
        return;
    }
    let coords: Vec<String> = points.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
    let dash = if dashed { r#" stroke-dasharray="6 4""# } else { "" };
    let _ = writeln!(
        out,
        r#"<polyline fill="none" stroke="{color}" stroke-width="2"{dash} points="{}"/>"#,
        coords.join(" ")
    );
}

/// Recent closes, forecast line and confidence band.
pub fn forecast_svg(series: &SeriesRecord, prediction: &ForecastRecord, history_tail: usize) -> String {
    let start = series.history.len().saturating_sub(history_tail);
    let closes: Vec<f64> = series.history[start..].iter().map(|b| b.close).collect();
    let h = prediction.horizon.len();

    let values = closes.iter().copied().chain(
        prediction
            .horizon
            .iter()
            .flat_map(|s| [s.lower_bound, s.upper_bound]),
    );
    let frame = Frame::new(closes.len() + h, values);

    let mut out = String::new();
    svg_open(
        &mut out,
        &format!(
            "{} ({}) ARIMA{} forecast, {:.0}% band",
            series.name(),
            series.symbol,
            prediction.order,
            prediction.confidence * 100.0
        ),
    );

    if h > 0 {
        let offset = closes.len();
        let upper = prediction
            .horizon
            .iter()
            .enumerate()
            .map(|(i, s)| (frame.x(offset + i), frame.y(s.upper_bound)));
        let lower = prediction
            .horizon
            .iter()
            .enumerate()
            .rev()
            .map(|(i, s)| (frame.x(offset + i), frame.y(s.lower_bound)));
        let band: Vec<String> = upper
            .chain(lower)
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect();
        let _ = writeln!(
            out,
            r##"<polygon fill="#ff7f0e" fill-opacity="0.2" stroke="none" points="{}"/>"##,
            band.join(" ")
        );
    }

    let history: Vec<(f64, f64)> = closes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_finite())
        .map(|(i, c)| (frame.x(i), frame.y(*c)))
        .collect();
    polyline(&mut out, &history, PALETTE[0], false);

    // Forecast line starts from the last close so the two connect.
    let mut forecast: Vec<(f64, f64)> = history.last().copied().into_iter().collect();
    forecast.extend(
        prediction
            .horizon
            .iter()
            .enumerate()
            .map(|(i, s)| (frame.x(closes.len() + i), frame.y(s.point_forecast))),
    );
    polyline(&mut out, &forecast, PALETTE[1], true);

    let _ = writeln!(out, "</svg>");
    out
}

/// Closes rebased to 100 at each series' first finite value.
pub fn comparison_svg(series: &[&SeriesRecord]) -> String {
    let rebased: Vec<(&str, Vec<f64>)> = series
        .iter()
        .map(|s| {
            let closes = s.closes();
            let base = closes.iter().copied().find(|c| c.is_finite() && *c != 0.0);
            let values = match base {
                Some(b) => closes.iter().map(|c| c / b * 100.0).collect(),
                None => Vec::new(),
            };
            (s.symbol.as_str(), values)
        })
        .collect();

    let n = rebased.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let frame = Frame::new(n, rebased.iter().flat_map(|(_, v)| v.iter().copied()));

    let mut out = String::new();
    svg_open(&mut out, "Relative performance (rebased to 100)");
    for (k, (symbol, values)) in rebased.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (frame.x(i), frame.y(*v)))
            .collect();
        polyline(&mut out, &points, color, false);
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="12" fill="{color}">{}</text>"#,
            WIDTH - PAD - 60.0,
            PAD + 16.0 * k as f64,
            escape(symbol)
        );
    }
    let _ = writeln!(out, "</svg>");
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
