//! Augmented Dickey–Fuller unit-root test.
//!
//! Regression with constant:
//! `Δy_t = α + β·y_{t-1} + Σ_{i=1..k} γ_i·Δy_{t-i} + ε_t`
//!
//! H0: unit root (non-stationary). The lag count `k` is chosen by minimum AIC
//! over a common sample, up to `12·(n/100)^{1/4}`. The p-value comes from
//! MacKinnon's (1994) approximate response surface for the constant-only case.
//!
//! A test that cannot be computed reports `stationary = false`: the order
//! selector then differences once more, which is the safe direction.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::ols::{ols, OlsFit};

/// Significance level for rejecting the unit root.
pub const SIGNIFICANCE: f64 = 0.05;

/// Fewest usable observations for which the test is attempted.
pub const MIN_ADF_OBS: usize = 8;

// MacKinnon (1994) surface, one regressor, constant only.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) finite-sample critical values: c0 + c1/n + c2/n².
const CRIT_1: [f64; 3] = [-3.43035, -6.5393, -16.786];
const CRIT_5: [f64; 3] = [-2.86154, -2.8903, -4.234];
const CRIT_10: [f64; 3] = [-2.56677, -1.5384, -2.809];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

impl CriticalValues {
    fn at(nobs: usize) -> Self {
        let n = nobs.max(1) as f64;
        let eval = |c: [f64; 3]| c[0] + c[1] / n + c[2] / (n * n);
        Self {
            one_pct: eval(CRIT_1),
            five_pct: eval(CRIT_5),
            ten_pct: eval(CRIT_10),
        }
    }
}

/// Outcome of one ADF test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    /// Observations in the final regression.
    pub n_obs: usize,
    pub critical_values: Option<CriticalValues>,
    pub stationary: bool,
}

impl StationarityResult {
    fn not_computable(n_obs: usize) -> Self {
        Self {
            statistic: f64::NAN,
            p_value: 1.0,
            used_lag: 0,
            n_obs,
            critical_values: None,
            stationary: false,
        }
    }

    fn constant(n_obs: usize) -> Self {
        Self {
            statistic: f64::NEG_INFINITY,
            p_value: 0.0,
            used_lag: 0,
            n_obs,
            critical_values: Some(CriticalValues::at(n_obs)),
            stationary: true,
        }
    }

    fn exact_reversion(n_obs: usize) -> Self {
        Self {
            statistic: f64::NEG_INFINITY,
            p_value: 0.0,
            used_lag: 0,
            n_obs,
            critical_values: Some(CriticalValues::at(n_obs)),
            stationary: true,
        }
    }

    /// False when the test fell back to the conservative default.
    pub fn is_computed(&self) -> bool {
        !self.statistic.is_nan()
    }
}

/// Run the ADF test on `series`. Non-finite values are dropped first.
///
/// Never fails: degenerate input yields `stationary = false`, except a
/// constant series, which is trivially stationary.
pub fn adf_test(series: &[f64]) -> StationarityResult {
    let x: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = x.len();

    if n >= 2 && is_constant(&x) {
        return StationarityResult::constant(n);
    }
    if n < MIN_ADF_OBS {
        tracing::debug!(n, "series too short for ADF test, assuming non-stationary");
        return StationarityResult::not_computable(n);
    }

    let diff = difference(&x);
    // A constant increment is a deterministic trend: the regression is
    // collinear, and the level clearly is not stationary.
    if is_constant(&diff) {
        tracing::debug!("deterministic trend in level, assuming non-stationary");
        return StationarityResult::not_computable(n);
    }

    if exact_mean_reversion(&x, &diff) {
        tracing::debug!("level reverts to its mean exactly, treating as stationary");
        return StationarityResult::exact_reversion(n - 1);
    }

    let maxlag = default_maxlag(n);

    // AIC lag search on the sample common to every candidate lag.
    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=maxlag {
        let (rows, y) = design(&x, &diff, lag, maxlag);
        if let Some(fit) = ols(&rows, &y) {
            let aic = fit.aic();
            if aic.is_finite() && best.map_or(true, |(_, b)| aic < b) {
                best = Some((lag, aic));
            }
        }
    }

    let Some((used_lag, _)) = best else {
        tracing::debug!(n, "ADF lag search failed, assuming non-stationary");
        return StationarityResult::not_computable(n);
    };

    let (rows, y) = design(&x, &diff, used_lag, used_lag);
    let Some(statistic) = ols(&rows, &y).and_then(|fit| level_t_stat(&fit, &y)) else {
        tracing::debug!(n, used_lag, "ADF regression degenerate, assuming non-stationary");
        return StationarityResult::not_computable(n);
    };

    let p_value = mackinnon_p_value(statistic);
    StationarityResult {
        statistic,
        p_value,
        used_lag,
        n_obs: y.len(),
        critical_values: Some(CriticalValues::at(y.len())),
        stationary: p_value < SIGNIFICANCE,
    }
}

/// `⌊12·(n/100)^{1/4}⌋`, capped so the regression keeps degrees of freedom.
fn default_maxlag(n: usize) -> usize {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    let cap = (n / 2).saturating_sub(2);
    schwert.min(cap)
}

/// Regressors `[1, y_{t-1}, Δy_{t-1}, …, Δy_{t-lag}]` against `Δy_t`, using
/// rows from `start` so candidate lags share a sample.
fn design(x: &[f64], diff: &[f64], lag: usize, start: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rows = Vec::with_capacity(diff.len().saturating_sub(start));
    let mut y = Vec::with_capacity(rows.capacity());
    for t in start..diff.len() {
        let mut row = Vec::with_capacity(lag + 2);
        row.push(1.0);
        row.push(x[t]);
        for i in 1..=lag {
            row.push(diff[t - i]);
        }
        rows.push(row);
        y.push(diff[t]);
    }
    (rows, y)
}

/// t-statistic of the lagged level. A perfect fit has no meaningful t.
fn level_t_stat(fit: &OlsFit, y: &[f64]) -> Option<f64> {
    if is_exact(fit, y) {
        return None;
    }
    let t = fit.beta[1] / fit.std_error(1)?;
    t.is_finite().then_some(t)
}

/// `Δy_t = α + β·y_{t-1}` fits perfectly with `β < 0`, as for a strict
/// alternation around a mean. The t-statistic is unbounded there.
fn exact_mean_reversion(x: &[f64], diff: &[f64]) -> bool {
    let (rows, y) = design(x, diff, 0, 0);
    let Some(fit) = ols(&rows, &y) else {
        return false;
    };
    is_exact(&fit, &y) && fit.beta[1] < -1e-6
}

fn is_exact(fit: &OlsFit, y: &[f64]) -> bool {
    let tss: f64 = y.iter().map(|v| v * v).sum();
    fit.ssr <= 1e-20 * tss.max(f64::MIN_POSITIVE)
}

/// Approximate p-value of an ADF statistic (constant, no trend).
pub fn mackinnon_p_value(stat: f64) -> f64 {
    if stat.is_nan() {
        return 1.0;
    }
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let z = if stat <= TAU_STAR {
        polyval(&TAU_SMALLP, stat)
    } else {
        polyval(&TAU_LARGEP, stat)
    };
    standard_normal_cdf(z)
}

fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal_cdf(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// First difference, dropping the leading gap.
pub fn difference(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

fn is_constant(x: &[f64]) -> bool {
    let Some(&first) = x.first() else {
        return true;
    };
    let scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    x.iter().all(|v| (v - first).abs() <= 1e-12 * scale)
}
