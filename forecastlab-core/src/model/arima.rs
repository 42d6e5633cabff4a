//! ARIMA(p, d, q) estimation and forecasting.
//!
//! The series is differenced `d` times into a working series `w`, on which
//! an ARMA(p, q) model is fitted:
//!
//! `(w_t − μ) = Σ φ_i (w_{t−i} − μ) + ε_t + Σ θ_j ε_{t−j}`
//!
//! `μ` is estimated only when `d = 0`; for `d > 0` the model has no drift.
//! Starting values come from Hannan–Rissanen regressions; the conditional sum
//! of squares is then minimized with Nelder–Mead over tanh-mapped partial
//! autocorrelations, which keeps every candidate stationary and invertible.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

use super::ols::ols;
use super::optimize::{nelder_mead, NelderMeadConfig};
use super::stationarity::difference;
use crate::domain::ModelOrder;

/// Observations required beyond `d + max(p, q)`.
pub const MIN_FIT_OBS: usize = 10;

// Partial autocorrelations are kept strictly inside the unit interval.
const PACF_LIMIT: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("insufficient observations: need {needed}, got {got}")]
    InsufficientObservations { needed: usize, got: usize },

    #[error("singular regression while estimating starting values")]
    SingularMatrix,

    #[error("optimizer did not reach a finite objective after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("non-finite estimate: {0}")]
    NonFiniteEstimate(String),
}

/// Point forecasts with a symmetric normal band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPath {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub std_err: Vec<f64>,
}

/// A fitted ARIMA model, carrying the tail state needed to forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaModel {
    pub order: ModelOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Mean of the working series (zero when `d > 0`, except degenerate fits).
    pub mean: f64,
    /// Innovation variance: conditional sum of squares over residual count.
    pub sigma2: f64,
    /// Residuals that entered the conditional sum of squares.
    pub n_resid: usize,
    pub converged: bool,
    pub iterations: usize,
    /// Exact fit of a zero-variance working series.
    pub degenerate: bool,
    /// Last value of each differencing level `Δ^k y`, `k = 0..d`.
    level_tails: Vec<f64>,
    /// Last `p` values of the working series, oldest first.
    w_tail: Vec<f64>,
    /// Last `q` residuals, oldest first.
    e_tail: Vec<f64>,
}

impl ArimaModel {
    /// Fit `order` to `series`. Values must be finite.
    pub fn fit(series: &[f64], order: ModelOrder) -> Result<Self, FitError> {
        let ModelOrder { p, d, q } = order;
        let needed = d + p.max(q) + MIN_FIT_OBS;
        if series.len() < needed {
            return Err(FitError::InsufficientObservations {
                needed,
                got: series.len(),
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteEstimate("input series".into()));
        }

        let mut levels = vec![series.to_vec()];
        for _ in 0..d {
            let next = difference(levels.last().map(Vec::as_slice).unwrap_or_default());
            levels.push(next);
        }
        let w = levels.pop().unwrap_or_default();
        let level_tails: Vec<f64> = levels.iter().filter_map(|l| l.last().copied()).collect();

        let w_mean = w.iter().sum::<f64>() / w.len() as f64;
        let w_var = w.iter().map(|v| (v - w_mean).powi(2)).sum::<f64>() / w.len() as f64;
        let scale = w.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);

        if w_var.sqrt() <= 1e-12 * scale {
            tracing::debug!(%order, "zero-variance working series, using exact model");
            return Ok(Self {
                order,
                ar: vec![0.0; p],
                ma: vec![0.0; q],
                mean: w_mean,
                sigma2: 0.0,
                n_resid: w.len(),
                converged: true,
                iterations: 0,
                degenerate: true,
                level_tails,
                w_tail: tail(&w, p),
                e_tail: vec![0.0; q],
            });
        }

        let with_mean = d == 0;
        // A singular starting regression only costs the starting point.
        let (phi0, theta0, mu0) = match hannan_rissanen(&w, p, q, with_mean) {
            Ok(start) => start,
            Err(e) => {
                tracing::debug!(%order, error = %e, "no Hannan–Rissanen start, starting from zero");
                (vec![0.0; p], vec![0.0; q], w_mean)
            }
        };

        let sd = w_var.sqrt();
        let unpack = |x: &[f64]| -> (Vec<f64>, Vec<f64>, f64) {
            let phi = pacf_to_coefs(&x[..p]);
            let theta: Vec<f64> = pacf_to_coefs(&x[p..p + q]).iter().map(|a| -a).collect();
            let mu = if with_mean { w_mean + sd * x[p + q] } else { 0.0 };
            (phi, theta, mu)
        };

        let mut x0: Vec<f64> = coefs_to_pacf(&phi0);
        let neg_theta: Vec<f64> = theta0.iter().map(|t| -t).collect();
        x0.extend(coefs_to_pacf(&neg_theta));
        if with_mean {
            x0.push((mu0 - w_mean) / sd);
        }

        let objective = |x: &[f64]| {
            let (phi, theta, mu) = unpack(x);
            let (css, _) = conditional_residuals(&w, &phi, &theta, mu);
            css / (sd * sd)
        };

        let minimum = nelder_mead(objective, &x0, &NelderMeadConfig::default());
        if !minimum.fx.is_finite() {
            return Err(FitError::NonConvergence {
                iterations: minimum.iterations,
            });
        }
        if !minimum.converged {
            tracing::warn!(%order, iterations = minimum.iterations, "CSS optimizer hit its iteration cap");
        }

        let (ar, ma, mean) = unpack(&minimum.x);
        let (css, resid) = conditional_residuals(&w, &ar, &ma, mean);
        let n_resid = w.len() - p;
        let sigma2 = css / n_resid as f64;

        if ar.iter().chain(&ma).any(|c| !c.is_finite()) {
            return Err(FitError::NonFiniteEstimate("coefficients".into()));
        }
        if !mean.is_finite() || !sigma2.is_finite() {
            return Err(FitError::NonFiniteEstimate("mean or innovation variance".into()));
        }

        tracing::debug!(
            %order,
            ?ar,
            ?ma,
            mean,
            sigma2,
            iterations = minimum.iterations,
            "ARIMA fitted"
        );

        Ok(Self {
            order,
            ar,
            ma,
            mean,
            sigma2,
            n_resid,
            converged: minimum.converged,
            iterations: minimum.iterations,
            degenerate: false,
            level_tails,
            w_tail: tail(&w, p),
            e_tail: tail(&resid, q),
        })
    }

    /// Gaussian AIC of the conditional fit.
    pub fn aic(&self) -> f64 {
        let k = self.ar.len() + self.ma.len() + usize::from(self.order.d == 0);
        let n = self.n_resid as f64;
        n * (self.sigma2.ln() + 1.0 + (2.0 * std::f64::consts::PI).ln()) + 2.0 * k as f64
    }

    /// Forecast `h` steps ahead with a two-sided band at `confidence`.
    ///
    /// `confidence` is clamped into `[0.5, 0.999999]`.
    pub fn forecast(&self, h: usize, confidence: f64) -> ForecastPath {
        let working = self.forecast_working(h);

        let mut point = working;
        for &last in self.level_tails.iter().rev() {
            point = integrate(&point, last);
        }

        let psi = self.psi_weights(h);
        let mut acc = 0.0;
        let std_err: Vec<f64> = psi
            .iter()
            .map(|w| {
                acc += w * w;
                (self.sigma2 * acc).sqrt()
            })
            .collect();

        let z = normal_quantile(0.5 + confidence.clamp(0.5, 0.999_999) / 2.0);
        let lower = point.iter().zip(&std_err).map(|(p, s)| p - z * s).collect();
        let upper = point.iter().zip(&std_err).map(|(p, s)| p + z * s).collect();

        ForecastPath {
            point,
            lower,
            upper,
            std_err,
        }
    }

    fn forecast_working(&self, h: usize) -> Vec<f64> {
        let mut w_hist: Vec<f64> = self.w_tail.iter().map(|v| v - self.mean).collect();
        let mut e_hist = self.e_tail.clone();
        let mut out = Vec::with_capacity(h);

        for _ in 0..h {
            let mut next = 0.0;
            for (i, phi) in self.ar.iter().enumerate() {
                if let Some(v) = w_hist.len().checked_sub(i + 1).map(|k| w_hist[k]) {
                    next += phi * v;
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if let Some(e) = e_hist.len().checked_sub(j + 1).map(|k| e_hist[k]) {
                    next += theta * e;
                }
            }
            w_hist.push(next);
            e_hist.push(0.0);
            out.push(next + self.mean);
        }
        out
    }

    /// ψ-weights `ψ_0..ψ_{h−1}` of `Θ(B) / (Φ(B)(1 − B)^d)`.
    fn psi_weights(&self, h: usize) -> Vec<f64> {
        // Full AR polynomial as 1 − Σ a_i B^i.
        let mut poly = vec![1.0];
        poly.extend(self.ar.iter().map(|c| -c));
        for _ in 0..self.order.d {
            poly = poly_mul(&poly, &[1.0, -1.0]);
        }
        let a: Vec<f64> = poly.iter().skip(1).map(|c| -c).collect();

        let mut psi = Vec::with_capacity(h);
        for j in 0..h {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut v = self.ma.get(j - 1).copied().unwrap_or(0.0);
            for (i, ai) in a.iter().enumerate().take(j) {
                v += ai * psi[j - 1 - i];
            }
            psi.push(v);
        }
        psi
    }
}

/// Two-stage Hannan–Rissanen starting values `(φ, θ, μ)`.
fn hannan_rissanen(
    w: &[f64],
    p: usize,
    q: usize,
    with_mean: bool,
) -> Result<(Vec<f64>, Vec<f64>, f64), FitError> {
    let mu = if with_mean {
        w.iter().sum::<f64>() / w.len() as f64
    } else {
        0.0
    };
    let x: Vec<f64> = w.iter().map(|v| v - mu).collect();
    let m = x.len();

    if p + q == 0 {
        return Ok((Vec::new(), Vec::new(), mu));
    }

    // Stage 1: long autoregression for innovation estimates.
    let mut resid = vec![0.0; m];
    let long = if q > 0 {
        (p + q).max(10).min(m / 4).max(1)
    } else {
        0
    };
    if long > 0 {
        let rows: Vec<Vec<f64>> = (long..m)
            .map(|t| (1..=long).map(|i| x[t - i]).collect())
            .collect();
        let fit = ols(&rows, &x[long..]).ok_or(FitError::SingularMatrix)?;
        for (t, r) in (long..m).zip(fit.residuals.iter()) {
            resid[t] = *r;
        }
    }

    // Stage 2: regress on own lags and lagged innovations.
    let start = long + q.max(p);
    if start >= m {
        return Err(FitError::SingularMatrix);
    }
    let rows: Vec<Vec<f64>> = (start..m)
        .map(|t| {
            (1..=p)
                .map(|i| x[t - i])
                .chain((1..=q).map(|j| resid[t - j]))
                .collect()
        })
        .collect();
    let fit = ols(&rows, &x[start..]).ok_or(FitError::SingularMatrix)?;

    let phi = fit.beta.iter().take(p).copied().collect();
    let theta = fit.beta.iter().skip(p).copied().collect();
    Ok((phi, theta, mu))
}

/// Conditional sum of squares and the residual path, pre-sample terms zero.
fn conditional_residuals(w: &[f64], phi: &[f64], theta: &[f64], mu: f64) -> (f64, Vec<f64>) {
    let p = phi.len();
    let mut e = vec![0.0; w.len()];
    let mut css = 0.0;
    for t in p..w.len() {
        let mut v = w[t] - mu;
        for (i, c) in phi.iter().enumerate() {
            v -= c * (w[t - 1 - i] - mu);
        }
        for (j, c) in theta.iter().enumerate() {
            if let Some(k) = t.checked_sub(j + 1) {
                v -= c * e[k];
            }
        }
        e[t] = v;
        css += v * v;
    }
    (css, e)
}

/// Unconstrained values → coefficients `a` with `1 − Σ a_i z^i` stable,
/// through tanh and the Durbin–Levinson recursion.
fn pacf_to_coefs(raw: &[f64]) -> Vec<f64> {
    let mut a: Vec<f64> = Vec::with_capacity(raw.len());
    for &u in raw {
        let r = u.tanh() * PACF_LIMIT;
        let prev = a.clone();
        let k = prev.len();
        for j in 0..k {
            a[j] = prev[j] - r * prev[k - 1 - j];
        }
        a.push(r);
    }
    a
}

/// Inverse of [`pacf_to_coefs`]. Non-stationary input falls back to zeros.
fn coefs_to_pacf(coefs: &[f64]) -> Vec<f64> {
    let mut a = coefs.to_vec();
    let mut pacf = vec![0.0; coefs.len()];
    for k in (0..a.len()).rev() {
        let r = a[k];
        if !r.is_finite() || r.abs() >= PACF_LIMIT {
            return vec![0.0; coefs.len()];
        }
        pacf[k] = r;
        let denom = 1.0 - r * r;
        let prev = a.clone();
        for j in 0..k {
            a[j] = (prev[j] + r * prev[k - 1 - j]) / denom;
        }
        a.truncate(k);
    }
    pacf.iter().map(|r| (r / PACF_LIMIT).atanh()).collect()
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

fn integrate(diffs: &[f64], start: f64) -> Vec<f64> {
    diffs
        .iter()
        .scan(start, |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .collect()
}

fn tail(x: &[f64], k: usize) -> Vec<f64> {
    x[x.len().saturating_sub(k)..].to_vec()
}

fn normal_quantile(prob: f64) -> f64 {
    Normal::new(0.0, 1.0).map_or(1.96, |n| n.inverse_cdf(prob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Box–Muller
    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(1e-12..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn simulate_arma(phi: f64, theta: f64, mu: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = Vec::with_capacity(n);
        let (mut prev, mut prev_e) = (0.0, 0.0);
        for t in 0..n + 200 {
            let e = gaussian(&mut rng);
            let v = phi * prev + e + theta * prev_e;
            prev = v;
            prev_e = e;
            if t >= 200 {
                out.push(mu + v);
            }
        }
        out
    }

    #[test]
    fn recovers_arma11_coefficients() {
        let y = simulate_arma(0.6, 0.3, 50.0, 1500, 42);
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 0, 1)).unwrap();
        assert!((model.ar[0] - 0.6).abs() < 0.1, "phi = {}", model.ar[0]);
        assert!((model.ma[0] - 0.3).abs() < 0.12, "theta = {}", model.ma[0]);
        assert!((model.mean - 50.0).abs() < 0.5, "mean = {}", model.mean);
        assert!((model.sigma2 - 1.0).abs() < 0.15, "sigma2 = {}", model.sigma2);
        // Unit innovations: about 1 + ln(2π) per residual.
        let per_obs = model.aic() / model.n_resid as f64;
        assert!((per_obs - 2.838).abs() < 0.2, "aic/n = {per_obs}");
    }

    #[test]
    fn coefficients_stay_in_stationary_region() {
        let y = simulate_arma(0.95, -0.2, 0.0, 300, 5);
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 0, 1)).unwrap();
        assert!(model.ar[0].abs() < 1.0);
        assert!(model.ma[0].abs() < 1.0);
    }

    #[test]
    fn too_short_series_is_rejected() {
        let err = ArimaModel::fit(&[1.0; 11], ModelOrder::new(1, 1, 1)).unwrap_err();
        assert_eq!(err, FitError::InsufficientObservations { needed: 12, got: 11 });
    }

    #[test]
    fn flat_series_forecasts_flat() {
        let model = ArimaModel::fit(&[25.0; 40], ModelOrder::new(1, 0, 1)).unwrap();
        assert!(model.degenerate);
        let path = model.forecast(5, 0.95);
        for i in 0..5 {
            assert!((path.point[i] - 25.0).abs() < 1e-12);
            assert_eq!(path.lower[i], path.point[i]);
            assert_eq!(path.upper[i], path.point[i]);
        }
    }

    #[test]
    fn exact_line_is_extended() {
        let y: Vec<f64> = (0..30).map(|i| 10.0 + 2.0 * i as f64).collect();
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 1, 1)).unwrap();
        let path = model.forecast(3, 0.95);
        assert!((path.point[0] - 70.0).abs() < 1e-9);
        assert!((path.point[2] - 74.0).abs() < 1e-9);
    }

    #[test]
    fn singular_starting_regression_still_fits() {
        // Strict alternation: every long-AR lag is collinear.
        let alternating: Vec<f64> = (0..59).map(|i| if i % 2 == 0 { 1.6 } else { 0.4 }).collect();
        let y = integrate(&alternating, 100.0);
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 1, 1)).unwrap();
        assert!(model.sigma2.is_finite());
        let path = model.forecast(5, 0.95);
        assert!(path.point.iter().all(|v| v.is_finite()));

        let mut step = vec![100.0; 30];
        step.extend([101.0; 30]);
        let model = ArimaModel::fit(&step, ModelOrder::new(1, 1, 1)).unwrap();
        assert!(model.ar[0].abs() < 1.0 && model.ma[0].abs() < 1.0);
    }

    #[test]
    fn bands_widen_with_horizon_when_integrated() {
        let steps = simulate_arma(0.2, 0.1, 0.3, 250, 9);
        let y = integrate(&steps, 100.0);
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 1, 1)).unwrap();
        let path = model.forecast(5, 0.95);
        for i in 0..5 {
            assert!(path.lower[i] < path.point[i] && path.point[i] < path.upper[i]);
        }
        for i in 1..5 {
            assert!(path.std_err[i] > path.std_err[i - 1]);
        }
    }

    #[test]
    fn higher_confidence_gives_wider_band() {
        let y = simulate_arma(0.5, 0.0, 10.0, 200, 3);
        let model = ArimaModel::fit(&y, ModelOrder::new(1, 0, 1)).unwrap();
        let narrow = model.forecast(3, 0.8);
        let wide = model.forecast(3, 0.99);
        assert!(wide.upper[0] - wide.lower[0] > narrow.upper[0] - narrow.lower[0]);
    }

    #[test]
    fn psi_weights_of_random_walk_are_ones() {
        let model = ArimaModel {
            order: ModelOrder::new(0, 1, 0),
            ar: vec![],
            ma: vec![],
            mean: 0.0,
            sigma2: 1.0,
            n_resid: 10,
            converged: true,
            iterations: 0,
            degenerate: false,
            level_tails: vec![5.0],
            w_tail: vec![],
            e_tail: vec![],
        };
        assert_eq!(model.psi_weights(4), vec![1.0; 4]);
        let path = model.forecast(4, 0.95);
        assert!((path.std_err[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pacf_mapping_round_trips() {
        let coefs = pacf_to_coefs(&[0.4, -0.7]);
        let back = coefs_to_pacf(&coefs);
        assert!((back[0] - 0.4).abs() < 1e-9 && (back[1] + 0.7).abs() < 1e-9);
    }
}
