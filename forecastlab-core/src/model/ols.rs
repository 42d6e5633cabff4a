//! Ordinary least squares on a dense design matrix.

use nalgebra::{DMatrix, DVector};

/// Fitted OLS regression.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Residual sum of squares.
    pub ssr: f64,
    /// (X'X)^-1, for coefficient standard errors.
    pub xtx_inv: DMatrix<f64>,
    pub nobs: usize,
}

impl OlsFit {
    /// Standard error of coefficient `i` using the unbiased residual variance.
    pub fn std_error(&self, i: usize) -> Option<f64> {
        let dof = self.nobs.checked_sub(self.beta.len()).filter(|d| *d > 0)?;
        let sigma2 = self.ssr / dof as f64;
        let var = sigma2 * self.xtx_inv[(i, i)];
        (var.is_finite() && var > 0.0).then(|| var.sqrt())
    }

    /// Gaussian AIC as used for lag selection: `n·ln(ssr/n) + 2k`.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        n * (self.ssr / n).ln() + 2.0 * self.beta.len() as f64
    }
}

/// Solve `y = Xβ + ε`. `rows` holds one regressor row per observation.
///
/// Returns `None` when the system is underdetermined or X'X is singular.
pub fn ols(rows: &[Vec<f64>], y: &[f64]) -> Option<OlsFit> {
    let n = y.len();
    let k = rows.first()?.len();
    if n != rows.len() || n <= k || k == 0 {
        return None;
    }

    let x = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
    let y_vec = DVector::from_column_slice(y);

    let xtx = x.transpose() * &x;
    let xtx_inv = xtx.try_inverse()?;
    let beta = &xtx_inv * (x.transpose() * &y_vec);
    if beta.iter().any(|b| !b.is_finite()) {
        return None;
    }

    let residuals = &y_vec - &x * &beta;
    let ssr = residuals.dot(&residuals);

    Some(OlsFit {
        beta,
        residuals,
        ssr,
        xtx_inv,
        nobs: n,
    })
}
