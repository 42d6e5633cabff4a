//! Order selection: the differencing degree comes from repeated ADF tests,
//! the AR and MA orders are fixed at one.

use super::stationarity::{adf_test, difference};
use crate::domain::ModelOrder;

pub const AR_ORDER: usize = 1;
pub const MA_ORDER: usize = 1;
pub const MAX_DIFFERENCING: usize = 2;

/// Choose `(1, d, 1)` for `series`.
///
/// `d = 0` if the level is stationary, `d = 1` if the first difference is,
/// otherwise `d = 2` without a further test. Never fails.
pub fn select_order(series: &[f64]) -> ModelOrder {
    let d = differencing_degree(series);
    ModelOrder::new(AR_ORDER, d, MA_ORDER)
}

fn differencing_degree(series: &[f64]) -> usize {
    let mut current: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    for d in 0..MAX_DIFFERENCING {
        let result = adf_test(&current);
        tracing::debug!(
            d,
            statistic = result.statistic,
            p_value = result.p_value,
            used_lag = result.used_lag,
            stationary = result.stationary,
            "ADF test"
        );
        if result.stationary {
            return d;
        }
        current = difference(&current);
    }
    MAX_DIFFERENCING
}
