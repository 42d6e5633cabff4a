//! Derivative-free minimization (Nelder–Mead downhill simplex).

/// Tuning for [`nelder_mead`].
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadConfig {
    /// Initial simplex edge length along each axis.
    pub step: f64,
    pub max_iter: usize,
    /// Converged when the objective spread across the simplex falls below
    /// `f_tol · |f_best| + 1e-14`.
    pub f_tol: f64,
    /// Converged when every vertex is within `x_tol` of the best one.
    pub x_tol: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            max_iter: 2000,
            f_tol: 1e-10,
            x_tol: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fx: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `f` starting from `x0`.
///
/// Non-finite objective values are treated as `+inf`, so the simplex walks
/// away from regions where the objective is undefined.
pub fn nelder_mead<F>(f: F, x0: &[f64], config: &NelderMeadConfig) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let n = x0.len();
    if n == 0 {
        return Minimum {
            x: Vec::new(),
            fx: eval(x0),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += config.step;
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        order(&mut simplex, &mut values);

        let best = values[0];
        let worst = values[n];
        if spread_small(best, worst, config.f_tol) || diameter(&simplex) <= config.x_tol {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid = centroid(&simplex[..n]);
        let reflected = along(&centroid, &simplex[n], -REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(&centroid, &simplex[n], -EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        // Outside contraction when the reflection beat the worst point,
        // inside contraction otherwise.
        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = along(&centroid, &simplex[n], -CONTRACT);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = along(&centroid, &simplex[n], CONTRACT);
            let fc = eval(&c);
            (c, fc)
        };

        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let anchor = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = along(&anchor, &simplex[i], SHRINK);
            values[i] = eval(&simplex[i]);
        }
    }

    order(&mut simplex, &mut values);
    Minimum {
        x: simplex.swap_remove(0),
        fx: values[0],
        iterations,
        converged,
    }
}

fn order(simplex: &mut [Vec<f64>], values: &mut [f64]) {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let sorted_s: Vec<Vec<f64>> = idx.iter().map(|&i| simplex[i].clone()).collect();
    let sorted_v: Vec<f64> = idx.iter().map(|&i| values[i]).collect();
    simplex.clone_from_slice(&sorted_s);
    values.copy_from_slice(&sorted_v);
}

fn spread_small(best: f64, worst: f64, f_tol: f64) -> bool {
    best.is_finite() && worst.is_finite() && (worst - best) <= f_tol * best.abs() + 1e-14
}

fn diameter(simplex: &[Vec<f64>]) -> f64 {
    let best = &simplex[0];
    simplex[1..]
        .iter()
        .flat_map(|v| v.iter().zip(best).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max)
}

fn centroid(points: &[Vec<f64>]) -> Vec<f64> {
    let n = points.len() as f64;
    let dim = points[0].len();
    (0..dim)
        .map(|j| points.iter().map(|p| p[j]).sum::<f64>() / n)
        .collect()
}

/// `c + t·(p − c)`.
fn along(c: &[f64], p: &[f64], t: f64) -> Vec<f64> {
    c.iter().zip(p).map(|(ci, pi)| ci + t * (pi - ci)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_quadratic_bowl() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let m = nelder_mead(f, &[0.0, 0.0], &NelderMeadConfig::default());
        assert!(m.converged);
        assert!((m.x[0] - 3.0).abs() < 1e-3, "x = {:?}", m.x);
        assert!((m.x[1] + 1.0).abs() < 1e-3, "x = {:?}", m.x);
    }

    #[test]
    fn minimizes_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let config = NelderMeadConfig {
            step: 0.5,
            max_iter: 5000,
            f_tol: 1e-14,
            x_tol: 1e-10,
        };
        let m = nelder_mead(f, &[-1.2, 1.0], &config);
        assert!((m.x[0] - 1.0).abs() < 1e-2, "x = {:?}", m.x);
        assert!((m.x[1] - 1.0).abs() < 2e-2, "x = {:?}", m.x);
    }

    #[test]
    fn avoids_undefined_region() {
        // ln is undefined for x <= 0; minimum of x - ln x is at x = 1
        let f = |x: &[f64]| x[0] - x[0].ln();
        let m = nelder_mead(f, &[0.05], &NelderMeadConfig::default());
        assert!((m.x[0] - 1.0).abs() < 1e-3, "x = {:?}", m.x);
    }

    #[test]
    fn respects_iteration_cap() {
        let f = |x: &[f64]| x[0].powi(2);
        let config = NelderMeadConfig {
            max_iter: 3,
            ..NelderMeadConfig::default()
        };
        let m = nelder_mead(f, &[10.0], &config);
        assert!(m.iterations <= 3);
        assert!(!m.converged);
    }
}
