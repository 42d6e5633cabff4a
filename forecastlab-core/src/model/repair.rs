//! Repair of non-finite forecast values.

/// Fill non-finite entries in place: linear interpolation between finite
/// neighbours, then nearest-value fill at either end.
///
/// Returns `false` if the column has no finite value at all (left untouched).
pub fn fill_gaps(column: &mut [f64]) -> bool {
    let known: Vec<usize> = (0..column.len()).filter(|&i| column[i].is_finite()).collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return false;
    };

    for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (va, vb) = (column[a], column[b]);
        for i in a + 1..b {
            let t = (i - a) as f64 / (b - a) as f64;
            column[i] = va + t * (vb - va);
        }
    }
    let head = column[first];
    column[..first].fill(head);
    let tail = column[last];
    column[last + 1..].fill(tail);
    true
}

/// Repair the three forecast columns.
///
/// A point column with nothing finite falls back to `fallback_price`; band
/// columns with nothing finite fall back to ±10% of the point. Each step is
/// then sorted so `lower ≤ point ≤ upper`.
pub fn repair_band(point: &mut [f64], lower: &mut [f64], upper: &mut [f64], fallback_price: f64) {
    if !fill_gaps(point) {
        point.fill(fallback_price);
    }
    if !fill_gaps(lower) {
        for (l, p) in lower.iter_mut().zip(point.iter()) {
            *l = p * 0.9;
        }
    }
    if !fill_gaps(upper) {
        for (u, p) in upper.iter_mut().zip(point.iter()) {
            *u = p * 1.1;
        }
    }

    for i in 0..point.len() {
        let mut triple = [lower[i], point[i], upper[i]];
        triple.sort_by(f64::total_cmp);
        lower[i] = triple[0];
        point[i] = triple[1];
        upper[i] = triple[2];
    }
}
