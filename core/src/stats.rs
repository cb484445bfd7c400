//! Order statistics and rescaling shared by the scaler, the outlier
//! models and score fusion.

/// Percentile with linear interpolation between closest ranks.
/// `q` is a fraction in [0, 1]. Input need not be sorted.
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, q))
}

/// Same as `percentile` for data already sorted ascending.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let q = q.clamp(0.0, 1.0);
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 0.5)
}

/// Min-max rescale into [lo, hi]. A constant column maps to `lo`,
/// matching the usual convention of treating a zero range as 1.
pub fn min_max_scale(values: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    let range = max - min;
    let range = if range > 0.0 { range } else { 1.0 };
    values
        .iter()
        .map(|&v| (lo + (v - min) / range * (hi - lo)).clamp(lo, hi))
        .collect()
}

/// Euclidean distance between two equally long rows.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
