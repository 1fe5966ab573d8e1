//! Small numeric helpers shared by several reductions: linear regression,
//! coefficient of variation, and z-score anomaly detection.

/// Ordinary least-squares fit of `y` against `x = 0..y.len()`. Returns
/// `(slope, intercept)`. `None` when fewer than two points are given.
pub fn linear_fit(y: &[f64]) -> Option<(f64, f64)> {
    let n = y.len();
    if n < 2 {
        return None;
    }
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in xs.iter().zip(y.iter()) {
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean).powi(2);
    }
    if denominator == 0.0 {
        return Some((0.0, y_mean));
    }
    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;
    Some((slope, intercept))
}

/// Coefficient of variation: `stdev / mean`. `None` when `mean == 0` or
/// fewer than two samples are given.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / mean)
}

/// z-scores for each value against the sample's own mean/stdev. Returns an
/// empty vec for fewer than two samples (there is no meaningful spread).
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return vec![0.0; values.len()];
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / stdev).collect()
}

/// Safe division: `None` instead of `inf`/`NaN` when `denominator == 0`.
pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub fn clip(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fit_detects_a_rising_line() {
        let (slope, _) = linear_fit(&[100.0, 200.0, 300.0, 400.0]).unwrap();
        assert!((slope - 100.0).abs() < 1e-9);
    }

    #[test]
    fn safe_div_returns_none_on_zero_denominator() {
        assert_eq!(safe_div(10.0, 0.0), None);
        assert_eq!(safe_div(10.0, 2.0), Some(5.0));
    }

    #[test]
    fn z_scores_flags_an_outlier() {
        let scores = z_scores(&[100.0, 102.0, 98.0, 101.0, 500.0]);
        assert!(scores.last().unwrap() > &2.5);
    }
}
