//! Pearson correlation with trailing-window, EWMA and lag-aligned variants.

use std::collections::HashMap;

use crate::constants::trading;
use crate::error::{Result, RiskError};

/// Decay factor for the EWMA-weighted estimator
pub const EWMA_LAMBDA: f64 = 0.94;

/// Pearson correlation over two equal-length aligned slices.
///
/// Returns 0 when either standard deviation is zero.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// EWMA-weighted Pearson correlation.
///
/// Weights decay backwards from the most recent observation with factor
/// `lambda`, recency-weighting the estimator. Returns 0 when either
/// weighted variance vanishes.
pub fn pearson_ewma(a: &[f64], b: &[f64], lambda: f64) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mut weights = Vec::with_capacity(n);
    let mut w = 1.0;
    for _ in 0..n {
        weights.push(w);
        w *= lambda;
    }
    weights.reverse();
    let total: f64 = weights.iter().sum();

    let mean_a: f64 = a.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() / total;
    let mean_b: f64 = b.iter().zip(&weights).map(|(y, w)| y * w).sum::<f64>() / total;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for ((x, y), w) in a.iter().zip(b.iter()).zip(&weights) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += w * dx * dy;
        var_a += w * dx * dx;
        var_b += w * dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Pearson correlation over the maximum common trailing window.
///
/// Requires at least 30 overlapping observations.
pub fn pearson_trailing(a: &[f64], b: &[f64], use_ewma: bool) -> Result<(f64, usize)> {
    let n = a.len().min(b.len());
    if n < trading::MIN_OBSERVATIONS {
        return Err(RiskError::InsufficientData {
            required: trading::MIN_OBSERVATIONS,
            actual: n,
        });
    }
    let corr = if use_ewma {
        pearson_ewma(&a[a.len() - n..], &b[b.len() - n..], EWMA_LAMBDA)
    } else {
        pearson(&a[a.len() - n..], &b[b.len() - n..])
    };
    Ok((corr, n))
}

/// Outcome of the lag search against a benchmark.
#[derive(Debug, Clone, Copy)]
pub struct LagResult {
    /// Chosen lag in trading days (−1: asset reacts to prior-day benchmark)
    pub lag: i32,
    /// Correlation at the chosen lag
    pub correlation: f64,
    /// Overlapping observations at the chosen lag
    pub points: usize,
}

/// Align two dated return series by calendar date at a benchmark lag.
///
/// For each asset observation whose date exists in the benchmark, the pair
/// uses the benchmark value `lag` trading positions away from the matched
/// index.
pub(crate) fn align_with_lag(
    asset: &[(i64, f64)],
    benchmark: &[(i64, f64)],
    lag: i32,
) -> (Vec<f64>, Vec<f64>) {
    let index_by_date: HashMap<i64, usize> = benchmark
        .iter()
        .enumerate()
        .map(|(i, (ts, _))| (*ts, i))
        .collect();

    let mut a = Vec::with_capacity(asset.len());
    let mut b = Vec::with_capacity(asset.len());
    for (ts, value) in asset {
        let Some(&idx) = index_by_date.get(ts) else {
            continue;
        };
        let shifted = idx as i64 + lag as i64;
        if shifted < 0 || shifted as usize >= benchmark.len() {
            continue;
        }
        a.push(*value);
        b.push(benchmark[shifted as usize].1);
    }
    (a, b)
}

/// Search lags {−1, 0, +1} and keep the one with maximum |correlation|.
///
/// Ties break toward lag 0. Requires at least 30 overlapping observations
/// at the chosen lag.
pub fn lagged_correlation(
    asset: &[(i64, f64)],
    benchmark: &[(i64, f64)],
    use_ewma: bool,
) -> Result<LagResult> {
    let mut best: Option<LagResult> = None;

    for lag in [0_i32, -1, 1] {
        let (a, b) = align_with_lag(asset, benchmark, lag);
        if a.len() < trading::MIN_OBSERVATIONS {
            continue;
        }
        let corr = if use_ewma {
            pearson_ewma(&a, &b, EWMA_LAMBDA)
        } else {
            pearson(&a, &b)
        };
        let candidate = LagResult {
            lag,
            correlation: corr,
            points: a.len(),
        };
        // Strict improvement keeps lag 0 on ties (it is evaluated first)
        if best.is_none_or(|current| candidate.correlation.abs() > current.correlation.abs()) {
            best = Some(candidate);
        }
    }

    best.ok_or_else(|| {
        let (a, _) = align_with_lag(asset, benchmark, 0);
        RiskError::InsufficientData {
            required: trading::MIN_OBSERVATIONS,
            actual: a.len(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(values: &[f64]) -> Vec<(i64, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (86_400 * i as i64, v))
            .collect()
    }

    #[test]
    fn test_pearson_perfect() {
        let a: Vec<f64> = (0..50).map(|i| i as f64 / 100.0).collect();
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + 0.5).collect();
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
        let inverse: Vec<f64> = a.iter().map(|x| -x).collect();
        assert!((pearson(&a, &inverse) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_zero_variance() {
        let a = vec![0.01; 40];
        let b: Vec<f64> = (0..40).map(|i| i as f64 / 100.0).collect();
        assert_eq!(pearson(&a, &b), 0.0);
    }

    #[test]
    fn test_pearson_trailing_uses_common_suffix() {
        // First half of `a` is noise; the common trailing window is b's length
        let mut a: Vec<f64> = (0..40).map(|i| ((i * 37) % 11) as f64 / 100.0).collect();
        let tail: Vec<f64> = (0..40).map(|i| i as f64 / 100.0).collect();
        a.extend(&tail);
        let (corr, points) = pearson_trailing(&a, &tail, false).unwrap();
        assert_eq!(points, 40);
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_trailing_insufficient() {
        let a = vec![0.01; 10];
        let b = vec![0.02; 10];
        assert!(matches!(
            pearson_trailing(&a, &b, false),
            Err(RiskError::InsufficientData { actual: 10, .. })
        ));
    }

    #[test]
    fn test_ewma_weights_recency() {
        // Series that agree recently but disagree early: EWMA should exceed flat
        let mut a: Vec<f64> = (0..30).map(|i| ((i * 17) % 7) as f64 / 100.0 - 0.03).collect();
        let mut b: Vec<f64> = (0..30).map(|i| ((i * 29) % 5) as f64 / 100.0 - 0.02).collect();
        let shared: Vec<f64> = (0..30).map(|i| ((i * 13) % 9) as f64 / 100.0 - 0.04).collect();
        a.extend(&shared);
        b.extend(&shared);
        let flat = pearson(&a, &b);
        let weighted = pearson_ewma(&a, &b, EWMA_LAMBDA);
        assert!(weighted > flat, "ewma {weighted} <= flat {flat}");
    }

    #[test]
    fn test_lag_zero_for_identical_series() {
        let values: Vec<f64> = (0..60).map(|i| ((i * 31) % 13) as f64 / 100.0).collect();
        let series = dated(&values);
        let result = lagged_correlation(&series, &series, false).unwrap();
        assert_eq!(result.lag, 0);
        assert!((result.correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lag_minus_one_detected() {
        // Asset mirrors the prior day's benchmark move
        let bench_values: Vec<f64> = (0..80).map(|i| ((i * 31) % 13) as f64 / 100.0 - 0.06).collect();
        let benchmark = dated(&bench_values);
        let asset: Vec<(i64, f64)> = benchmark
            .iter()
            .skip(1)
            .enumerate()
            .map(|(i, (ts, _))| (*ts, bench_values[i]))
            .collect();
        let result = lagged_correlation(&asset, &benchmark, false).unwrap();
        assert_eq!(result.lag, -1, "corr {}", result.correlation);
        assert!(result.correlation > 0.99);
    }

    #[test]
    fn test_lag_insufficient_overlap() {
        let a = dated(&[0.01, 0.02]);
        let b = dated(&[0.03, 0.04]);
        assert!(matches!(
            lagged_correlation(&a, &b, false),
            Err(RiskError::InsufficientData { .. })
        ));
    }
}
