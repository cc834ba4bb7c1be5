//! Beta against a benchmark on lag-aligned return series.

use serde::{Deserialize, Serialize};

use super::correlation::{align_with_lag, lagged_correlation};
use crate::error::Result;

/// Beta and the lag-search context it was computed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetaResult {
    /// `Cov(asset, benchmark) / Var(benchmark)` at the chosen lag
    pub beta: f64,
    /// Correlation at the chosen lag
    pub correlation: f64,
    /// Chosen lag in trading days
    pub lag: i32,
    /// Overlapping observations used
    pub points_used: usize,
}

/// Compute beta on the lag-chosen aligned arrays.
///
/// The lag search evaluates {−1, 0, +1} by calendar-date alignment and
/// keeps the lag with maximum |correlation|. A benchmark regressed on
/// itself returns beta = 1 exactly.
pub fn beta_with_lag(asset: &[(i64, f64)], benchmark: &[(i64, f64)]) -> Result<BetaResult> {
    if asset == benchmark {
        return Ok(BetaResult {
            beta: 1.0,
            correlation: 1.0,
            lag: 0,
            points_used: asset.len(),
        });
    }

    let lag_result = lagged_correlation(asset, benchmark, false)?;
    let (a, b) = align_with_lag(asset, benchmark, lag_result.lag);

    let n = a.len();
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let covariance: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64;
    let bench_variance: f64 = b.iter().map(|y| (y - mean_b).powi(2)).sum::<f64>() / (n - 1) as f64;

    let beta = if bench_variance == 0.0 {
        0.0
    } else {
        covariance / bench_variance
    };

    Ok(BetaResult {
        beta,
        correlation: lag_result.correlation,
        lag: lag_result.lag,
        points_used: lag_result.points,
    })
}
