//! Bootstrap annual-return distribution.
//!
//! Resamples a pool of daily log returns into full synthetic years. Each
//! iteration draws 252 samples with replacement, sums them and maps the sum
//! through `exp(·) − 1`; the sorted outcomes yield the reported percentile
//! quintuple. Seeded, so identical inputs reproduce identical percentiles.

use serde::{Deserialize, Serialize};

use crate::constants::trading;
use crate::error::{Result, RiskError};
use crate::rng::SimRng;

/// Default bootstrap iterations
pub const DEFAULT_ITERATIONS: usize = 1_000;

/// Upper bound on bootstrap iterations
pub const MAX_ITERATIONS: usize = 2_000;

/// Percentile quintuple of the bootstrapped annual-return distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapDistribution {
    /// 5th percentile, clipped to ≥ −1
    pub p5: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
    /// Iterations actually run
    pub bootstrap_count: usize,
    /// Size of the log-return pool
    pub points_used: usize,
}

/// Run the bootstrap over a pool of daily log returns.
///
/// `iterations` is clamped into `[1, 2000]`; the pool must hold at least 50
/// observations.
pub fn bootstrap_annual_distribution(
    pool: &[f64],
    iterations: usize,
    seed: u64,
) -> Result<BootstrapDistribution> {
    if pool.len() < trading::MIN_BOOTSTRAP_POOL {
        return Err(RiskError::InsufficientData {
            required: trading::MIN_BOOTSTRAP_POOL,
            actual: pool.len(),
        });
    }
    let iterations = iterations.clamp(1, MAX_ITERATIONS);
    let mut rng = SimRng::new(seed);

    let mut annual: Vec<f64> = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let mut sum = 0.0;
        for _ in 0..trading::DAYS_PER_YEAR {
            sum += pool[rng.next_usize(pool.len())];
        }
        annual.push(sum.exp() - 1.0);
    }
    annual.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pick = |p: f64| percentile_sorted(&annual, p).max(-1.0);
    Ok(BootstrapDistribution {
        p5: pick(5.0),
        p25: pick(25.0),
        p50: pick(50.0),
        p75: pick(75.0),
        p95: pick(95.0),
        bootstrap_count: iterations,
        points_used: pool.len(),
    })
}

/// Nearest-rank percentile over an ascending slice.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let idx = ((p / 100.0) * (n - 1) as f64).round() as usize;
    sorted[idx.min(n - 1)]
}
