//! Distribution parameter mapper.
//!
//! Turns a percentile quintuple — user-supplied or bootstrapped — into the
//! per-asset `(μ, σ, skew, tail_df)` tuple the path sampler consumes.

use serde::{Deserialize, Serialize};

use crate::portfolio::{PercentileQuintuple, PortfolioSnapshot};
use crate::stats::BootstrapDistribution;

/// Default location when the mapping degenerates
pub const DEFAULT_MU: f64 = 0.10;
/// Default scale when the mapping degenerates
pub const DEFAULT_SIGMA: f64 = 0.20;
/// Default tail degrees of freedom (effectively Gaussian)
pub const DEFAULT_TAIL_DF: f64 = 30.0;

/// IQR of the standard normal, used to back out σ from p25/p75
const NORMAL_IQR: f64 = 1.35;

/// Two-sided 90% z-score, used to back out the tail width
const Z_90: f64 = 1.645;

/// Per-asset annual return distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionParams {
    /// Location (median annual return), in [−1, 5]
    pub mu: f64,
    /// Scale, in [0.01, 2]
    pub sigma: f64,
    /// Skew coefficient, in [−1, 1]
    pub skew: f64,
    /// Student-t degrees of freedom, in [3, 30]; 30 reads as Gaussian
    pub tail_df: f64,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            sigma: DEFAULT_SIGMA,
            skew: 0.0,
            tail_df: DEFAULT_TAIL_DF,
        }
    }
}

impl DistributionParams {
    /// Map a percentile quintuple into distribution parameters.
    ///
    /// Each output is clamped into its contract range; a non-finite
    /// intermediate falls back to that parameter's default.
    pub fn from_percentiles(q: &PercentileQuintuple) -> Self {
        let mu = if q.p50.is_finite() {
            q.p50.clamp(-1.0, 5.0)
        } else {
            DEFAULT_MU
        };

        let sigma_raw = (q.p75 - q.p25).abs() / NORMAL_IQR;
        let sigma = if sigma_raw.is_finite() {
            sigma_raw.clamp(0.01, 2.0)
        } else {
            DEFAULT_SIGMA
        };

        let upper = q.p95 - q.p50;
        let lower = q.p50 - q.p5;
        let skew_raw = 1.5 * (upper - lower) / (upper + lower + 1e-3);
        let skew = if skew_raw.is_finite() {
            skew_raw.clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let spread = q.p95 - q.p5;
        let tail_df = if spread.is_finite() {
            let df_raw = (30.0 / (spread / (2.0 * Z_90 * sigma)).max(0.8)).round();
            if df_raw.is_finite() {
                df_raw.clamp(3.0, 30.0)
            } else {
                DEFAULT_TAIL_DF
            }
        } else {
            DEFAULT_TAIL_DF
        };

        Self {
            mu,
            sigma,
            skew,
            tail_df,
        }
    }
}

impl From<&BootstrapDistribution> for PercentileQuintuple {
    fn from(dist: &BootstrapDistribution) -> Self {
        Self {
            p5: dist.p5,
            p25: dist.p25,
            p50: dist.p50,
            p75: dist.p75,
            p95: dist.p95,
        }
    }
}

/// Derive per-position parameters for a run.
///
/// Positions carrying user percentiles are mapped through the quintuple
/// formulas; the rest fall back to the default parameter set.
pub fn derive_params(snapshot: &PortfolioSnapshot) -> Vec<DistributionParams> {
    snapshot
        .positions
        .iter()
        .map(|position| {
            position
                .user_percentiles
                .as_ref()
                .map(DistributionParams::from_percentiles)
                .unwrap_or_default()
        })
        .collect()
}
