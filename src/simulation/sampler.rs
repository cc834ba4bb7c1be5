//! Path sampler.
//!
//! Produces one `(terminal return, drawdown)` pair per path from correlated
//! fat-tailed shocks: Box–Muller (or inverse-CDF-mapped scrambled Sobol)
//! normals, Cholesky correlation, chi-squared Student-t scaling, a skew
//! transform and weighted portfolio aggregation.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf_inv;

use super::config::{FatTailMode, SamplingMode};
use super::params::DistributionParams;
use super::sobol::SobolSequence;
use crate::matrix::CholeskyFactor;
use crate::rng::SimRng;

/// Clip bound on standardised shocks in multivariate-t mode
const SHOCK_CLIP_T: f64 = 8.0;
/// Clip bound on standardised shocks in Gaussian mode
const SHOCK_CLIP_GAUSSIAN: f64 = 6.0;
/// Per-asset and portfolio return bounds (−100% to +1000%).
///
/// The upper bound is surprising but contractual; persisted percentiles
/// depend on it.
const RETURN_MIN: f64 = -1.0;
const RETURN_MAX: f64 = 10.0;
/// Degrees of freedom above which the chi-squared draw switches to its
/// Gaussian approximation
const CHI_SQUARED_GAUSSIAN_DF: f64 = 100.0;
/// Skew coefficients inside this band are treated as symmetric
const SKEW_EPSILON: f64 = 0.01;
/// Scale of the drawdown proxy
const DRAWDOWN_FACTOR: f64 = 0.8;

/// Outcome of one simulated path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    /// One-year terminal portfolio return, in [−1, 10]
    pub terminal_return: f64,
    /// Drawdown proxy, in [0, 1]
    pub max_drawdown: f64,
}

/// Source of the per-path standard normal vector.
pub enum NormalSource {
    /// Box–Muller over the shard's PRNG
    Pseudo,
    /// Scrambled Sobol point mapped through the inverse normal CDF.
    ///
    /// Each shard starts at a disjoint index so shards consume disjoint
    /// low-discrepancy points.
    Sobol {
        /// Generator of dimension N
        sequence: Box<SobolSequence>,
        /// Next point index
        index: u64,
    },
}

impl NormalSource {
    fn fill(&mut self, rng: &mut SimRng, z: &mut [f64]) {
        match self {
            NormalSource::Pseudo => {
                for slot in z.iter_mut() {
                    *slot = rng.next_gaussian();
                }
            }
            NormalSource::Sobol { sequence, index } => {
                sequence.point(*index, z);
                *index += 1;
                for slot in z.iter_mut() {
                    *slot = inverse_normal_cdf(*slot);
                }
            }
        }
    }
}

/// Standard normal quantile via the inverse error function
fn inverse_normal_cdf(p: f64) -> f64 {
    std::f64::consts::SQRT_2 * erf_inv(2.0 * p - 1.0)
}

/// Per-asset skew transform constants for `δ = skew / √(1 + skew²)`
#[derive(Debug, Clone, Copy)]
struct SkewTransform {
    delta: f64,
    scale: f64,
    offset: f64,
    active: bool,
}

impl SkewTransform {
    fn new(skew: f64) -> Self {
        let delta = skew / (1.0 + skew * skew).sqrt();
        Self {
            delta,
            scale: (1.0 - delta * delta).sqrt(),
            offset: delta * (2.0 / std::f64::consts::PI).sqrt(),
            active: skew.abs() > SKEW_EPSILON,
        }
    }

    #[inline]
    fn apply(&self, x: f64) -> f64 {
        if self.active {
            x * self.scale + self.delta * x.abs() - self.offset
        } else {
            x
        }
    }
}

/// Immutable per-run sampler shared read-only by every shard.
pub struct PathSampler<'a> {
    factor: &'a CholeskyFactor,
    params: &'a [DistributionParams],
    weights: &'a [f64],
    cash_weight: f64,
    cash_rate: f64,
    portfolio_vol: f64,
    fat_tail_mode: FatTailMode,
    skews: Vec<SkewTransform>,
    /// Minimum finite tail df; t-scaling engages below 30
    min_tail_df: Option<f64>,
    shock_clip: f64,
}

impl<'a> PathSampler<'a> {
    /// Build a sampler over per-run inputs. `weights` and `params` are in
    /// portfolio-position order, matching the factor's row order.
    pub fn new(
        factor: &'a CholeskyFactor,
        params: &'a [DistributionParams],
        weights: &'a [f64],
        cash_weight: f64,
        cash_rate: f64,
        portfolio_vol: f64,
        fat_tail_mode: FatTailMode,
    ) -> Self {
        debug_assert_eq!(factor.dim(), params.len());
        debug_assert_eq!(factor.dim(), weights.len());

        let min_tail_df = params
            .iter()
            .map(|p| p.tail_df)
            .filter(|df| df.is_finite())
            .fold(None, |acc: Option<f64>, df| {
                Some(acc.map_or(df, |m| m.min(df)))
            });
        let skews = params.iter().map(|p| SkewTransform::new(p.skew)).collect();
        let shock_clip = match fat_tail_mode {
            FatTailMode::Gaussian => SHOCK_CLIP_GAUSSIAN,
            FatTailMode::MultivariateT => SHOCK_CLIP_T,
        };

        Self {
            factor,
            params,
            weights,
            cash_weight,
            cash_rate,
            portfolio_vol,
            fat_tail_mode,
            skews,
            min_tail_df,
            shock_clip,
        }
    }

    /// Asset count
    pub fn dim(&self) -> usize {
        self.params.len()
    }

    /// Build the normal source for one shard. QMC shards start at their
    /// disjoint path offset; unsupported dimensions fall back to the
    /// pseudo-random driver (the caller logs the downgrade).
    pub fn normal_source(&self, mode: SamplingMode, seed: u64, start_index: u64) -> NormalSource {
        match mode {
            SamplingMode::Qmc => match SobolSequence::new(self.dim(), seed) {
                Ok(sequence) => NormalSource::Sobol {
                    sequence: Box::new(sequence),
                    index: start_index,
                },
                Err(_) => NormalSource::Pseudo,
            },
            SamplingMode::PseudoRandom => NormalSource::Pseudo,
        }
    }

    /// Sample one path.
    ///
    /// `z` and `x` are caller-owned scratch of length N; `rng` is the
    /// shard's PRNG (chi-squared and drawdown draws come from it in both
    /// sampling modes).
    pub fn sample_path(
        &self,
        rng: &mut SimRng,
        source: &mut NormalSource,
        z: &mut [f64],
        x: &mut [f64],
    ) -> PathResult {
        source.fill(rng, z);
        self.factor.mul_vector(z, x);

        // Student-t scaling: one chi-squared draw shared by all assets.
        // The joint product of √(df/χ²) and the √((df−2)/df) variance
        // correction slightly biases variance; preserved as-is so seeded
        // runs stay bit-identical with historical outputs.
        if self.fat_tail_mode == FatTailMode::MultivariateT
            && let Some(df) = self.min_tail_df.filter(|df| *df < 30.0)
        {
            let chi_squared = chi_squared(rng, df);
            let scale = (df / chi_squared).sqrt();
            let correction = if df > 2.0 {
                ((df - 2.0) / df).sqrt()
            } else {
                1.0
            };
            for value in x.iter_mut() {
                *value *= scale * correction;
            }
        }

        for value in x.iter_mut() {
            *value = value.clamp(-self.shock_clip, self.shock_clip);
        }

        let mut portfolio_return = self.cash_weight * self.cash_rate;
        for i in 0..self.params.len() {
            let shocked = self.skews[i].apply(x[i]);
            let asset_return =
                clamp_return(self.params[i].mu + shocked * self.params[i].sigma);
            portfolio_return += self.weights[i] * asset_return;
        }
        let terminal_return = clamp_return(portfolio_return);

        let drawdown_z = rng.next_gaussian();
        let max_drawdown =
            (self.portfolio_vol * drawdown_z.abs() * DRAWDOWN_FACTOR).clamp(0.0, 1.0);

        PathResult {
            terminal_return,
            max_drawdown,
        }
    }
}

/// Clamp a return into the contract range, coercing non-finite values to 0.
#[inline]
fn clamp_return(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(RETURN_MIN, RETURN_MAX)
}

/// Chi-squared draw with `df` degrees of freedom as a sum of squared
/// standard normals; above 100 degrees the Gaussian approximation
/// `df + √(2·df)·z` is used.
fn chi_squared(rng: &mut SimRng, df: f64) -> f64 {
    if df > CHI_SQUARED_GAUSSIAN_DF {
        return (df + (2.0 * df).sqrt() * rng.next_gaussian()).max(0.0);
    }
    let terms = df.round().max(1.0) as usize;
    let mut sum = 0.0;
    for _ in 0..terms {
        let z = rng.next_gaussian();
        sum += z * z;
    }
    sum
}
