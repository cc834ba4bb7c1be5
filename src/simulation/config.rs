//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::matrix::{CorrelationMethod, DEFAULT_SHRINKAGE_ALPHA};

/// Fixed internal seed when the caller does not supply one
pub const DEFAULT_SEED: u64 = 12_345;

/// Hard cap on parallel shards
pub const MAX_WORKERS: usize = 8;

/// Tail behaviour of the per-path return model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FatTailMode {
    /// Correlated Gaussian shocks
    Gaussian,
    /// Multivariate Student-t via chi-squared scaling
    #[default]
    MultivariateT,
}

/// Uniform source behind the normal draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Seeded pseudo-random driver
    #[default]
    PseudoRandom,
    /// Scrambled Sobol driver with inverse-CDF mapping
    Qmc,
}

/// Immutable per-run configuration.
///
/// Built once per simulation request and shared read-only with every shard.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tail behaviour of the return model
    pub fat_tail_mode: FatTailMode,
    /// Uniform source behind the normal draws
    pub sampling_mode: SamplingMode,
    /// Recency-weight the correlation estimator
    pub use_ewma: bool,
    /// Fold GLD positions into the cash bucket
    pub gld_as_cash: bool,
    /// Correlation estimator selection
    pub correlation_method: CorrelationMethod,
    /// Shrinkage intensity toward the identity, in [0, 1]
    pub shrinkage_alpha: f64,
    /// Drawdown level whose exceedance probability is reported, in (0, 1]
    pub drawdown_threshold: f64,
    /// PRNG seed; `None` uses a fixed internal seed
    pub seed: Option<u64>,
    /// Worker override; `None` uses `min(hardware threads, 8)`
    pub workers: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fat_tail_mode: FatTailMode::default(),
            sampling_mode: SamplingMode::default(),
            use_ewma: false,
            gld_as_cash: false,
            correlation_method: CorrelationMethod::default(),
            shrinkage_alpha: DEFAULT_SHRINKAGE_ALPHA,
            drawdown_threshold: 0.20,
            seed: None,
            workers: None,
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fat-tail mode
    pub fn fat_tail_mode(mut self, mode: FatTailMode) -> Self {
        self.fat_tail_mode = mode;
        self
    }

    /// Set the sampling mode
    pub fn sampling_mode(mut self, mode: SamplingMode) -> Self {
        self.sampling_mode = mode;
        self
    }

    /// Recency-weight the correlation estimator
    pub fn use_ewma(mut self, use_ewma: bool) -> Self {
        self.use_ewma = use_ewma;
        self
    }

    /// Fold GLD positions into the cash bucket
    pub fn gld_as_cash(mut self, gld_as_cash: bool) -> Self {
        self.gld_as_cash = gld_as_cash;
        self
    }

    /// Set the correlation estimator
    pub fn correlation_method(mut self, method: CorrelationMethod) -> Self {
        self.correlation_method = method;
        self
    }

    /// Set the shrinkage intensity (clamped into [0, 1])
    pub fn shrinkage_alpha(mut self, alpha: f64) -> Self {
        self.shrinkage_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Set the reported drawdown threshold (clamped into (0, 1])
    pub fn drawdown_threshold(mut self, threshold: f64) -> Self {
        self.drawdown_threshold = threshold.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    /// Set a fixed PRNG seed for reproducible runs
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the worker count (clamped into [1, 8])
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.clamp(1, MAX_WORKERS));
        self
    }

    /// Effective seed for this run
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    /// Effective worker count for this run
    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().min(MAX_WORKERS))
            .clamp(1, MAX_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = SimulationConfig::new()
            .fat_tail_mode(FatTailMode::Gaussian)
            .sampling_mode(SamplingMode::Qmc)
            .shrinkage_alpha(2.0)
            .drawdown_threshold(0.0)
            .seed(7)
            .workers(99);
        assert_eq!(config.fat_tail_mode, FatTailMode::Gaussian);
        assert_eq!(config.sampling_mode, SamplingMode::Qmc);
        assert_eq!(config.shrinkage_alpha, 1.0);
        assert!(config.drawdown_threshold > 0.0);
        assert_eq!(config.effective_seed(), 7);
        assert_eq!(config.effective_workers(), MAX_WORKERS);
    }

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.effective_seed(), DEFAULT_SEED);
        let workers = config.effective_workers();
        assert!((1..=MAX_WORKERS).contains(&workers));
    }
}
