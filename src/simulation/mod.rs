//! Monte Carlo simulation engine.
//!
//! Distribution parameter mapping, the correlated fat-tailed path sampler
//! (pseudo-random or scrambled-Sobol driven) and the sharded coordinator
//! that reduces paths into a percentile summary.

mod config;
mod coordinator;
mod params;
mod sampler;
mod sobol;

pub use config::{
    DEFAULT_SEED, FatTailMode, MAX_WORKERS, SamplingMode, SimulationConfig,
};
pub use coordinator::{
    CancelFlag, DrawdownPercentiles, LossProbabilities, Phase, Progress, ReturnPercentiles,
    SHARD_TIMEOUT, SimulationSummary, portfolio_volatility, run_simulation,
};
pub use params::{
    DEFAULT_MU, DEFAULT_SIGMA, DEFAULT_TAIL_DF, DistributionParams, derive_params,
};
pub use sampler::{NormalSource, PathResult, PathSampler};
pub use sobol::{MAX_DIMENSION, SobolSequence};
