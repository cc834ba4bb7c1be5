//! Simulation coordinator.
//!
//! Partitions paths across a worker pool, owns the only mutable state of a
//! run (the output slots), joins shard results in shard-index order and
//! reduces them into the percentile summary. Shards receive read-only
//! shared inputs and are the unit of cancellation and timeout.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::{SamplingMode, SimulationConfig};
use super::params::{DistributionParams, derive_params};
use super::sampler::PathSampler;
use super::sobol::SobolSequence;
use crate::error::{Result, RiskError};
use crate::matrix::{CholeskyFactor, CorrelationMatrix};
use crate::portfolio::PortfolioSnapshot;
use crate::rng::SimRng;
use crate::stats::percentile_sorted;

/// Per-shard compute deadline
pub const SHARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Paths between cancellation checks inside a shard
const CANCEL_CHECK_INTERVAL: usize = 4_096;

/// Fraction of requested paths that must survive the finiteness filter
const MIN_VALID_FRACTION: f64 = 0.9;

/// Simulation lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Validating inputs and deriving weights
    Init,
    /// Repairing and factoring the correlation matrix
    Cholesky,
    /// Shards generating paths
    Sampling,
    /// Concatenating and summarising results
    Reducing,
    /// Summary ready
    Done,
}

/// Progress report passed to the caller's callback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Paths completed so far
    pub current_paths: usize,
    /// Paths requested
    pub total_paths: usize,
    /// Current phase
    pub phase: Phase,
}

/// Shared cancellation flag checked between paths and shard completions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal-return percentile set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPercentiles {
    /// 5th percentile
    pub p5: f64,
    /// 10th percentile
    pub p10: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
}

impl ReturnPercentiles {
    fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p5: percentile_sorted(sorted, 5.0),
            p10: percentile_sorted(sorted, 10.0),
            p25: percentile_sorted(sorted, 25.0),
            p50: percentile_sorted(sorted, 50.0),
            p75: percentile_sorted(sorted, 75.0),
            p90: percentile_sorted(sorted, 90.0),
            p95: percentile_sorted(sorted, 95.0),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            p5: f(self.p5),
            p10: f(self.p10),
            p25: f(self.p25),
            p50: f(self.p50),
            p75: f(self.p75),
            p90: f(self.p90),
            p95: f(self.p95),
        }
    }
}

/// Drawdown percentile set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPercentiles {
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Loss probabilities over the valid paths.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossProbabilities {
    /// `P(R < −0.10)`
    pub below_minus_ten_pct: f64,
    /// `P(R < −0.20)`
    pub below_minus_twenty_pct: f64,
    /// `P(R < 0)`
    pub below_zero: f64,
    /// `P(drawdown > threshold)` for the configured threshold
    pub drawdown_above_threshold: f64,
}

/// One simulation run's summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    /// Terminal-return percentiles
    pub percentiles: ReturnPercentiles,
    /// Mean terminal return
    pub mean: f64,
    /// Dollar terminal distribution, `netValue · (1 + r)`
    pub dollar_percentiles: ReturnPercentiles,
    /// Drawdown-proxy percentiles
    pub drawdown_percentiles: DrawdownPercentiles,
    /// Loss probabilities
    pub loss_probabilities: LossProbabilities,
    /// Paths surviving the finiteness filter
    pub valid_paths: usize,
    /// Paths requested
    pub total_paths: usize,
    /// Shards used
    pub workers: usize,
    /// Sorted valid terminal returns
    pub terminal_returns: Vec<f64>,
    /// Sorted valid drawdowns
    pub max_drawdowns: Vec<f64>,
}

/// Read-only inputs shared by every shard.
struct RunInputs {
    factor: CholeskyFactor,
    params: Vec<DistributionParams>,
    weights: Vec<f64>,
    cash_weight: f64,
    cash_rate: f64,
    portfolio_vol: f64,
    config: SimulationConfig,
    seed: u64,
}

/// Annual portfolio volatility `√(wᵀ·D·Σ·D·w)` with `D = diag(σ)`.
pub fn portfolio_volatility(
    matrix: &CorrelationMatrix,
    params: &[DistributionParams],
    weights: &[f64],
) -> f64 {
    let n = weights.len();
    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            variance +=
                weights[i] * weights[j] * matrix.get(i, j) * params[i].sigma * params[j].sigma;
        }
    }
    if variance.is_finite() && variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

/// Run a simulation to completion.
///
/// Preconditions: the matrix dimension matches the position count, the
/// snapshot has at least one position and positive net value. The matrix is
/// cloned internally before repair, so the caller's copy is untouched.
///
/// `progress` receives phase transitions and per-shard completion counts;
/// `cancel` is polled between paths (every ≤ 4096) and between shard
/// completions.
pub fn run_simulation(
    snapshot: &PortfolioSnapshot,
    matrix: &CorrelationMatrix,
    total_paths: usize,
    config: &SimulationConfig,
    progress: Option<&dyn Fn(Progress)>,
    cancel: &CancelFlag,
) -> Result<SimulationSummary> {
    let report = |phase: Phase, current: usize| {
        if let Some(callback) = progress {
            callback(Progress {
                current_paths: current,
                total_paths,
                phase,
            });
        }
    };

    report(Phase::Init, 0);
    if snapshot.is_empty() {
        return Err(RiskError::InvalidInput {
            param: "positions".to_string(),
            reason: "at least one position required".to_string(),
        });
    }
    if matrix.dim() != snapshot.len() {
        return Err(RiskError::InvalidInput {
            param: "correlation".to_string(),
            reason: format!(
                "matrix is {}x{} but portfolio has {} positions",
                matrix.dim(),
                matrix.dim(),
                snapshot.len()
            ),
        });
    }
    if !(snapshot.net_value.is_finite() && snapshot.net_value > 0.0) {
        return Err(RiskError::InvalidInput {
            param: "netValue".to_string(),
            reason: "net value must be positive".to_string(),
        });
    }
    if total_paths == 0 {
        return Err(RiskError::InvalidInput {
            param: "totalPaths".to_string(),
            reason: "at least one path required".to_string(),
        });
    }

    let params = derive_params(snapshot);
    let portfolio_weights = snapshot.weights(config.gld_as_cash);

    report(Phase::Cholesky, 0);
    let mut working = matrix.clone();
    let factor = working.factor()?;
    let portfolio_vol = portfolio_volatility(&working, &params, &portfolio_weights.asset_weights);

    if config.sampling_mode == SamplingMode::Qmc && !SobolSequence::supports(snapshot.len()) {
        warn!(
            assets = snapshot.len(),
            "QMC unsupported at this dimension, falling back to pseudo-random"
        );
    }

    let workers = config.effective_workers().min(total_paths);
    let inputs = Arc::new(RunInputs {
        factor,
        params,
        weights: portfolio_weights.asset_weights,
        cash_weight: portfolio_weights.cash_weight,
        cash_rate: snapshot.cash_rate,
        portfolio_vol,
        config: config.clone(),
        seed: config.effective_seed(),
    });

    info!(
        total_paths,
        workers,
        assets = snapshot.len(),
        seed = inputs.seed,
        "Starting simulation"
    );

    let base = total_paths / workers;
    let remainder = total_paths % workers;
    let (sender, receiver) = mpsc::channel::<(usize, Vec<f64>, Vec<f64>)>();

    let mut start = 0usize;
    for shard_index in 0..workers {
        let shard_len = base + usize::from(shard_index < remainder);
        let shard_start = start;
        start += shard_len;

        let inputs = Arc::clone(&inputs);
        let sender = sender.clone();
        let cancel = cancel.clone();
        rayon::spawn(move || {
            let (returns, drawdowns) = run_shard(&inputs, shard_index, shard_start, shard_len, &cancel);
            // The receiver may already be gone after a timeout or cancel
            let _ = sender.send((shard_index, returns, drawdowns));
        });
    }
    drop(sender);

    report(Phase::Sampling, 0);
    let mut slots: Vec<Option<(Vec<f64>, Vec<f64>)>> = (0..workers).map(|_| None).collect();
    let mut completed_paths = 0usize;
    for _ in 0..workers {
        if cancel.is_cancelled() {
            info!("Simulation cancelled");
            return Err(RiskError::Cancelled);
        }
        match receiver.recv_timeout(SHARD_TIMEOUT) {
            Ok((shard_index, returns, drawdowns)) => {
                completed_paths += returns.len();
                debug!(shard = shard_index, paths = returns.len(), "Shard complete");
                slots[shard_index] = Some((returns, drawdowns));
                report(Phase::Sampling, completed_paths);
            }
            Err(_) => {
                let stuck = slots.iter().position(Option::is_none).unwrap_or(0);
                warn!(shard = stuck, "Shard timed out, abandoning run");
                return Err(RiskError::ShardTimeout {
                    shard: stuck,
                    timeout_ms: SHARD_TIMEOUT.as_millis() as u64,
                });
            }
        }
    }
    if cancel.is_cancelled() {
        info!("Simulation cancelled");
        return Err(RiskError::Cancelled);
    }

    report(Phase::Reducing, completed_paths);

    // Join in shard-index order so the pre-sort concatenation is
    // deterministic for a fixed shard count
    let mut terminal_returns = Vec::with_capacity(total_paths);
    let mut drawdowns = Vec::with_capacity(total_paths);
    for slot in slots.into_iter().flatten() {
        terminal_returns.extend(slot.0.into_iter().filter(|r| r.is_finite()));
        drawdowns.extend(slot.1.into_iter().filter(|d| d.is_finite()));
    }

    let valid = terminal_returns.len();
    if (valid as f64) < MIN_VALID_FRACTION * total_paths as f64 {
        return Err(RiskError::InsufficientValidPaths {
            valid,
            total: total_paths,
        });
    }

    terminal_returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let percentiles = ReturnPercentiles::from_sorted(&terminal_returns);
    let net_value = snapshot.net_value;
    let dollar_percentiles = percentiles.map(|r| net_value * (1.0 + r));
    let mean = terminal_returns.iter().sum::<f64>() / valid as f64;

    let drawdown_percentiles = DrawdownPercentiles {
        p50: percentile_sorted(&drawdowns, 50.0),
        p75: percentile_sorted(&drawdowns, 75.0),
        p90: percentile_sorted(&drawdowns, 90.0),
        p95: percentile_sorted(&drawdowns, 95.0),
        p99: percentile_sorted(&drawdowns, 99.0),
    };

    fn probability(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().filter(|v| predicate(**v)).count() as f64 / values.len() as f64
    }
    let loss_probabilities = LossProbabilities {
        below_minus_ten_pct: probability(&terminal_returns, |r| r < -0.10),
        below_minus_twenty_pct: probability(&terminal_returns, |r| r < -0.20),
        below_zero: probability(&terminal_returns, |r| r < 0.0),
        drawdown_above_threshold: probability(&drawdowns, |d| d > config.drawdown_threshold),
    };

    report(Phase::Done, completed_paths);
    info!(valid, total_paths, "Simulation complete");

    Ok(SimulationSummary {
        percentiles,
        mean,
        dollar_percentiles,
        drawdown_percentiles,
        loss_probabilities,
        valid_paths: valid,
        total_paths,
        workers,
        terminal_returns,
        max_drawdowns: drawdowns,
    })
}

/// Shard worker: samples `shard_len` paths into freshly owned output
/// buffers, checking the cancellation flag every 4096 paths.
fn run_shard(
    inputs: &RunInputs,
    shard_index: usize,
    shard_start: usize,
    shard_len: usize,
    cancel: &CancelFlag,
) -> (Vec<f64>, Vec<f64>) {
    let sampler = PathSampler::new(
        &inputs.factor,
        &inputs.params,
        &inputs.weights,
        inputs.cash_weight,
        inputs.cash_rate,
        inputs.portfolio_vol,
        inputs.config.fat_tail_mode,
    );
    let n = sampler.dim();

    // Deterministic sub-stream per shard; the Sobol scramble shares the run
    // seed so shards walk disjoint ranges of one scrambled sequence
    let mut rng = SimRng::split(inputs.seed, shard_index as u64);
    let mut source = sampler.normal_source(
        inputs.config.sampling_mode,
        inputs.seed,
        shard_start as u64,
    );

    let mut z = vec![0.0; n];
    let mut x = vec![0.0; n];
    let mut returns = Vec::with_capacity(shard_len);
    let mut drawdowns = Vec::with_capacity(shard_len);

    for path in 0..shard_len {
        if path % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            debug!(shard = shard_index, done = path, "Shard stopping on cancel");
            break;
        }
        let result = sampler.sample_path(&mut rng, &mut source, &mut z, &mut x);
        returns.push(result.terminal_return);
        drawdowns.push(result.max_drawdown);
    }

    (returns, drawdowns)
}
