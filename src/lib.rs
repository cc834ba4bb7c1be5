//! # portfolio-risk
//!
//! Monte Carlo portfolio risk engine with a market-data service core.
//!
//! Two subsystems share this crate. The market-data side fetches daily
//! price series from an upstream provider, normalises them and derives the
//! statistical inputs a simulation needs: returns, volatility, beta with
//! lag alignment, pairwise correlation matrices and bootstrap annual-return
//! distributions, all behind a TTL'd key-value cache with single-flight
//! coalescing. The simulation side turns those inputs into terminal-return
//! and drawdown distributions via a correlated multivariate Student-t path
//! sampler, sharded across a worker pool.
//!
//! ## Quick start
//!
//! ```no_run
//! use portfolio_risk::{
//!     CancelFlag, CorrelationMatrix, PortfolioSnapshot, Position, SimulationConfig,
//!     run_simulation,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshot = PortfolioSnapshot::new(
//!     vec![Position {
//!         symbol: "AAPL".into(),
//!         quantity: 10.0,
//!         price: 190.0,
//!         currency: "USD".into(),
//!         user_percentiles: None,
//!     }],
//!     500.0,
//!     0.04,
//! )?;
//! let matrix = CorrelationMatrix::identity(1);
//! let config = SimulationConfig::new().seed(42);
//! let summary = run_simulation(&snapshot, &matrix, 10_000, &config, None, &CancelFlag::new())?;
//! println!("p5 {:.2}%  p50 {:.2}%", summary.percentiles.p5 * 100.0, summary.percentiles.p50 * 100.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Typed key-value cache with TTLs and single-flight coalescing
pub mod cache;
/// HTTP client for the upstream price provider
pub mod client;
/// Enumerations and constants shared across the engine
pub mod constants;
/// Error types and result definitions
pub mod error;
/// Correlation matrix engine: build, repair, factor
pub mod matrix;
/// Portfolio input contract
pub mod portfolio;
/// Price provider adapter
pub mod provider;
/// Embedded seeded PRNG
pub mod rng;
/// Monte Carlo simulation engine
pub mod simulation;
/// Returns and statistics kernel
pub mod stats;

// Re-export main types
pub use client::{ClientConfig, ProviderClient};
pub use constants::{DEFAULT_BENCHMARK, Interval, TimeRange};
pub use error::{ErrorCategory, Result, RiskError};
pub use matrix::{CholeskyFactor, CorrelationMatrix, CorrelationMethod};
pub use portfolio::{PercentileQuintuple, PortfolioSnapshot, Position};
pub use provider::{CompanyProfile, FxRate, PriceSeries, Quote};
pub use simulation::{
    CancelFlag, FatTailMode, SamplingMode, SimulationConfig, SimulationSummary, run_simulation,
};
