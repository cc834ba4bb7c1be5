//! Returns and statistics kernel.
//!
//! Pure numeric functions over normalised price series: daily and log
//! returns, return windows, calendar-year returns, annualised volatility,
//! the bootstrap annual-return distribution, Pearson correlation (trailing,
//! EWMA-weighted and lag-aligned) and beta.

mod beta;
mod bootstrap;
mod correlation;
mod returns;
mod volatility;

pub use beta::{BetaResult, beta_with_lag};
pub use bootstrap::{
    BootstrapDistribution, DEFAULT_ITERATIONS, MAX_ITERATIONS, bootstrap_annual_distribution,
};
pub(crate) use bootstrap::percentile_sorted;
pub use correlation::{
    EWMA_LAMBDA, LagResult, lagged_correlation, pearson, pearson_ewma, pearson_trailing,
};
pub use returns::{
    WindowReturns, calendar_year_returns, daily_returns, dated_daily_returns, log_returns,
    window_returns,
};
pub use volatility::annualized_volatility;
