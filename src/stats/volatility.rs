//! Annualised volatility.

use crate::constants::trading;
use crate::error::{Result, RiskError};

/// Sample mean
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n−1 denominator)
pub(crate) fn stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Annualised volatility `stddev(daily) · √252`.
///
/// Requires at least 30 daily observations.
pub fn annualized_volatility(daily_returns: &[f64]) -> Result<f64> {
    let n = daily_returns.len();
    if n < trading::MIN_OBSERVATIONS {
        return Err(RiskError::InsufficientData {
            required: trading::MIN_OBSERVATIONS,
            actual: n,
        });
    }
    Ok(stddev(daily_returns) * (trading::DAYS_PER_YEAR as f64).sqrt())
}
