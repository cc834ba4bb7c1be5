//! Daily, windowed and calendar-year returns.

use chrono::{DateTime, Datelike};
use std::collections::BTreeMap;

use crate::constants::trading;
use crate::error::{Result, RiskError};
use crate::provider::PriceSeries;

/// Simple daily returns `(p_t − p_{t−1}) / p_{t−1}`.
///
/// Adjacent pairs containing any non-positive price are skipped: nothing is
/// emitted at that index rather than a zero.
pub fn daily_returns(series: &PriceSeries) -> Vec<f64> {
    series
        .prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Log returns `ln(p_t / p_{t−1})` under the same non-positive skip rule.
pub fn log_returns(series: &PriceSeries) -> Vec<f64> {
    series
        .prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Daily returns tagged with the timestamp of the later observation.
///
/// The calendar-date form feeds lag alignment against a benchmark.
pub fn dated_daily_returns(series: &PriceSeries) -> Vec<(i64, f64)> {
    series
        .prices
        .windows(2)
        .zip(series.timestamps.windows(2))
        .filter(|(prices, _)| prices[0] > 0.0 && prices[1] > 0.0)
        .map(|(prices, ts)| (ts[1], (prices[1] - prices[0]) / prices[0]))
        .collect()
}

/// Return windows over one series.
#[derive(Debug)]
pub struct WindowReturns {
    /// Return since the first trading day of the current year
    pub ytd: Result<f64>,
    /// Return over the trailing year (253 observations)
    pub one_year: Result<f64>,
    /// Return over the trailing 30 calendar days (22 observations)
    pub thirty_day: Result<f64>,
}

/// Compute YTD / 1Y / 30D windows against the given current year.
pub fn window_returns(series: &PriceSeries, current_year: i32) -> WindowReturns {
    WindowReturns {
        ytd: ytd_return(series, current_year),
        one_year: trailing_return(series, trading::ONE_YEAR_OBSERVATIONS, trading::MIN_ONE_YEAR_OBSERVATIONS),
        thirty_day: trailing_return(
            series,
            trading::THIRTY_DAY_OBSERVATIONS,
            trading::THIRTY_DAY_OBSERVATIONS + 1,
        ),
    }
}

fn year_of(ts: i64) -> i32 {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.year())
        .unwrap_or(0)
}

fn ytd_return(series: &PriceSeries, current_year: i32) -> Result<f64> {
    let first_of_year = series
        .timestamps
        .iter()
        .position(|&ts| year_of(ts) == current_year);
    let Some(start) = first_of_year else {
        return Err(RiskError::InsufficientData {
            required: 1,
            actual: 0,
        });
    };
    let start_price = series.prices[start];
    let last = series.last_price().unwrap_or(0.0);
    if start_price <= 0.0 || last <= 0.0 {
        return Err(RiskError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    Ok(last / start_price - 1.0)
}

/// `last / price N observations earlier − 1`, gated on a minimum length.
fn trailing_return(series: &PriceSeries, lookback: usize, min_len: usize) -> Result<f64> {
    let n = series.len();
    if n < min_len {
        return Err(RiskError::InsufficientData {
            required: min_len,
            actual: n,
        });
    }
    let anchor = n.saturating_sub(lookback).min(n - 1);
    let base = series.prices[anchor];
    let last = series.prices[n - 1];
    if base <= 0.0 || last <= 0.0 {
        return Err(RiskError::InsufficientData {
            required: min_len,
            actual: 0,
        });
    }
    Ok(last / base - 1.0)
}

/// Per-calendar-year returns `last/first − 1`, partial current year included.
///
/// Years whose boundary prices are non-positive are omitted.
pub fn calendar_year_returns(series: &PriceSeries) -> BTreeMap<i32, f64> {
    let mut boundaries: BTreeMap<i32, (f64, f64)> = BTreeMap::new();
    for (&ts, &price) in series.timestamps.iter().zip(series.prices.iter()) {
        let year = year_of(ts);
        boundaries
            .entry(year)
            .and_modify(|(_, last)| *last = price)
            .or_insert((price, price));
    }

    boundaries
        .into_iter()
        .filter(|(_, (first, last))| *first > 0.0 && *last > 0.0)
        .map(|(year, (first, last))| (year, last / first - 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SeriesMeta;

    fn make_series(prices: Vec<f64>) -> PriceSeries {
        // Daily timestamps starting 2024-01-02 UTC midnight
        let start = 1_704_153_600_i64;
        PriceSeries {
            symbol: "TEST".into(),
            currency: "USD".into(),
            timestamps: (0..prices.len() as i64).map(|i| start + i * 86_400).collect(),
            prices,
            meta: SeriesMeta::default(),
        }
    }

    #[test]
    fn test_daily_returns_basic() {
        let series = make_series(vec![100.0, 110.0, 99.0]);
        let returns = daily_returns(&series);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_daily_returns_skip_zero_price() {
        let series = make_series(vec![100.0, 0.0, 200.0]);
        assert!(daily_returns(&series).is_empty());
        assert!(log_returns(&series).is_empty());
    }

    #[test]
    fn test_log_returns_match_exp() {
        let series = make_series(vec![100.0, 105.0, 101.0]);
        let simple = daily_returns(&series);
        let log = log_returns(&series);
        for (s, l) in simple.iter().zip(log.iter()) {
            assert!((l.exp() - 1.0 - s).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dated_returns_carry_later_timestamp() {
        let series = make_series(vec![100.0, 110.0]);
        let dated = dated_daily_returns(&series);
        assert_eq!(dated.len(), 1);
        assert_eq!(dated[0].0, series.timestamps[1]);
    }

    #[test]
    fn test_one_year_window_insufficient() {
        let series = make_series(vec![100.0; 150]);
        let windows = window_returns(&series, 2024);
        match windows.one_year {
            Err(RiskError::InsufficientData { required, actual }) => {
                assert_eq!(required, 200);
                assert_eq!(actual, 150);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_thirty_day_window() {
        let mut prices = vec![100.0; 30];
        prices.extend(vec![110.0; 1]);
        let series = make_series(prices);
        let windows = window_returns(&series, 2024);
        // 22 observations back from the last lands on a 100.0 close
        let thirty = windows.thirty_day.unwrap();
        assert!((thirty - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_ytd_uses_first_trading_day_of_year() {
        // 2023-12-29 then 2024 days
        let series = PriceSeries {
            symbol: "TEST".into(),
            currency: "USD".into(),
            timestamps: vec![1_703_808_000, 1_704_153_600, 1_704_240_000],
            prices: vec![90.0, 100.0, 108.0],
            meta: SeriesMeta::default(),
        };
        let ytd = window_returns(&series, 2024).ytd.unwrap();
        assert!((ytd - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_calendar_year_returns_partial_current_year() {
        // Two days in 2023, two in 2024
        let series = PriceSeries {
            symbol: "TEST".into(),
            currency: "USD".into(),
            timestamps: vec![1_672_617_600, 1_703_808_000, 1_704_153_600, 1_704_240_000],
            prices: vec![80.0, 96.0, 100.0, 110.0],
            meta: SeriesMeta::default(),
        };
        let years = calendar_year_returns(&series);
        assert!((years[&2023] - 0.20).abs() < 1e-12);
        assert!((years[&2024] - 0.10).abs() < 1e-12);
    }
}
