//! Enumerations and constants shared across the engine.

use serde::{Deserialize, Serialize};

/// Trading-day arithmetic used throughout the statistics kernel.
pub mod trading {
    /// Trading days in a calendar year; drives annualisation and bootstrap length
    pub const DAYS_PER_YEAR: usize = 252;

    /// Observations back for the 1-year window (252 returns need 253 prices)
    pub const ONE_YEAR_OBSERVATIONS: usize = 253;

    /// Observations back for the 30-day window
    pub const THIRTY_DAY_OBSERVATIONS: usize = 22;

    /// Minimum observations for volatility and correlation estimates
    pub const MIN_OBSERVATIONS: usize = 30;

    /// Minimum observations for the 1-year return window
    pub const MIN_ONE_YEAR_OBSERVATIONS: usize = 200;

    /// Minimum log-return pool size for the bootstrap distribution
    pub const MIN_BOOTSTRAP_POOL: usize = 50;
}

/// Upstream data source base URLs
pub mod urls {
    /// Base URL for the upstream chart/quote API
    pub const UPSTREAM_QUERY: &str = "https://query1.finance.yahoo.com";
}

/// Upstream endpoint builders
pub mod endpoints {
    use super::urls::*;

    /// Historical chart data endpoint
    pub fn chart(symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", UPSTREAM_QUERY, symbol)
    }

    /// Quote summary endpoint (profile modules)
    pub fn quote_summary(symbol: &str) -> String {
        format!("{}/v10/finance/quoteSummary/{}", UPSTREAM_QUERY, symbol)
    }

    /// Batch quotes endpoint
    pub const QUOTES: &str = const_format::concatcp!(UPSTREAM_QUERY, "/v7/finance/quote");
}

/// Historical range accepted by the provider and every compute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    /// Six months
    SixMonths,
    /// One year
    OneYear,
    /// Two years
    TwoYears,
    /// Three years
    ThreeYears,
    /// Five years
    FiveYears,
    /// Ten years
    TenYears,
}

impl TimeRange {
    /// Wire representation (`6mo`, `1y`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::SixMonths => "6mo",
            TimeRange::OneYear => "1y",
            TimeRange::TwoYears => "2y",
            TimeRange::ThreeYears => "3y",
            TimeRange::FiveYears => "5y",
            TimeRange::TenYears => "10y",
        }
    }

    /// Parse the wire representation. Returns `None` outside the enumeration.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "6mo" => Some(TimeRange::SixMonths),
            "1y" => Some(TimeRange::OneYear),
            "2y" => Some(TimeRange::TwoYears),
            "3y" => Some(TimeRange::ThreeYears),
            "5y" => Some(TimeRange::FiveYears),
            "10y" => Some(TimeRange::TenYears),
            _ => None,
        }
    }

    /// Target overlap in trading days for a pairwise correlation at this range
    pub fn target_overlap(&self) -> usize {
        match self {
            TimeRange::SixMonths => 126,
            TimeRange::OneYear => trading::DAYS_PER_YEAR,
            TimeRange::TwoYears => 2 * trading::DAYS_PER_YEAR,
            TimeRange::ThreeYears => 3 * trading::DAYS_PER_YEAR,
            TimeRange::FiveYears => 5 * trading::DAYS_PER_YEAR,
            TimeRange::TenYears => 10 * trading::DAYS_PER_YEAR,
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling interval. Only daily bars are supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    /// One trading day per observation
    #[default]
    OneDay,
}

impl Interval {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneDay => "1d",
        }
    }

    /// Parse the wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Interval::OneDay),
            _ => None,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default benchmark for beta and lag alignment
pub const DEFAULT_BENCHMARK: &str = "SPY";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_round_trip() {
        for s in ["6mo", "1y", "2y", "3y", "5y", "10y"] {
            let range = TimeRange::parse(s).unwrap();
            assert_eq!(range.as_str(), s);
        }
        assert!(TimeRange::parse("1mo").is_none());
        assert!(TimeRange::parse("max").is_none());
    }

    #[test]
    fn test_interval_round_trip() {
        assert_eq!(Interval::parse("1d"), Some(Interval::OneDay));
        assert!(Interval::parse("1h").is_none());
    }

    #[test]
    fn test_target_overlap() {
        assert_eq!(TimeRange::OneYear.target_overlap(), 252);
        assert_eq!(TimeRange::FiveYears.target_overlap(), 1260);
    }
}
