//! Portfolio input contract.
//!
//! The immutable snapshot a simulation run consumes. Built once per request
//! and never mutated during a run; workers receive read-only views.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// User-supplied annual-return percentile quintuple for one position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileQuintuple {
    /// 5th percentile
    pub p5: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
}

/// One portfolio position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Upper-cased symbol
    pub symbol: String,
    /// Signed quantity; negative for shorts
    pub quantity: f64,
    /// Currency-adjusted unit price; must be positive
    pub price: f64,
    /// Trading currency
    pub currency: String,
    /// Optional user-supplied return distribution percentiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_percentiles: Option<PercentileQuintuple>,
}

impl Position {
    /// Signed market value `quantity · price`
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Immutable portfolio snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    /// Positions in portfolio order; this order fixes matrix row order
    pub positions: Vec<Position>,
    /// Cash balance in the portfolio currency
    pub cash_balance: f64,
    /// Annual rate earned on the cash bucket
    pub cash_rate: f64,
    /// Sum of absolute position values
    pub gross_value: f64,
    /// `Σ(quantity · price) + cash`
    pub net_value: f64,
}

/// Leverage-adjusted weights derived from a snapshot.
#[derive(Debug, Clone)]
pub struct PortfolioWeights {
    /// Per-position weight of net value, position order
    pub asset_weights: Vec<f64>,
    /// Cash weight of net value
    pub cash_weight: f64,
}

impl PortfolioSnapshot {
    /// Build a snapshot, deriving gross and net value.
    ///
    /// Every position needs a positive currency-adjusted price and a finite
    /// quantity.
    pub fn new(positions: Vec<Position>, cash_balance: f64, cash_rate: f64) -> Result<Self> {
        for position in &positions {
            if !(position.price.is_finite() && position.price > 0.0) {
                return Err(RiskError::InvalidInput {
                    param: "positions".to_string(),
                    reason: format!("{}: price must be positive", position.symbol),
                });
            }
            if !position.quantity.is_finite() {
                return Err(RiskError::InvalidInput {
                    param: "positions".to_string(),
                    reason: format!("{}: quantity must be finite", position.symbol),
                });
            }
        }
        let gross_value: f64 = positions.iter().map(|p| p.value().abs()).sum();
        let net_value: f64 = positions.iter().map(Position::value).sum::<f64>() + cash_balance;
        Ok(Self {
            positions,
            cash_balance,
            cash_rate,
            gross_value,
            net_value,
        })
    }

    /// Position count
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the snapshot holds no positions
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Leverage-adjusted weights: each position's share of net value, so a
    /// leveraged book's asset weights sum past one before the (possibly
    /// negative) cash weight brings the total back to one.
    ///
    /// With `gld_as_cash`, GLD positions contribute to the cash weight and
    /// get a zero asset weight instead.
    pub fn weights(&self, gld_as_cash: bool) -> PortfolioWeights {
        let net = self.net_value;
        let mut cash = self.cash_balance;
        let asset_weights = self
            .positions
            .iter()
            .map(|position| {
                if gld_as_cash && position.symbol.eq_ignore_ascii_case("GLD") {
                    cash += position.value();
                    0.0
                } else {
                    position.value() / net
                }
            })
            .collect();
        PortfolioWeights {
            asset_weights,
            cash_weight: cash / net,
        }
    }
}
