//! Data shapes returned by the provider adapter.

use serde::{Deserialize, Serialize};

/// Instrument metadata attached to a price series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesMeta {
    /// Latest regular-session price
    pub regular_market_price: Option<f64>,
    /// Previous regular-session close
    pub previous_close: Option<f64>,
    /// Instrument type as reported upstream (EQUITY, ETF, CURRENCY, ...)
    pub instrument_type: Option<String>,
}

/// Daily adjusted close series for one symbol.
///
/// Timestamps are UTC-midnight aligned and strictly ascending. Upstream null
/// closes are dropped during normalisation; non-positive closes are retained
/// and skipped by the returns kernel instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeries {
    /// Upper-cased symbol
    pub symbol: String,
    /// Trading currency of the series
    pub currency: String,
    /// UTC-midnight timestamps, seconds since the epoch
    pub timestamps: Vec<i64>,
    /// Split/dividend-adjusted daily closes, parallel to `timestamps`
    pub prices: Vec<f64>,
    /// Instrument metadata
    pub meta: SeriesMeta,
}

impl PriceSeries {
    /// Number of observations
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether the series holds no observations
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Last close, if any
    pub fn last_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }
}

/// Spot quote for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Upper-cased symbol
    pub symbol: String,
    /// Latest regular-session price
    pub price: f64,
    /// Previous regular-session close
    pub previous_close: Option<f64>,
    /// Short display name
    pub name: Option<String>,
    /// Instrument type as reported upstream
    #[serde(rename = "type")]
    pub instrument_type: Option<String>,
    /// Trading currency
    pub currency: String,
}

/// Company profile for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    /// Upper-cased symbol
    pub symbol: String,
    /// Sector classification
    pub sector: Option<String>,
    /// Industry classification
    pub industry: Option<String>,
    /// Long display name
    pub long_name: Option<String>,
    /// Short display name
    pub short_name: Option<String>,
    /// Quote type (EQUITY, ETF, ...)
    pub quote_type: Option<String>,
    /// Country of incorporation
    pub country: Option<String>,
}

/// Spot FX rate for a currency pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    /// Source currency (ISO 4217)
    pub from: String,
    /// Target currency (ISO 4217)
    pub to: String,
    /// Units of `to` per unit of `from`
    pub rate: f64,
    /// Previous session's rate
    pub previous_close: Option<f64>,
    /// Timestamp of the rate, seconds since the epoch
    pub as_of: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_accessors() {
        let series = PriceSeries {
            symbol: "AAPL".into(),
            currency: "USD".into(),
            timestamps: vec![86400, 172800],
            prices: vec![100.0, 101.5],
            meta: SeriesMeta::default(),
        };
        assert_eq!(series.len(), 2);
        assert!(!series.is_empty());
        assert_eq!(series.last_price(), Some(101.5));
    }

    #[test]
    fn test_serde_camel_case() {
        let meta = SeriesMeta {
            regular_market_price: Some(190.1),
            previous_close: Some(188.8),
            instrument_type: Some("EQUITY".into()),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("regularMarketPrice").is_some());
        assert!(json.get("previousClose").is_some());
        assert!(json.get("instrumentType").is_some());
    }
}
