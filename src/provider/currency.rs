//! Currency normalisation for price series.

use super::models::{FxRate, PriceSeries};

/// A series converted to a target currency, with the local original kept
/// alongside.
#[derive(Debug, Clone)]
pub struct ConvertedSeries {
    /// The converted series (currency = the FX target)
    pub converted: PriceSeries,
    /// The original local-currency series, untouched
    pub local: PriceSeries,
    /// Rate applied per price point
    pub fx_rate: f64,
    /// Timestamp of the rate used
    pub fx_timestamp: i64,
}

/// Convert a series into the FX rate's target currency.
///
/// Pure function over `(series, rate)`: every close is multiplied by the
/// spot rate. Metadata prices convert the same way so quote-derived fields
/// stay consistent with the series.
pub fn convert_series(series: &PriceSeries, fx: &FxRate) -> ConvertedSeries {
    let mut converted = series.clone();
    converted.currency = fx.to.clone();
    for price in &mut converted.prices {
        *price *= fx.rate;
    }
    converted.meta.regular_market_price = series.meta.regular_market_price.map(|p| p * fx.rate);
    converted.meta.previous_close = series.meta.previous_close.map(|p| p * fx.rate);

    ConvertedSeries {
        converted,
        local: series.clone(),
        fx_rate: fx.rate,
        fx_timestamp: fx.as_of,
    }
}
