//! Price provider adapter.
//!
//! Fetches raw daily series, quotes, company profiles and FX rates from the
//! upstream HTTP source and normalises them into one shape: UTC-midnight
//! timestamps, adjusted closes, nulls dropped. Transient upstream errors
//! propagate to the caller and are never cached.

mod models;

pub mod currency;

pub use models::{CompanyProfile, FxRate, PriceSeries, Quote, SeriesMeta};

use crate::client::ProviderClient;
use crate::constants::{Interval, TimeRange, endpoints};
use crate::error::{Result, RiskError};
use tracing::{debug, info};

const SECONDS_PER_DAY: i64 = 86_400;

/// Validate a symbol is non-empty
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(RiskError::InvalidInput {
            param: "symbol".to_string(),
            reason: "Empty symbol provided".to_string(),
        });
    }
    Ok(())
}

/// Split a 6-letter FX pair (`EURUSD`) into its currency legs
pub fn parse_fx_pair(pair: &str) -> Result<(String, String)> {
    let trimmed = pair.trim().to_uppercase();
    if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(RiskError::InvalidInput {
            param: "pairs".to_string(),
            reason: format!("'{}' is not a 6-letter currency pair", pair),
        });
    }
    Ok((trimmed[..3].to_string(), trimmed[3..].to_string()))
}

/// Fetch the adjusted daily price series for a symbol.
///
/// Guarantees on the result: timestamps are day-aligned UTC midnight and
/// strictly ascending; prices are split/dividend adjusted; upstream nulls
/// are skipped rather than emitted as zeros.
pub async fn fetch_series(
    client: &ProviderClient,
    symbol: &str,
    range: TimeRange,
    interval: Interval,
) -> Result<PriceSeries> {
    validate_symbol(symbol)?;
    let symbol = symbol.to_uppercase();

    info!(symbol = %symbol, range = %range, interval = %interval, "Fetching price series");

    let url = endpoints::chart(&symbol);
    let params = [
        ("range", range.as_str()),
        ("interval", interval.as_str()),
        ("events", "div,split"),
    ];
    let json = client.get_json(&url, &params).await?;

    parse_chart_response(&symbol, &json)
}

/// Fetch the spot quote for a symbol
pub async fn fetch_quote(client: &ProviderClient, symbol: &str) -> Result<Quote> {
    validate_symbol(symbol)?;
    let symbol = symbol.to_uppercase();

    debug!(symbol = %symbol, "Fetching quote");

    let url = endpoints::chart(&symbol);
    let params = [("range", "1d"), ("interval", "1d")];
    let json = client.get_json(&url, &params).await?;

    let meta = chart_meta(&json)?;
    let price = meta
        .get("regularMarketPrice")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RiskError::ResponseStructureError {
            field: "meta.regularMarketPrice".to_string(),
            context: format!("missing for {}", symbol),
        })?;

    Ok(Quote {
        symbol: symbol.clone(),
        price,
        previous_close: meta.get("chartPreviousClose").and_then(|v| v.as_f64()),
        name: meta
            .get("shortName")
            .or_else(|| meta.get("longName"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        instrument_type: meta
            .get("instrumentType")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        currency: meta
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string(),
    })
}

/// Fetch the company profile for a symbol
pub async fn fetch_profile(client: &ProviderClient, symbol: &str) -> Result<CompanyProfile> {
    validate_symbol(symbol)?;
    let symbol = symbol.to_uppercase();

    debug!(symbol = %symbol, "Fetching profile");

    let url = endpoints::quote_summary(&symbol);
    let params = [("modules", "assetProfile,quoteType")];
    let json = client.get_json(&url, &params).await?;

    let result = json
        .get("quoteSummary")
        .and_then(|qs| qs.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| {
            RiskError::SymbolNotFound {
                symbol: None,
                context: "empty quoteSummary result".to_string(),
            }
            .with_symbol(&symbol)
        })?;

    let asset_profile = result.get("assetProfile");
    let quote_type = result.get("quoteType");
    let str_field = |obj: Option<&serde_json::Value>, key: &str| {
        obj.and_then(|o| o.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    Ok(CompanyProfile {
        symbol: symbol.clone(),
        sector: str_field(asset_profile, "sector"),
        industry: str_field(asset_profile, "industry"),
        long_name: str_field(quote_type, "longName"),
        short_name: str_field(quote_type, "shortName"),
        quote_type: str_field(quote_type, "quoteType"),
        country: str_field(asset_profile, "country"),
    })
}

/// Fetch the spot FX rate for a currency pair.
///
/// Pairs use the upstream `<FROM><TO>=X` symbol convention; identical legs
/// short-circuit to a rate of 1.0.
pub async fn fetch_fx(client: &ProviderClient, from: &str, to: &str) -> Result<FxRate> {
    let from = from.to_uppercase();
    let to = to.to_uppercase();

    if from == to {
        return Ok(FxRate {
            from,
            to,
            rate: 1.0,
            previous_close: Some(1.0),
            as_of: chrono::Utc::now().timestamp(),
        });
    }

    debug!(from = %from, to = %to, "Fetching FX rate");

    let pair_symbol = format!("{}{}=X", from, to);
    let url = endpoints::chart(&pair_symbol);
    let params = [("range", "1d"), ("interval", "1d")];
    let json = client.get_json(&url, &params).await?;

    let meta = chart_meta(&json)?;
    let rate = meta
        .get("regularMarketPrice")
        .and_then(|v| v.as_f64())
        .filter(|r| r.is_finite() && *r > 0.0)
        .ok_or_else(|| RiskError::ResponseStructureError {
            field: "meta.regularMarketPrice".to_string(),
            context: format!("missing rate for {}/{}", from, to),
        })?;

    Ok(FxRate {
        from,
        to,
        rate,
        previous_close: meta.get("chartPreviousClose").and_then(|v| v.as_f64()),
        as_of: meta
            .get("regularMarketTime")
            .and_then(|v| v.as_i64())
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
    })
}

/// Pull `chart.result[0].meta` out of an upstream chart response
fn chart_meta(json: &serde_json::Value) -> Result<&serde_json::Map<String, serde_json::Value>> {
    json.get("chart")
        .and_then(|c| c.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .and_then(|r| r.get("meta"))
        .and_then(|m| m.as_object())
        .ok_or_else(|| RiskError::ResponseStructureError {
            field: "chart.result[0].meta".to_string(),
            context: "missing or malformed".to_string(),
        })
}

/// Normalise an upstream chart response into a [`PriceSeries`].
///
/// Adjusted closes are preferred over raw closes. Entries whose close is
/// null are dropped; timestamps collapse to UTC midnight and must remain
/// strictly ascending (later duplicates of the same day are dropped).
fn parse_chart_response(symbol: &str, json: &serde_json::Value) -> Result<PriceSeries> {
    let result = json
        .get("chart")
        .and_then(|c| c.get("result"))
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| {
            // Upstream reports unknown symbols inside chart.error
            let description = json
                .get("chart")
                .and_then(|c| c.get("error"))
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .unwrap_or("empty chart result");
            RiskError::SymbolNotFound {
                symbol: None,
                context: description.to_string(),
            }
            .with_symbol(symbol)
        })?;

    let meta = result
        .get("meta")
        .and_then(|m| m.as_object())
        .ok_or_else(|| RiskError::ResponseStructureError {
            field: "chart.result[0].meta".to_string(),
            context: "missing or malformed".to_string(),
        })?;

    let timestamps: Vec<Option<i64>> = result
        .get("timestamp")
        .and_then(|t| t.as_array())
        .map(|arr| arr.iter().map(|v| v.as_i64()).collect())
        .unwrap_or_default();

    let closes: Vec<Option<f64>> = result
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.as_array())
        .and_then(|arr| arr.first())
        .and_then(|q| q.get("close"))
        .and_then(|c| c.as_array())
        .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
        .unwrap_or_default();

    let adjusted: Vec<Option<f64>> = result
        .get("indicators")
        .and_then(|i| i.get("adjclose"))
        .and_then(|a| a.as_array())
        .and_then(|arr| arr.first())
        .and_then(|a| a.get("adjclose"))
        .and_then(|c| c.as_array())
        .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
        .unwrap_or_default();

    let mut out_timestamps = Vec::with_capacity(timestamps.len());
    let mut out_prices = Vec::with_capacity(timestamps.len());
    let mut last_day: Option<i64> = None;

    for (i, ts) in timestamps.iter().enumerate() {
        let Some(ts) = ts else { continue };
        let price = adjusted
            .get(i)
            .copied()
            .flatten()
            .or_else(|| closes.get(i).copied().flatten());
        let Some(price) = price else { continue };
        if !price.is_finite() {
            continue;
        }

        let day = ts - ts.rem_euclid(SECONDS_PER_DAY);
        if last_day.is_some_and(|prev| day <= prev) {
            continue;
        }
        last_day = Some(day);
        out_timestamps.push(day);
        out_prices.push(price);
    }

    debug!(
        symbol = %symbol,
        points = out_prices.len(),
        skipped = timestamps.len() - out_prices.len(),
        "Normalised price series"
    );

    Ok(PriceSeries {
        symbol: symbol.to_string(),
        currency: meta
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string(),
        timestamps: out_timestamps,
        prices: out_prices,
        meta: SeriesMeta {
            regular_market_price: meta.get("regularMarketPrice").and_then(|v| v.as_f64()),
            previous_close: meta.get("chartPreviousClose").and_then(|v| v.as_f64()),
            instrument_type: meta
                .get("instrumentType")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;

    fn chart_json(timestamps: Vec<i64>, closes: Vec<Option<f64>>) -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "regularMarketPrice": 101.0,
                        "chartPreviousClose": 99.0,
                        "instrumentType": "EQUITY"
                    },
                    "timestamp": timestamps,
                    "indicators": {
                        "quote": [{"close": closes}]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_drops_nulls_and_aligns_midnight() {
        // 2024-01-02 14:30 UTC and 2024-01-03 14:30 UTC session stamps
        let json = chart_json(
            vec![1_704_205_800, 1_704_292_200, 1_704_378_600],
            vec![Some(100.0), None, Some(102.0)],
        );
        let series = parse_chart_response("AAPL", &json).unwrap();
        assert_eq!(series.prices, vec![100.0, 102.0]);
        assert_eq!(series.timestamps.len(), 2);
        for ts in &series.timestamps {
            assert_eq!(ts % 86_400, 0, "timestamp {ts} not midnight-aligned");
        }
        assert!(series.timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_prefers_adjusted_close() {
        let mut json = chart_json(vec![1_704_205_800], vec![Some(100.0)]);
        json["chart"]["result"][0]["indicators"]["adjclose"] =
            json!([{ "adjclose": [98.5] }]);
        let series = parse_chart_response("AAPL", &json).unwrap();
        assert_eq!(series.prices, vec![98.5]);
    }

    #[test]
    fn test_parse_keeps_non_positive_close() {
        // Zero closes survive normalisation; the returns kernel skips them
        let json = chart_json(vec![1_704_205_800, 1_704_292_200], vec![Some(100.0), Some(0.0)]);
        let series = parse_chart_response("X", &json).unwrap();
        assert_eq!(series.prices, vec![100.0, 0.0]);
    }

    #[test]
    fn test_parse_unknown_symbol() {
        let json = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"}
            }
        });
        let err = parse_chart_response("NOPE", &json).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_fx_pair() {
        let (from, to) = parse_fx_pair("eurusd").unwrap();
        assert_eq!((from.as_str(), to.as_str()), ("EUR", "USD"));
        assert!(parse_fx_pair("EUR/USD").is_err());
        assert!(parse_fx_pair("EURUS").is_err());
    }

    #[tokio::test]
    async fn test_fetch_series_from_mock_upstream() {
        let mut upstream = mockito::Server::new_async().await;
        let body = chart_json(
            vec![1_704_205_800, 1_704_292_200],
            vec![Some(100.0), Some(110.0)],
        );
        let mock = upstream
            .mock("GET", "/v8/finance/chart/AAPL")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = ProviderClient::new(
            ClientConfig::builder().base_url(upstream.url()).build(),
        )
        .unwrap();

        let series = fetch_series(&client, "aapl", TimeRange::OneYear, Interval::OneDay)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.prices, vec![100.0, 110.0]);
        assert_eq!(series.currency, "USD");
    }

    #[tokio::test]
    async fn test_fetch_fx_identity_pair() {
        let client = ProviderClient::new(ClientConfig::default()).unwrap();
        let fx = fetch_fx(&client, "usd", "USD").await.unwrap();
        assert_eq!(fx.rate, 1.0);
    }

    #[tokio::test]
    async fn test_fetch_series_empty_symbol() {
        let client = ProviderClient::new(ClientConfig::default()).unwrap();
        let err = fetch_series(&client, "  ", TimeRange::OneYear, Interval::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput { .. }));
    }
}
