//! Endpoint handlers.
//!
//! Every compute endpoint follows one pattern: canonicalise the query,
//! check the cache (returning `cached: true` on a hit), otherwise fetch
//! dependencies — themselves cached — compute, cache and return. Per-symbol
//! failures are embedded in the response map so partial success is normal;
//! top-level errors are reserved for malformed requests.

use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::{Extension, extract::Query};
use chrono::Datelike;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use portfolio_risk::cache::{keys, ttl};
use portfolio_risk::matrix::{CorrelationMatrix, CorrelationMethod, DEFAULT_SHRINKAGE_ALPHA, ensure_psd};
use portfolio_risk::provider::{self, currency};
use portfolio_risk::stats;
use portfolio_risk::{
    DEFAULT_BENCHMARK, FxRate, Interval, PriceSeries, RiskError, TimeRange,
};

use crate::AppState;

/// Routable endpoints advertised by `/` and `/health`
const ENDPOINTS: &[&str] = &[
    "/api/prices",
    "/api/quotes",
    "/api/profile",
    "/api/fx",
    "/api/beta",
    "/api/volatility",
    "/api/distribution",
    "/api/calendar-returns",
    "/api/correlation",
    "/health",
];

// ── Response helpers ─────────────────────────────────────────────────────────

fn ok_json(value: Value) -> Response {
    let mut response = (StatusCode::OK, Json(value)).into_response();
    response.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=60"),
    );
    response
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = (status, Json(json!({ "error": message.into() }))).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Top-level mapping: only malformed requests are client errors; everything
/// else that escapes per-symbol embedding is a 500.
fn risk_error_response(e: &RiskError) -> Response {
    error!(error = %e, category = ?e.category(), "Request failed");
    let status = match e {
        RiskError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RiskError::SymbolNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

/// Per-symbol error object embedded in response maps
fn embedded_error(e: &RiskError) -> Value {
    match e {
        RiskError::InsufficientData { required, actual } => json!({
            "error": e.to_string(),
            "minRequired": required,
            "actual": actual,
        }),
        _ => json!({ "error": e.to_string() }),
    }
}

// ── Query parsing ────────────────────────────────────────────────────────────

fn parse_symbols(raw: Option<&str>) -> Result<Vec<String>, Response> {
    let Some(raw) = raw else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "missing required parameter 'symbols'",
        ));
    };
    let parts: Vec<&str> = raw.split(',').collect();
    let canonical = keys::canonical_symbols(&parts);
    if canonical.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "no symbols provided",
        ));
    }
    Ok(canonical)
}

fn parse_range(raw: Option<&str>, default: TimeRange) -> Result<TimeRange, Response> {
    match raw {
        None => Ok(default),
        Some(raw) => TimeRange::parse(raw).ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid range '{}': expected 6mo|1y|2y|3y|5y|10y", raw),
            )
        }),
    }
}

fn parse_interval(raw: Option<&str>) -> Result<Interval, Response> {
    match raw {
        None => Ok(Interval::OneDay),
        Some(raw) => Interval::parse(raw).ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid interval '{}': expected 1d", raw),
            )
        }),
    }
}

fn wants_usd(currency: Option<&str>) -> bool {
    currency.is_some_and(|c| c.eq_ignore_ascii_case("USD"))
}

/// Deterministic seed from request identity, so identical inputs replay
/// identical bootstrap draws
fn stable_seed(parts: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
        hash ^= 0x7c;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

// ── Cached fetch building blocks ─────────────────────────────────────────────

async fn cached_series(
    state: &AppState,
    symbol: &str,
    range: TimeRange,
    interval: Interval,
) -> Result<(PriceSeries, bool), RiskError> {
    let key = keys::key("prices", 1, &[range.as_str(), interval.as_str(), symbol]);
    let client = state.client.clone();
    let symbol = symbol.to_string();
    state
        .cache
        .get_or_compute(&key, ttl::PRICES, move || async move {
            provider::fetch_series(&client, &symbol, range, interval).await
        })
        .await
}

async fn cached_fx(state: &AppState, from: &str, to: &str) -> Result<(FxRate, bool), RiskError> {
    let key = keys::key("fx", 1, &[&format!("{}{}", from, to)]);
    let client = state.client.clone();
    let (from, to) = (from.to_string(), to.to_string());
    state
        .cache
        .get_or_compute(&key, ttl::FX, move || async move {
            provider::fetch_fx(&client, &from, &to).await
        })
        .await
}

// ── Discovery endpoints ──────────────────────────────────────────────────────

fn discovery_payload() -> Value {
    json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
        "kvBound": true,
    })
}

/// GET /
pub async fn index() -> Response {
    ok_json(discovery_payload())
}

/// GET /health
pub async fn health() -> Response {
    ok_json(discovery_payload())
}

/// Fallback: unknown route
pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

// ── /api/prices ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PricesQuery {
    symbols: Option<String>,
    range: Option<String>,
    interval: Option<String>,
    currency: Option<String>,
}

/// GET /api/prices?symbols=&lt;csv&gt;&range=&lt;enum&gt;&interval=1d[&currency=USD]
pub async fn get_prices(
    Extension(state): Extension<AppState>,
    Query(params): Query<PricesQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let range = match parse_range(params.range.as_deref(), TimeRange::OneYear) {
        Ok(range) => range,
        Err(response) => return response,
    };
    let interval = match parse_interval(params.interval.as_deref()) {
        Ok(interval) => interval,
        Err(response) => return response,
    };
    let to_usd = wants_usd(params.currency.as_deref());

    info!(count = symbols.len(), range = %range, to_usd, "Prices request");

    let mut map = serde_json::Map::new();
    let mut fx_block = serde_json::Map::new();

    for symbol in symbols {
        match cached_series(&state, &symbol, range, interval).await {
            Ok((series, cached)) => {
                let mut payload = json!({
                    "currency": &series.currency,
                    "timestamps": &series.timestamps,
                    "prices": &series.prices,
                    "meta": &series.meta,
                    "cached": cached,
                });
                if to_usd && series.currency != "USD" {
                    match cached_fx(&state, &series.currency, "USD").await {
                        Ok((fx, _)) => {
                            let converted = currency::convert_series(&series, &fx);
                            payload["localCurrency"] = Value::from(series.currency.clone());
                            payload["localPrices"] = json!(converted.local.prices);
                            payload["currency"] = Value::from("USD");
                            payload["prices"] = json!(converted.converted.prices);
                            payload["fxRate"] = json!(converted.fx_rate);
                            payload["fxTimestamp"] = json!(converted.fx_timestamp);
                            fx_block.insert(
                                series.currency.clone(),
                                json!({ "rate": fx.rate, "asOf": fx.as_of }),
                            );
                        }
                        Err(e) => {
                            payload["fxError"] = Value::from(e.to_string());
                        }
                    }
                }
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }

    if to_usd {
        map.insert("_fx".to_string(), Value::Object(fx_block));
    }
    ok_json(Value::Object(map))
}

// ── /api/quotes ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct QuotesQuery {
    symbols: Option<String>,
    currency: Option<String>,
}

/// GET /api/quotes?symbols=&lt;csv&gt;[&currency=USD]
pub async fn get_quotes(
    Extension(state): Extension<AppState>,
    Query(params): Query<QuotesQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let to_usd = wants_usd(params.currency.as_deref());

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let key = keys::key("quotes", 1, &[&symbol]);
        let client = state.client.clone();
        let loader_symbol = symbol.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::QUOTES, move || async move {
                let quote = provider::fetch_quote(&client, &loader_symbol).await?;
                Ok(serde_json::to_value(&quote)?)
            })
            .await;

        match outcome {
            Ok((mut payload, cached)) => {
                payload["cached"] = Value::from(cached);
                let local = payload["currency"].as_str().unwrap_or("USD").to_string();
                if to_usd && local != "USD" {
                    match cached_fx(&state, &local, "USD").await {
                        Ok((fx, _)) => {
                            for field in ["price", "previousClose"] {
                                if let Some(value) = payload[field].as_f64() {
                                    payload[field] = json!(value * fx.rate);
                                }
                            }
                            payload["localCurrency"] = Value::from(local);
                            payload["currency"] = Value::from("USD");
                            payload["fxRate"] = json!(fx.rate);
                        }
                        Err(e) => {
                            payload["fxError"] = Value::from(e.to_string());
                        }
                    }
                }
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/profile ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ProfileQuery {
    symbols: Option<String>,
}

/// GET /api/profile?symbols=&lt;csv&gt;
pub async fn get_profile(
    Extension(state): Extension<AppState>,
    Query(params): Query<ProfileQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let key = keys::key("profile", 1, &[&symbol]);
        let client = state.client.clone();
        let loader_symbol = symbol.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::PROFILE, move || async move {
                let profile = provider::fetch_profile(&client, &loader_symbol).await?;
                Ok(serde_json::to_value(&profile)?)
            })
            .await;

        match outcome {
            Ok((payload, _)) => {
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/fx ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct FxQuery {
    pairs: Option<String>,
}

/// GET /api/fx?pairs=&lt;csv of 6-letter pairs&gt;
pub async fn get_fx(
    Extension(state): Extension<AppState>,
    Query(params): Query<FxQuery>,
) -> Response {
    let Some(raw) = params.pairs else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing required parameter 'pairs'",
        );
    };
    let pairs: Vec<String> = raw
        .split(',')
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    if pairs.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no pairs provided");
    }

    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (from, to) = match provider::parse_fx_pair(&pair) {
            Ok(legs) => legs,
            Err(e) => return risk_error_response(&e),
        };
        match cached_fx(&state, &from, &to).await {
            Ok((fx, _)) => {
                map.insert(
                    pair.clone(),
                    json!({
                        "pair": pair,
                        "from": fx.from,
                        "to": fx.to,
                        "rate": fx.rate,
                        "previousClose": fx.previous_close,
                    }),
                );
            }
            Err(e) if e.is_partial() => {
                map.insert(pair, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/beta ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BetaQuery {
    symbols: Option<String>,
    benchmark: Option<String>,
    range: Option<String>,
}

/// GET /api/beta?symbols=&lt;csv&gt;&benchmark=SPY&range=1y
pub async fn get_beta(
    Extension(state): Extension<AppState>,
    Query(params): Query<BetaQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let range = match parse_range(params.range.as_deref(), TimeRange::OneYear) {
        Ok(range) => range,
        Err(response) => return response,
    };
    let benchmark = params
        .benchmark
        .as_deref()
        .unwrap_or(DEFAULT_BENCHMARK)
        .trim()
        .to_uppercase();
    if benchmark.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty benchmark");
    }

    // One benchmark fetch serves every symbol in the request
    let benchmark_returns = match cached_series(&state, &benchmark, range, Interval::OneDay).await {
        Ok((series, _)) => stats::dated_daily_returns(&series),
        Err(e) => return risk_error_response(&e),
    };

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let key = keys::key("beta", 1, &[range.as_str(), &benchmark, &symbol]);
        let state_for_loader = state.clone();
        let loader_symbol = symbol.clone();
        let loader_benchmark = benchmark.clone();
        let bench = benchmark_returns.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::BETA, move || async move {
                let (series, _) = cached_series(
                    &state_for_loader,
                    &loader_symbol,
                    range,
                    Interval::OneDay,
                )
                .await?;
                let asset_returns = stats::dated_daily_returns(&series);
                let result = stats::beta_with_lag(&asset_returns, &bench)?;
                Ok(json!({
                    "symbol": loader_symbol,
                    "benchmark": loader_benchmark,
                    "beta": result.beta,
                    "correlation": result.correlation,
                    "lag": result.lag,
                    "range": range.as_str(),
                    "interval": Interval::OneDay.as_str(),
                    "pointsUsed": result.points_used,
                    "asOf": series.timestamps.last().copied(),
                }))
            })
            .await;

        match outcome {
            Ok((payload, _)) => {
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/volatility ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VolatilityQuery {
    symbols: Option<String>,
    range: Option<String>,
}

/// GET /api/volatility?symbols=&lt;csv&gt;&range=1y
pub async fn get_volatility(
    Extension(state): Extension<AppState>,
    Query(params): Query<VolatilityQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let range = match parse_range(params.range.as_deref(), TimeRange::OneYear) {
        Ok(range) => range,
        Err(response) => return response,
    };

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let key = keys::key("vol", 1, &[range.as_str(), &symbol]);
        let state_for_loader = state.clone();
        let loader_symbol = symbol.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::VOLATILITY, move || async move {
                let (series, _) =
                    cached_series(&state_for_loader, &loader_symbol, range, Interval::OneDay)
                        .await?;
                let daily = stats::daily_returns(&series);
                let vol = stats::annualized_volatility(&daily)?;
                let windows = stats::window_returns(&series, chrono::Utc::now().year());
                Ok(json!({
                    "annualizedVol": vol,
                    "ytdReturn": windows.ytd.ok(),
                    "oneYearReturn": windows.one_year.ok(),
                    "thirtyDayReturn": windows.thirty_day.ok(),
                    "pointsUsed": daily.len(),
                    "asOf": series.timestamps.last().copied(),
                }))
            })
            .await;

        match outcome {
            Ok((payload, _)) => {
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/distribution ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DistributionQuery {
    symbols: Option<String>,
    range: Option<String>,
    bootstrap: Option<usize>,
}

/// GET /api/distribution?symbols=&lt;csv&gt;&range=5y&bootstrap=1..2000
pub async fn get_distribution(
    Extension(state): Extension<AppState>,
    Query(params): Query<DistributionQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let range = match parse_range(params.range.as_deref(), TimeRange::FiveYears) {
        Ok(range) => range,
        Err(response) => return response,
    };
    let iterations = params.bootstrap.unwrap_or(stats::DEFAULT_ITERATIONS);
    if iterations == 0 || iterations > stats::MAX_ITERATIONS {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "invalid bootstrap '{}': expected 1..{}",
                iterations,
                stats::MAX_ITERATIONS
            ),
        );
    }

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let iterations_arg = iterations.to_string();
        let key = keys::key("dist", 1, &[range.as_str(), &iterations_arg, &symbol]);
        let state_for_loader = state.clone();
        let loader_symbol = symbol.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::DISTRIBUTION, move || async move {
                let (series, _) =
                    cached_series(&state_for_loader, &loader_symbol, range, Interval::OneDay)
                        .await?;
                let pool = stats::log_returns(&series);
                let seed = stable_seed(&["dist", range.as_str(), &loader_symbol]);
                let dist = stats::bootstrap_annual_distribution(&pool, iterations, seed)?;
                let mut payload = serde_json::to_value(&dist)?;
                payload["asOf"] = json!(series.timestamps.last().copied());
                Ok(payload)
            })
            .await;

        match outcome {
            Ok((payload, _)) => {
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/calendar-returns ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CalendarQuery {
    symbols: Option<String>,
    range: Option<String>,
}

/// GET /api/calendar-returns?symbols=&lt;csv&gt;&range=10y
pub async fn get_calendar_returns(
    Extension(state): Extension<AppState>,
    Query(params): Query<CalendarQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    let range = match parse_range(params.range.as_deref(), TimeRange::TenYears) {
        Ok(range) => range,
        Err(response) => return response,
    };

    let mut map = serde_json::Map::new();
    for symbol in symbols {
        let key = keys::key("calret", 1, &[range.as_str(), &symbol]);
        let state_for_loader = state.clone();
        let loader_symbol = symbol.clone();
        let outcome = state
            .cache
            .get_or_compute::<Value, _, _>(&key, ttl::CALENDAR_RETURNS, move || async move {
                let (series, _) =
                    cached_series(&state_for_loader, &loader_symbol, range, Interval::OneDay)
                        .await?;
                let years = stats::calendar_year_returns(&series);
                Ok(json!({
                    "years": years,
                    "pointsUsed": series.len(),
                    "asOf": series.timestamps.last().copied(),
                }))
            })
            .await;

        match outcome {
            Ok((payload, _)) => {
                map.insert(symbol, payload);
            }
            Err(e) if e.is_partial() => {
                map.insert(symbol, embedded_error(&e));
            }
            Err(e) => return risk_error_response(&e),
        }
    }
    ok_json(Value::Object(map))
}

// ── /api/correlation ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CorrelationQuery {
    symbols: Option<String>,
    range: Option<String>,
    interval: Option<String>,
}

/// GET /api/correlation?symbols=&lt;csv&gt;&range=5y&interval=1d
///
/// Requires at least two symbols. The response lists symbols in the sorted
/// canonical order; matrix rows follow that order.
pub async fn get_correlation(
    Extension(state): Extension<AppState>,
    Query(params): Query<CorrelationQuery>,
) -> Response {
    let symbols = match parse_symbols(params.symbols.as_deref()) {
        Ok(symbols) => symbols,
        Err(response) => return response,
    };
    if symbols.len() < 2 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "correlation requires at least 2 symbols",
        );
    }
    let range = match parse_range(params.range.as_deref(), TimeRange::FiveYears) {
        Ok(range) => range,
        Err(response) => return response,
    };
    let interval = match parse_interval(params.interval.as_deref()) {
        Ok(interval) => interval,
        Err(response) => return response,
    };

    let key = keys::key(
        "corr",
        1,
        &[range.as_str(), interval.as_str(), &keys::pipe_join(&symbols)],
    );
    let state_for_loader = state.clone();
    let loader_symbols = symbols.clone();
    let outcome = state
        .cache
        .get_or_compute::<Value, _, _>(&key, ttl::CORRELATION, move || async move {
            let mut returns = Vec::with_capacity(loader_symbols.len());
            let mut as_of: Option<i64> = None;
            for symbol in &loader_symbols {
                let (series, _) =
                    cached_series(&state_for_loader, symbol, range, interval).await?;
                as_of = as_of.max(series.timestamps.last().copied());
                returns.push(stats::daily_returns(&series));
            }

            let mut matrix = CorrelationMatrix::from_returns(
                &returns,
                range.target_overlap(),
                CorrelationMethod::Sample,
                DEFAULT_SHRINKAGE_ALPHA,
                false,
            );
            ensure_psd(&mut matrix)?;

            Ok(json!({
                "symbols": loader_symbols,
                "matrix": matrix.to_rows(),
                "range": range.as_str(),
                "interval": interval.as_str(),
                "pointsUsed": matrix.min_overlap.unwrap_or(0),
                "belowTargetOverlap": matrix.below_target_overlap,
                "asOf": as_of,
            }))
        })
        .await;

    match outcome {
        Ok((mut payload, cached)) => {
            payload["cached"] = Value::from(cached);
            payload["source"] = Value::from(if cached { "kv" } else { "computed" });
            ok_json(payload)
        }
        Err(e) => risk_error_response(&e),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
