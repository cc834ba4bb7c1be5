mod handlers;

use axum::{Extension, Router, http::HeaderValue, routing::get};
use portfolio_risk::cache::KvCache;
use portfolio_risk::{ClientConfig, ProviderClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Server-specific default values
mod defaults {
    /// Default server port
    pub const SERVER_PORT: u16 = 8000;
    /// Whole-request deadline in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Shared application state: the KV cache and the upstream provider client.
#[derive(Clone)]
pub struct AppState {
    pub cache: KvCache,
    pub client: Arc<ProviderClient>,
}

impl AppState {
    /// Build state from environment configuration.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = ClientConfig::builder();
        if let Ok(base_url) = std::env::var("UPSTREAM_BASE_URL") {
            config = config.base_url(base_url);
        }
        if let Ok(api_key) = std::env::var("UPSTREAM_API_KEY") {
            config = config.api_key(api_key);
        }
        Ok(Self {
            cache: KvCache::in_memory(),
            client: Arc::new(ProviderClient::new(config.build())?),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Portfolio risk server initializing...");

    let state = AppState::from_env()?;
    let app = create_app(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting portfolio-risk server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Build the router with CORS, tracing and the whole-request timeout.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().expect("static origin"))
        .allow_methods([axum::http::Method::GET])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/prices", get(handlers::get_prices))
        .route("/api/quotes", get(handlers::get_quotes))
        .route("/api/profile", get(handlers::get_profile))
        .route("/api/fx", get(handlers::get_fx))
        .route("/api/beta", get(handlers::get_beta))
        .route("/api/volatility", get(handlers::get_volatility))
        .route("/api/distribution", get(handlers::get_distribution))
        .route("/api/calendar-returns", get(handlers::get_calendar_returns))
        .route("/api/correlation", get(handlers::get_correlation))
        .fallback(handlers::not_found)
        .layer(Extension(state))
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(
            defaults::REQUEST_TIMEOUT_SECS,
        )))
        .layer(TraceLayer::new_for_http())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("Shutdown signal received");
}
