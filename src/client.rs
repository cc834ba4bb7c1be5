use crate::error::{Result, RiskError};
use std::time::Duration;
use tracing::{debug, warn};

/// Default HTTP request timeout for upstream fetches
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retry attempts for retriable upstream errors
const MAX_RETRIES: u32 = 2;

/// Configuration for the upstream provider client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP request timeout
    pub timeout: Duration,
    /// Override for the upstream base URL (testing, proxying)
    pub base_url: Option<String>,
    /// Bearer token for authenticated upstream endpoints
    pub api_key: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
            api_key: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for ClientConfig
    ///
    /// # Example
    ///
    /// ```
    /// use portfolio_risk::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build();
    /// ```
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for ClientConfig
#[derive(Debug)]
pub struct ClientConfigBuilder {
    timeout: Duration,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        let default = ClientConfig::default();
        Self {
            timeout: default.timeout,
            base_url: default.base_url,
            api_key: default.api_key,
        }
    }

    /// Set the HTTP request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the client at a different upstream base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the bearer token for authenticated upstream endpoints
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build the ClientConfig
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            timeout: self.timeout,
            base_url: self.base_url,
            api_key: self.api_key,
        }
    }
}

/// HTTP client for the upstream price provider.
///
/// Wraps `reqwest` with the timeout, status mapping and bounded retry policy
/// every provider fetch shares.
pub struct ProviderClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ProviderClient {
    /// Map a non-success HTTP status to the library error taxonomy
    fn map_http_status(status: u16) -> RiskError {
        match status {
            404 => RiskError::SymbolNotFound {
                symbol: None,
                context: "HTTP 404 Not Found".to_string(),
            },
            429 => RiskError::RateLimited { retry_after: None },
            status if status >= 500 => RiskError::UpstreamUnavailable {
                status,
                context: format!("HTTP {}", status),
            },
            status => RiskError::UpstreamUnavailable {
                status,
                context: format!("unexpected HTTP {}", status),
            },
        }
    }

    /// Create a new provider client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(concat!("portfolio-risk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Resolve a library-relative URL against the configured base, if any
    pub(crate) fn resolve_url(&self, url: &str) -> String {
        match &self.config.base_url {
            Some(base) => {
                // Swap the well-known upstream host for the configured one
                match url::Url::parse(url) {
                    Ok(parsed) => format!(
                        "{}{}",
                        base.trim_end_matches('/'),
                        parsed.path()
                    ),
                    Err(_) => url.to_string(),
                }
            }
            None => url.to_string(),
        }
    }

    /// Make a GET request and decode the JSON body.
    ///
    /// Retriable failures (timeout, 429, 5xx, transport) are retried up to
    /// twice with the error's suggested delay. Non-retriable errors and
    /// decode failures propagate immediately.
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = self.resolve_url(url);
        let mut attempt = 0;
        loop {
            match self.get_json_once(&url, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() && attempt < MAX_RETRIES => {
                    let delay = e.retry_after_secs().unwrap_or(1);
                    warn!(
                        url = %url,
                        attempt,
                        delay_secs = delay,
                        error = %e,
                        "Retrying upstream fetch"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json_once(&self, url: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        debug!(url = %url, "Upstream GET");

        let mut request = self.http.get(url).query(params);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RiskError::UpstreamTimeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                RiskError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_http_status(status.as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
