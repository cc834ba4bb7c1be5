use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum RiskError {
    /// A request parameter was missing or outside its enumeration
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidInput {
        /// Parameter name
        param: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The requested symbol was not found upstream
    #[error("Symbol not found: {}", symbol.as_ref().map(|s| s.as_str()).unwrap_or("unknown"))]
    SymbolNotFound {
        /// The symbol that was not found
        symbol: Option<String>,
        /// Additional context
        context: String,
    },

    /// Not enough observations to compute a statistic.
    ///
    /// Embedded per-symbol in service responses rather than failing the
    /// whole request.
    #[error("Insufficient data: {actual} observations, {required} required")]
    InsufficientData {
        /// Minimum number of observations required
        required: usize,
        /// Number of observations actually available
        actual: usize,
    },

    /// Upstream returned a server-side failure (5xx)
    #[error("Upstream unavailable ({status}): {context}")]
    UpstreamUnavailable {
        /// HTTP status code
        status: u16,
        /// Error context
        context: String,
    },

    /// Upstream did not answer within the deadline
    #[error("Upstream timeout after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Rate limit exceeded
    #[error("Rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds until retry is allowed
        retry_after: Option<u64>,
    },

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse a JSON response
    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    /// Response structure error - missing or malformed fields
    #[error("Response structure error in '{field}': {context}")]
    ResponseStructureError {
        /// Field name that caused the error
        field: String,
        /// Error context
        context: String,
    },

    /// A correlation matrix failed the positive-semidefinite check
    #[error("Matrix not positive-semidefinite (min eigenvalue {min_eigenvalue})")]
    MatrixNotPsd {
        /// Smallest eigenvalue observed
        min_eigenvalue: f64,
    },

    /// Repair could not produce a factorisable matrix
    #[error("Matrix ill-conditioned: {context}")]
    MatrixIllConditioned {
        /// Error context
        context: String,
    },

    /// Too many simulation paths produced non-finite results
    #[error("Insufficient valid paths: {valid} of {total}")]
    InsufficientValidPaths {
        /// Paths that survived the finiteness filter
        valid: usize,
        /// Paths requested
        total: usize,
    },

    /// A simulation shard exceeded its compute deadline
    #[error("Shard {shard} timed out after {timeout_ms}ms")]
    ShardTimeout {
        /// Shard index
        shard: usize,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The simulation was cancelled by the caller
    #[error("Simulation cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error category for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Input validation errors
    Validation,
    /// Not found errors
    NotFound,
    /// Insufficient observations
    Insufficient,
    /// Upstream transport/availability errors
    Upstream,
    /// Timeout errors
    Timeout,
    /// Rate limiting errors
    RateLimit,
    /// Parsing errors
    Parsing,
    /// Numerical/linear-algebra errors
    Numeric,
    /// Simulation lifecycle errors
    Simulation,
    /// Other errors
    Other,
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, RiskError>;

impl RiskError {
    /// Check if this error is retriable against the upstream
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RiskError::UpstreamTimeout { .. }
                | RiskError::RateLimited { .. }
                | RiskError::HttpError(_)
                | RiskError::UpstreamUnavailable { .. }
        )
    }

    /// Check if this error indicates a not found issue
    pub fn is_not_found(&self) -> bool {
        matches!(self, RiskError::SymbolNotFound { .. })
    }

    /// Check whether the error is a per-symbol condition that should be
    /// embedded in the response map instead of failing the request
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            RiskError::SymbolNotFound { .. }
                | RiskError::InsufficientData { .. }
                | RiskError::UpstreamUnavailable { .. }
                | RiskError::UpstreamTimeout { .. }
                | RiskError::RateLimited { .. }
                | RiskError::HttpError(_)
        )
    }

    /// Get retry delay in seconds (for exponential backoff)
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => retry_after.or(Some(5)),
            Self::UpstreamTimeout { .. } => Some(2),
            Self::UpstreamUnavailable { status, .. } if *status >= 500 => Some(5),
            _ => None,
        }
    }

    /// Categorize errors for logging/metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::SymbolNotFound { .. } => ErrorCategory::NotFound,
            Self::InsufficientData { .. } => ErrorCategory::Insufficient,
            Self::UpstreamUnavailable { .. } | Self::HttpError(_) => ErrorCategory::Upstream,
            Self::UpstreamTimeout { .. } => ErrorCategory::Timeout,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::JsonParseError(_) | Self::ResponseStructureError { .. } => ErrorCategory::Parsing,
            Self::MatrixNotPsd { .. } | Self::MatrixIllConditioned { .. } => ErrorCategory::Numeric,
            Self::InsufficientValidPaths { .. } | Self::ShardTimeout { .. } | Self::Cancelled => {
                ErrorCategory::Simulation
            }
            Self::InternalError(_) => ErrorCategory::Other,
        }
    }

    /// Add symbol context to error (fluent API)
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        if let Self::SymbolNotFound {
            symbol: ref mut s, ..
        } = self
        {
            *s = Some(symbol.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retriable() {
        assert!(RiskError::UpstreamTimeout { timeout_ms: 10_000 }.is_retriable());
        assert!(RiskError::RateLimited { retry_after: None }.is_retriable());
        assert!(
            RiskError::UpstreamUnavailable {
                status: 503,
                context: "test".to_string()
            }
            .is_retriable()
        );
        assert!(
            !RiskError::SymbolNotFound {
                symbol: Some("AAPL".to_string()),
                context: "test".to_string()
            }
            .is_retriable()
        );
        assert!(
            !RiskError::InvalidInput {
                param: "range".to_string(),
                reason: "unknown".to_string()
            }
            .is_retriable()
        );
    }

    #[test]
    fn test_partial_errors_do_not_include_simulation() {
        assert!(
            RiskError::InsufficientData {
                required: 30,
                actual: 5
            }
            .is_partial()
        );
        assert!(!RiskError::Cancelled.is_partial());
        assert!(
            !RiskError::InsufficientValidPaths {
                valid: 10,
                total: 100
            }
            .is_partial()
        );
    }

    #[test]
    fn test_retry_after_secs() {
        assert_eq!(
            RiskError::RateLimited {
                retry_after: Some(10)
            }
            .retry_after_secs(),
            Some(10)
        );
        assert_eq!(
            RiskError::UpstreamTimeout { timeout_ms: 10_000 }.retry_after_secs(),
            Some(2)
        );
        assert_eq!(
            RiskError::UpstreamUnavailable {
                status: 502,
                context: "test".to_string()
            }
            .retry_after_secs(),
            Some(5)
        );
        assert_eq!(RiskError::Cancelled.retry_after_secs(), None);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            RiskError::MatrixNotPsd {
                min_eigenvalue: -0.01
            }
            .category(),
            ErrorCategory::Numeric
        );
        assert_eq!(RiskError::Cancelled.category(), ErrorCategory::Simulation);
        assert_eq!(
            RiskError::InvalidInput {
                param: "symbols".to_string(),
                reason: "empty".to_string()
            }
            .category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_with_symbol() {
        let error = RiskError::SymbolNotFound {
            symbol: None,
            context: "test".to_string(),
        }
        .with_symbol("AAPL");

        if let RiskError::SymbolNotFound { symbol, .. } = error {
            assert_eq!(symbol, Some("AAPL".to_string()));
        } else {
            panic!("Expected SymbolNotFound");
        }
    }
}
