//! Typed key-value cache with per-key TTLs and single-flight coalescing.
//!
//! Sits inline on every provider read and every compute endpoint. A cache
//! miss never fails the operation, a put failure is logged and ignored, and
//! an unparseable entry is treated as missing and deleted.

mod single_flight;
mod store;

pub use store::{KvStore, MemoryStore};

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use single_flight::SingleFlight;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, RiskError};

/// Per-domain TTLs in seconds
pub mod ttl {
    /// Historical price series
    pub const PRICES: u64 = 14_400;
    /// Spot quotes
    pub const QUOTES: u64 = 900;
    /// Company profiles
    pub const PROFILE: u64 = 604_800;
    /// FX spot rates
    pub const FX: u64 = 86_400;
    /// Beta vs benchmark
    pub const BETA: u64 = 21_600;
    /// Annualised volatility and return windows
    pub const VOLATILITY: u64 = 21_600;
    /// Bootstrap distributions
    pub const DISTRIBUTION: u64 = 43_200;
    /// Calendar-year returns
    pub const CALENDAR_RETURNS: u64 = 86_400;
    /// Pairwise correlation matrices
    pub const CORRELATION: u64 = 21_600;
}

/// Cache key helpers.
///
/// Keys follow `domain:v<version>:<arg1>[:<arg2>...]`; list-of-symbol
/// arguments are canonicalised (uppercased, deduplicated, sorted) and
/// pipe-joined so logically identical requests hit the same key.
pub mod keys {
    /// Build a namespaced cache key
    pub fn key(domain: &str, version: u32, args: &[&str]) -> String {
        if args.is_empty() {
            format!("{}:v{}", domain, version)
        } else {
            format!("{}:v{}:{}", domain, version, args.join(":"))
        }
    }

    /// Canonicalise a symbol list: uppercase, trim, deduplicate, sort
    pub fn canonical_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
        let mut out: Vec<String> = symbols
            .iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Pipe-join a canonical symbol list for use as one key argument
    pub fn pipe_join(symbols: &[String]) -> String {
        symbols.join("|")
    }
}

/// Typed cache over a [`KvStore`] with single-flight load coalescing.
#[derive(Clone)]
pub struct KvCache {
    store: Arc<dyn KvStore>,
    flight: Arc<SingleFlight>,
}

impl KvCache {
    /// Create a cache over the given store
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Create a cache over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read and deserialise a live entry.
    ///
    /// A deserialisation failure treats the entry as missing and deletes it.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache HIT");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache entry unparseable, deleting");
                self.store.delete(key).await;
                None
            }
        }
    }

    /// Serialise and store a value. Failures are logged and ignored.
    pub async fn put_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache serialise error");
                return;
            }
        };
        match self.store.put(key, raw, ttl_secs).await {
            Ok(()) => debug!(key = %key, ttl = ttl_secs, "Cache PUT"),
            Err(e) => warn!(key = %key, error = %e, "Cache PUT failed, ignoring"),
        }
    }

    /// Remove a key
    pub async fn delete(&self, key: &str) {
        self.store.delete(key).await;
    }

    /// Return the cached value for `key`, or run `loader` to compute, cache
    /// and return it. The boolean is `true` on a cache hit.
    ///
    /// Concurrent callers for the same key share one loader run: the first
    /// installs it, the rest await the same outcome. Each caller receives
    /// its own deserialised copy of the value.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        loader: F,
    ) -> Result<(T, bool)>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok((hit, true));
        }
        debug!(key = %key, "Cache MISS");

        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let make = move || {
            let fut = loader();
            async move {
                let value = fut.await.map_err(Arc::new)?;
                let json = serde_json::to_value(&value).map_err(|e| Arc::new(e.into()))?;
                match serde_json::to_string(&json) {
                    Ok(raw) => {
                        if let Err(e) = store.put(&owned_key, raw, ttl_secs).await {
                            warn!(key = %owned_key, error = %e, "Cache PUT failed, ignoring");
                        }
                    }
                    Err(e) => warn!(key = %owned_key, error = %e, "Cache serialise error"),
                }
                Ok(json)
            }
            .boxed()
        };

        let (outcome, _joined) = self.flight.run(key, make).await;
        match outcome {
            Ok(json) => Ok((serde_json::from_value(json)?, false)),
            Err(shared) => Err(unshare_error(&shared)),
        }
    }
}

/// Rebuild an owned error from one shared between coalesced callers.
///
/// Non-cloneable source variants (transport, JSON) keep their message under
/// the nearest structured variant.
fn unshare_error(e: &Arc<RiskError>) -> RiskError {
    match e.as_ref() {
        RiskError::InvalidInput { param, reason } => RiskError::InvalidInput {
            param: param.clone(),
            reason: reason.clone(),
        },
        RiskError::SymbolNotFound { symbol, context } => RiskError::SymbolNotFound {
            symbol: symbol.clone(),
            context: context.clone(),
        },
        RiskError::InsufficientData { required, actual } => RiskError::InsufficientData {
            required: *required,
            actual: *actual,
        },
        RiskError::UpstreamUnavailable { status, context } => RiskError::UpstreamUnavailable {
            status: *status,
            context: context.clone(),
        },
        RiskError::UpstreamTimeout { timeout_ms } => RiskError::UpstreamTimeout {
            timeout_ms: *timeout_ms,
        },
        RiskError::RateLimited { retry_after } => RiskError::RateLimited {
            retry_after: *retry_after,
        },
        RiskError::HttpError(inner) => RiskError::UpstreamUnavailable {
            status: inner.status().map(|s| s.as_u16()).unwrap_or(502),
            context: inner.to_string(),
        },
        RiskError::JsonParseError(inner) => RiskError::ResponseStructureError {
            field: "json".to_string(),
            context: inner.to_string(),
        },
        RiskError::ResponseStructureError { field, context } => RiskError::ResponseStructureError {
            field: field.clone(),
            context: context.clone(),
        },
        RiskError::MatrixNotPsd { min_eigenvalue } => RiskError::MatrixNotPsd {
            min_eigenvalue: *min_eigenvalue,
        },
        RiskError::MatrixIllConditioned { context } => RiskError::MatrixIllConditioned {
            context: context.clone(),
        },
        RiskError::InsufficientValidPaths { valid, total } => RiskError::InsufficientValidPaths {
            valid: *valid,
            total: *total,
        },
        RiskError::ShardTimeout { shard, timeout_ms } => RiskError::ShardTimeout {
            shard: *shard,
            timeout_ms: *timeout_ms,
        },
        RiskError::Cancelled => RiskError::Cancelled,
        RiskError::InternalError(msg) => RiskError::InternalError(msg.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_grammar() {
        assert_eq!(keys::key("prices", 1, &["AAPL", "1y", "1d"]), "prices:v1:AAPL:1y:1d");
        assert_eq!(keys::key("health", 1, &[]), "health:v1");
    }

    #[test]
    fn test_canonical_symbols() {
        let canonical = keys::canonical_symbols(&["msft", " aapl ", "AAPL", "goog"]);
        assert_eq!(canonical, vec!["AAPL", "GOOG", "MSFT"]);
        assert_eq!(keys::pipe_join(&canonical), "AAPL|GOOG|MSFT");
    }

    #[test]
    fn test_canonical_symbols_order_independent() {
        let a = keys::canonical_symbols(&["AAPL", "MSFT"]);
        let b = keys::canonical_symbols(&["msft", "aapl"]);
        assert_eq!(a, b);
        assert_eq!(
            keys::key("corr", 1, &["1y", "1d", &keys::pipe_join(&a)]),
            keys::key("corr", 1, &["1y", "1d", &keys::pipe_join(&b)]),
        );
    }

    #[tokio::test]
    async fn test_get_or_compute_hit_flag() {
        let cache = KvCache::in_memory();
        let (value, cached) = cache
            .get_or_compute("k", 60, || async { Ok(7_u32) })
            .await
            .unwrap();
        assert_eq!((value, cached), (7, false));

        let (value, cached) = cache
            .get_or_compute::<u32, _, _>("k", 60, || async {
                panic!("loader must not run on a hit")
            })
            .await
            .unwrap();
        assert_eq!((value, cached), (7, true));
    }

    #[tokio::test]
    async fn test_get_or_compute_coalesces() {
        let cache = KvCache::in_memory();
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let cache = cache.clone();
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", 60, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok("value".to_string())
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "value");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_miss_and_deleted() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("k", "{not json".to_string(), 60)
            .await
            .unwrap();
        let cache = KvCache::new(store.clone());
        assert!(cache.get::<u32>("k").await.is_none());
        assert!(store.get("k").await.is_none(), "corrupt entry not deleted");
    }

    #[tokio::test]
    async fn test_loader_error_propagates_with_taxonomy() {
        let cache = KvCache::in_memory();
        let err = cache
            .get_or_compute::<u32, _, _>("k", 60, || async {
                Err(RiskError::InsufficientData {
                    required: 30,
                    actual: 3,
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RiskError::InsufficientData {
                required: 30,
                actual: 3
            }
        ));
        // Errors are never cached
        assert!(cache.get::<u32>("k").await.is_none());
    }
}
