//! Cache-or-fetch orchestration
//!
//! Every data request goes through [`FetchOrchestrator::resolve`]:
//!
//! 1. Cache lookup. A hit returns immediately and never touches the
//!    limiter or the provider.
//! 2. Rate limit check for the caller's (provider, caller) budget.
//! 3. Upstream fetch under the provider's timeout.
//! 4. Normalization (sort, cap to the series window).
//! 5. Best-effort cache write with the endpoint's TTL.
//!
//! Concurrent misses for one key are coalesced: the first caller becomes the
//! leader and runs steps 2-5 in a spawned task, later callers await the same
//! shared result (including its error). The leader's caller identity is the
//! one charged.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::{normalize_series, NewsItem, SeriesPoint};
use config::FailurePolicy;
use futures::future::{BoxFuture, FutureExt, Shared};
use observability::{CacheOutcome, FetchMetrics};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use storage::CacheStore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{FetchError, ProviderError};
use crate::rate_limiter::{RateBudget, RateLimiter, RateScope};

/// Data that can flow through the cache
pub trait CachePayload: Serialize + DeserializeOwned + Send + 'static {
    /// Canonicalize freshly fetched data before it is cached
    fn normalize(self, window: usize) -> Self;
}

impl CachePayload for Vec<SeriesPoint> {
    fn normalize(self, window: usize) -> Self {
        normalize_series(self, window)
    }
}

impl CachePayload for Vec<NewsItem> {
    fn normalize(mut self, window: usize) -> Self {
        self.truncate(window);
        self
    }
}

/// Everything the orchestrator needs to serve one key
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Cache key, e.g. `stock:IBM`
    pub key: String,
    pub scope: RateScope,
    pub budget: RateBudget,
    pub ttl: Duration,
    /// Maximum number of items kept after normalization
    pub window: usize,
    /// Upper bound on the upstream call
    pub timeout: Duration,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<[u8]>, FetchError>>>;
type InflightMap = Arc<Mutex<HashMap<String, SharedFetch>>>;

/// Removes a key from the in-flight map when the leader task ends, even by panic
struct InflightGuard {
    inflight: InflightMap,
    key: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.key);
    }
}

/// Cache-or-fetch pipeline with per-key single-flight
#[derive(Clone)]
pub struct FetchOrchestrator {
    cache: Arc<dyn CacheStore>,
    limiter: Arc<dyn RateLimiter>,
    policy: FailurePolicy,
    inflight: InflightMap,
}

impl FetchOrchestrator {
    pub fn new(cache: Arc<dyn CacheStore>, limiter: Arc<dyn RateLimiter>, policy: FailurePolicy) -> Self {
        Self {
            cache,
            limiter,
            policy,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys currently being fetched
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Serve `request` from cache, or fetch it with `fetch` and cache the result
    pub async fn resolve<T, F, Fut>(&self, request: FetchRequest, fetch: F) -> Result<T, FetchError>
    where
        T: CachePayload,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        if let Some(hit) = self.lookup::<T>(&request.key).await? {
            return Ok(hit);
        }

        let bytes = self.join_or_lead(request, fetch).await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Serialization(e.to_string()))
    }

    async fn lookup<T: CachePayload>(&self, key: &str) -> Result<Option<T>, FetchError> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    FetchMetrics::cache_lookup(CacheOutcome::Hit);
                    debug!(%key, "Cache hit");
                    Ok(Some(value))
                }
                Err(e) => {
                    FetchMetrics::cache_lookup(CacheOutcome::Miss);
                    warn!(%key, error = %e, "Discarding undecodable cache entry");
                    Ok(None)
                }
            },
            Ok(None) => {
                FetchMetrics::cache_lookup(CacheOutcome::Miss);
                debug!(%key, "Cache miss");
                Ok(None)
            }
            Err(e) => match self.policy {
                FailurePolicy::Open => {
                    FetchMetrics::cache_lookup(CacheOutcome::Error);
                    warn!(%key, error = %e, "Cache read failed; treating as miss");
                    Ok(None)
                }
                FailurePolicy::Closed => Err(FetchError::CacheUnavailable(e.to_string())),
            },
        }
    }

    fn join_or_lead<T, F, Fut>(&self, request: FetchRequest, fetch: F) -> SharedFetch
    where
        T: CachePayload,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let mut inflight = self.inflight.lock();
        if let Some(pending) = inflight.get(&request.key) {
            debug!(key = %request.key, "Joining in-flight fetch");
            return pending.clone();
        }

        let key = request.key.clone();
        let guard = InflightGuard {
            inflight: self.inflight.clone(),
            key: key.clone(),
        };
        let this = self.clone();
        // The map lock is held until the entry is inserted, so the guard
        // cannot remove the key before it exists.
        let task = tokio::spawn(async move {
            let _guard = guard;
            this.fetch_and_store(request, fetch).await
        });

        let shared = async move {
            task.await
                .unwrap_or_else(|e| Err(FetchError::Internal(e.to_string())))
        }
        .boxed()
        .shared();

        inflight.insert(key, shared.clone());
        shared
    }

    async fn fetch_and_store<T, F, Fut>(&self, request: FetchRequest, fetch: F) -> Result<Arc<[u8]>, FetchError>
    where
        T: CachePayload,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let provider = request.scope.provider;

        let decision = self.limiter.check(&request.scope, request.budget).await?;
        if !decision.permitted {
            return Err(FetchError::RateLimited {
                provider,
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let started = Instant::now();
        let fetched = match tokio::time::timeout(request.timeout, fetch()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout { provider }),
        };
        let elapsed = started.elapsed();

        let data = match fetched {
            Ok(data) => {
                FetchMetrics::upstream_request(provider.as_str(), "ok", elapsed);
                data
            }
            Err(e) => {
                FetchMetrics::upstream_request(provider.as_str(), e.kind(), elapsed);
                warn!(key = %request.key, error = %e, "Upstream fetch failed");
                return Err(match e {
                    ProviderError::QuotaExceeded { .. } => FetchError::UpstreamQuotaExceeded {
                        provider,
                        retry_after_secs: request.budget.window_secs(),
                    },
                    other => FetchError::Upstream(other),
                });
            }
        };

        let bytes = serde_json::to_vec(&data.normalize(request.window))
            .map_err(|e| FetchError::Serialization(e.to_string()))?;

        if let Err(e) = self.cache.set(&request.key, &bytes, request.ttl).await {
            warn!(key = %request.key, error = %e, "Cache write failed; serving uncached result");
        } else {
            debug!(key = %request.key, ttl_secs = request.ttl.as_secs(), "Cached fresh result");
        }

        Ok(Arc::from(bytes))
    }
}
