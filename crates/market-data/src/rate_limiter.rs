//! Per-provider, per-caller fixed-window rate limiting
//!
//! Each (provider, caller) pair gets an independent budget of `max_calls`
//! per window. The window opens on the first call and is not extended by
//! later calls; the counter itself lives in a [`CounterStore`] so that
//! several processes sharing a Redis store share one budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ProviderId;
use config::{FailurePolicy, RateLimitConfig};
use observability::FetchMetrics;
use storage::CounterStore;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Caller identity used for the broadcast loop's own fetches
pub const INTERNAL_BROADCAST_CALLER: &str = "internal:broadcast";

/// Who is spending which provider's budget
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateScope {
    pub provider: ProviderId,
    pub caller: String,
}

impl RateScope {
    pub fn new(provider: ProviderId, caller: impl Into<String>) -> Self {
        Self {
            provider,
            caller: caller.into(),
        }
    }

    /// Counter key for this scope
    pub fn key(&self) -> String {
        format!("rate_limit:{}:{}", self.provider, self.caller)
    }
}

/// Calls allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub max_calls: u64,
    pub window: Duration,
}

impl RateBudget {
    pub fn new(max_calls: u64, window: Duration) -> Self {
        Self { max_calls, window }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

impl From<&RateLimitConfig> for RateBudget {
    fn from(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, Duration::from_secs(config.window_seconds))
    }
}

/// Result of a limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub permitted: bool,
    /// Seconds until the window resets; zero when permitted
    pub retry_after_secs: u64,
}

impl RateDecision {
    pub fn permit() -> Self {
        Self {
            permitted: true,
            retry_after_secs: 0,
        }
    }

    pub fn reject(retry_after_secs: u64) -> Self {
        Self {
            permitted: false,
            retry_after_secs: retry_after_secs.max(1),
        }
    }
}

/// Admission check performed before every upstream call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one call against `scope` and report whether it may proceed
    async fn check(&self, scope: &RateScope, budget: RateBudget) -> Result<RateDecision, FetchError>;
}

/// [`RateLimiter`] backed by an atomic store counter
pub struct FixedWindowLimiter {
    counters: Arc<dyn CounterStore>,
    policy: FailurePolicy,
}

impl FixedWindowLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, policy: FailurePolicy) -> Self {
        Self { counters, policy }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, scope: &RateScope, budget: RateBudget) -> Result<RateDecision, FetchError> {
        let key = scope.key();
        match self
            .counters
            .incr_within(&key, budget.max_calls, budget.window)
            .await
        {
            Ok(step) if step.permitted => {
                debug!(%key, count = step.count, max = budget.max_calls, "Call admitted");
                Ok(RateDecision::permit())
            }
            Ok(step) => {
                FetchMetrics::rate_limited(scope.provider.as_str());
                debug!(%key, retry_after = step.ttl_secs, "Call rejected by rate limiter");
                Ok(RateDecision::reject(step.ttl_secs))
            }
            Err(e) => match self.policy {
                FailurePolicy::Open => {
                    warn!(%key, error = %e, "Rate limit store failed; admitting call");
                    Ok(RateDecision::permit())
                }
                FailurePolicy::Closed => Err(FetchError::CacheUnavailable(e.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{InMemoryStore, StoreError, StoreResult, WindowCount};

    struct BrokenCounter;

    #[async_trait]
    impl CounterStore for BrokenCounter {
        async fn incr_within(&self, _: &str, _: u64, _: Duration) -> StoreResult<WindowCount> {
            Err(StoreError::Connection("refused".into()))
        }
    }

    fn coingecko(caller: &str) -> RateScope {
        RateScope::new(ProviderId::CoinGecko, caller)
    }

    #[test]
    fn test_scope_key() {
        assert_eq!(coingecko("1.2.3.4").key(), "rate_limit:coingecko:1.2.3.4");
        assert_eq!(
            RateScope::new(ProviderId::AlphaVantage, INTERNAL_BROADCAST_CALLER).key(),
            "rate_limit:alpha_vantage:internal:broadcast"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_window_exhaustion_and_reset() {
        let limiter = FixedWindowLimiter::new(Arc::new(InMemoryStore::new()), FailurePolicy::Open);
        let budget = RateBudget::new(3, Duration::from_secs(60));
        let scope = coingecko("a");

        for _ in 0..3 {
            assert!(limiter.check(&scope, budget).await.unwrap().permitted);
        }

        tokio::time::advance(Duration::from_secs(20)).await;
        let rejected = limiter.check(&scope, budget).await.unwrap();
        assert!(!rejected.permitted);
        assert_eq!(rejected.retry_after_secs, 40);

        tokio::time::advance(Duration::from_secs(41)).await;
        assert!(limiter.check(&scope, budget).await.unwrap().permitted);
    }

    #[tokio::test]
    async fn test_callers_and_providers_are_independent() {
        let limiter = FixedWindowLimiter::new(Arc::new(InMemoryStore::new()), FailurePolicy::Open);
        let budget = RateBudget::new(1, Duration::from_secs(60));

        assert!(limiter.check(&coingecko("a"), budget).await.unwrap().permitted);
        assert!(!limiter.check(&coingecko("a"), budget).await.unwrap().permitted);
        assert!(limiter.check(&coingecko("b"), budget).await.unwrap().permitted);
        assert!(limiter
            .check(&RateScope::new(ProviderId::NewsApi, "a"), budget)
            .await
            .unwrap()
            .permitted);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_slot() {
        let limiter = Arc::new(FixedWindowLimiter::new(
            Arc::new(InMemoryStore::new()),
            FailurePolicy::Open,
        ));
        let budget = RateBudget::new(1, Duration::from_secs(60));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check(&coingecko("same"), budget).await })
            })
            .collect();

        let mut permitted = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().permitted {
                permitted += 1;
            }
        }
        assert_eq!(permitted, 1);
    }

    #[tokio::test]
    async fn test_store_failure_follows_policy() {
        let budget = RateBudget::new(1, Duration::from_secs(60));

        let open = FixedWindowLimiter::new(Arc::new(BrokenCounter), FailurePolicy::Open);
        assert!(open.check(&coingecko("a"), budget).await.unwrap().permitted);

        let closed = FixedWindowLimiter::new(Arc::new(BrokenCounter), FailurePolicy::Closed);
        assert!(matches!(
            closed.check(&coingecko("a"), budget).await,
            Err(FetchError::CacheUnavailable(_))
        ));
    }

    #[test]
    fn test_budget_from_config() {
        let budget = RateBudget::from(&RateLimitConfig {
            max_calls: 5,
            window_seconds: 60,
        });
        assert_eq!(budget, RateBudget::new(5, Duration::from_secs(60)));
    }
}
