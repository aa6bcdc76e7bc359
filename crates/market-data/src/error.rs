//! Market data error types

use common::ProviderId;
use thiserror::Error;

/// Errors raised by a provider adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The upstream call did not finish in time
    #[error("{provider} request timed out")]
    Timeout { provider: ProviderId },

    /// Connection or transport failure
    #[error("{provider} transport error: {message}")]
    Transport { provider: ProviderId, message: String },

    /// Non-success HTTP status
    #[error("{provider} returned HTTP {status}")]
    Status { provider: ProviderId, status: u16 },

    /// Response body did not have the expected shape
    #[error("{provider} payload malformed: {message}")]
    Malformed { provider: ProviderId, message: String },

    /// The provider reported its own quota as exhausted
    #[error("{provider} quota exhausted: {message}")]
    QuotaExceeded { provider: ProviderId, message: String },

    /// The adapter could not be constructed
    #[error("{provider} client configuration error: {message}")]
    Config { provider: ProviderId, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Timeout { provider }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Malformed { provider, .. }
            | ProviderError::QuotaExceeded { provider, .. }
            | ProviderError::Config { provider, .. } => *provider,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::Transport { .. } => "transport",
            ProviderError::Status { .. } => "status",
            ProviderError::Malformed { .. } => "malformed",
            ProviderError::QuotaExceeded { .. } => "quota",
            ProviderError::Config { .. } => "config",
        }
    }

    /// Map a reqwest failure onto the adapter taxonomy
    pub(crate) fn from_reqwest(provider: ProviderId, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { provider }
        } else if err.is_decode() {
            ProviderError::Malformed {
                provider,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                provider,
                status: status.as_u16(),
            }
        } else {
            ProviderError::Transport {
                provider,
                message: err.to_string(),
            }
        }
    }
}

/// Errors surfaced by the cache-or-fetch pipeline
///
/// Cloneable so that every waiter on a coalesced fetch receives the
/// leader's outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The local per-caller budget is exhausted
    #[error("rate limit exceeded for {provider}; retry after {retry_after_secs}s")]
    RateLimited {
        provider: ProviderId,
        retry_after_secs: u64,
    },

    /// The provider itself reported its quota as exhausted
    #[error("{provider} quota exceeded upstream; retry after {retry_after_secs}s")]
    UpstreamQuotaExceeded {
        provider: ProviderId,
        retry_after_secs: u64,
    },

    /// Any other upstream failure
    #[error(transparent)]
    Upstream(ProviderError),

    /// The store failed and the failure policy is closed
    #[error("cache store unavailable: {0}")]
    CacheUnavailable(String),

    /// Payload could not be encoded for the cache
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The fetch task died before producing a result
    #[error("internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Seconds a client should wait before retrying, when known
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FetchError::RateLimited { retry_after_secs, .. }
            | FetchError::UpstreamQuotaExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::UpstreamQuotaExceeded { .. } => "upstream_quota_exceeded",
            FetchError::Upstream(_) => "upstream_error",
            FetchError::CacheUnavailable(_) => "cache_unavailable",
            FetchError::Serialization(_) | FetchError::Internal(_) => "internal_error",
        }
    }

    /// Provider the error concerns, if any
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            FetchError::RateLimited { provider, .. }
            | FetchError::UpstreamQuotaExceeded { provider, .. } => Some(*provider),
            FetchError::Upstream(e) => Some(e.provider()),
            _ => None,
        }
    }
}
