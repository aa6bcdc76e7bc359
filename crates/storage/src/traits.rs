//! Store traits
//!
//! Two narrow capabilities are exposed: a TTL'd byte cache and an atomic
//! fixed-window counter. Both backends implement both.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Key-value cache with per-key expiry
///
/// Entries are never deleted explicitly; they expire passively.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the bytes stored under `key`, or `None` if absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry, for `ttl`
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()>;
}

/// Outcome of a single counter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Whether this call was counted (the budget was not yet exhausted)
    pub permitted: bool,
    /// Calls counted in the current window, including this one if permitted
    pub count: u64,
    /// Seconds until the current window ends
    pub ttl_secs: u64,
}

/// Fixed-window call counter
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one call against `key` unless `max_calls` is already reached.
    ///
    /// The check, increment and (on window creation) expiry are one atomic
    /// step: two concurrent callers with `max_calls == 1` never both pass.
    async fn incr_within(&self, key: &str, max_calls: u64, window: Duration)
        -> StoreResult<WindowCount>;
}
