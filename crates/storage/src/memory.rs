//! In-memory store implementation
//!
//! Process-local and non-persistent. Time comes from `tokio::time`, so tests
//! running on a paused clock can step through expiry deterministically.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::{CacheStore, CounterStore, WindowCount};

/// Expired entries are swept once this many writes have happened
const SWEEP_EVERY: u64 = 1024;

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct Window {
    count: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    windows: HashMap<String, Window>,
    writes: u64,
}

impl Inner {
    fn note_write(&mut self, now: Instant) {
        self.writes += 1;
        if self.writes % SWEEP_EVERY == 0 {
            let before = self.entries.len() + self.windows.len();
            self.entries.retain(|_, e| e.expires_at > now);
            self.windows.retain(|_, w| w.expires_at > now);
            debug!(
                removed = before - (self.entries.len() + self.windows.len()),
                "Swept expired in-memory entries"
            );
        }
    }
}

/// In-memory cache and counter store
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

fn remaining_secs(expires_at: Instant, now: Instant) -> u64 {
    let left = expires_at.saturating_duration_since(now);
    // Round up so a caller told to wait `n` seconds finds the window gone
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        inner.note_write(now);
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn incr_within(
        &self,
        key: &str,
        max_calls: u64,
        window: Duration,
    ) -> StoreResult<WindowCount> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let slot = inner
            .windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.expires_at <= now {
                    w.count = 0;
                    w.expires_at = now + window;
                }
            })
            .or_insert_with(|| Window {
                count: 0,
                expires_at: now + window,
            });

        let permitted = slot.count < max_calls;
        if permitted {
            slot.count += 1;
        }
        let result = WindowCount {
            permitted,
            count: slot.count,
            ttl_secs: remaining_secs(slot.expires_at, now),
        };

        inner.note_write(now);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_then_get_is_byte_exact() {
        let store = InMemoryStore::new();
        let payload = vec![0u8, 159, 146, 150, b'{', b'}'];

        store.set("stock:IBM", &payload, Duration::from_secs(900)).await.unwrap();

        assert_eq!(store.get("stock:IBM").await.unwrap(), Some(payload));
        assert_eq!(store.get("stock:MSFT").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = InMemoryStore::new();
        store.set("crypto:bitcoin", b"[]", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("crypto:bitcoin").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("crypto:bitcoin").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_resets_ttl() {
        let store = InMemoryStore::new();
        store.set("k", b"old", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.set("k", b"new", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_rejects_after_budget_then_resets() {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(60);

        for expected in 1..=5 {
            let step = store.incr_within("rl", 5, window).await.unwrap();
            assert!(step.permitted);
            assert_eq!(step.count, expected);
        }

        tokio::time::advance(Duration::from_secs(20)).await;
        let rejected = store.incr_within("rl", 5, window).await.unwrap();
        assert!(!rejected.permitted);
        assert_eq!(rejected.count, 5);
        assert_eq!(rejected.ttl_secs, 40);

        tokio::time::advance(Duration::from_secs(40)).await;
        let fresh = store.incr_within("rl", 5, window).await.unwrap();
        assert!(fresh.permitted);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.ttl_secs, 60);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counter_single_slot_admits_exactly_one() {
        let store = Arc::new(InMemoryStore::new());

        let tasks = (0..32).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .incr_within("rl:once", 1, Duration::from_secs(60))
                    .await
                    .unwrap()
                    .permitted
            })
        });

        let permitted = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        assert_eq!(permitted, 1);
    }

    #[tokio::test]
    async fn test_counters_are_scoped_by_key() {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(60);

        assert!(store.incr_within("a", 1, window).await.unwrap().permitted);
        assert!(!store.incr_within("a", 1, window).await.unwrap().permitted);
        assert!(store.incr_within("b", 1, window).await.unwrap().permitted);
    }
}
