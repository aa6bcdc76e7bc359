//! Cache and counter stores for MarketPulse
//!
//! This crate provides the two storage capabilities the fetch pipeline
//! needs: a TTL'd byte cache ([`CacheStore`]) and an atomic fixed-window
//! counter ([`CounterStore`]). Each has an in-memory and a Redis backend,
//! selected by `store.type` in the master configuration.

pub mod error;
mod memory;
mod redis;
mod traits;

use std::sync::Arc;

use tracing::info;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use self::redis::{connection_url, RedisStore};
pub use traits::*;

/// Store type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory store (fast, process-local)
    InMemory,
    /// Redis store (shared between processes)
    Redis,
}

impl StoreType {
    /// Parse store type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inmemory" | "in_memory" | "memory" => Some(StoreType::InMemory),
            "redis" => Some(StoreType::Redis),
            _ => None,
        }
    }
}

/// Both capabilities of one backing store
#[derive(Clone)]
pub struct StoreHandles {
    pub cache: Arc<dyn CacheStore>,
    pub counters: Arc<dyn CounterStore>,
}

impl StoreHandles {
    /// Handles onto a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            cache: store.clone(),
            counters: store,
        }
    }
}

/// Create a store based on configuration
pub async fn create_store(
    store_type: StoreType,
    redis_config: Option<&config::RedisConfig>,
) -> StoreResult<StoreHandles> {
    match store_type {
        StoreType::InMemory => {
            info!("Creating in-memory store");
            Ok(StoreHandles::in_memory())
        }
        StoreType::Redis => {
            let config = redis_config
                .ok_or_else(|| StoreError::Config("Redis config required for Redis store".into()))?;
            info!("Creating Redis store");
            let store = Arc::new(RedisStore::new(config).await?);
            Ok(StoreHandles {
                cache: store.clone(),
                counters: store,
            })
        }
    }
}

/// Create a store from the `store` configuration section
pub async fn create_store_from_config(config: &config::StoreConfig) -> StoreResult<StoreHandles> {
    let store_type = StoreType::parse(&config.store_type).ok_or_else(|| {
        StoreError::Config(format!("unknown store type '{}'", config.store_type))
    })?;

    create_store(store_type, config.redis.as_ref()).await
}
