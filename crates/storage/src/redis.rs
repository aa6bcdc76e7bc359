//! Redis store implementation
//!
//! Cache entries use `GET` / `SET EX`. Window counters run as a Lua script so
//! the budget check, increment and expiry happen in one server-side step.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{CacheStore, CounterStore, WindowCount};
use config::RedisConfig;

/// KEYS[1] = counter key, ARGV[1] = max calls, ARGV[2] = window seconds.
/// Returns {permitted (0|1), count, ttl}.
const WINDOW_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
  local ttl = redis.call('TTL', KEYS[1])
  if ttl < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
    ttl = tonumber(ARGV[2])
  end
  return {0, current, ttl}
end
local n = redis.call('INCR', KEYS[1])
if n == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
  ttl = tonumber(ARGV[2])
end
return {1, n, ttl}
";

/// Build a `redis://` URL from configuration
pub fn connection_url(config: &RedisConfig) -> String {
    if config.password.is_empty() {
        format!("redis://{}:{}/{}", config.host, config.port, config.db_index)
    } else {
        format!(
            "redis://:{}@{}:{}/{}",
            config.password, config.host, config.port, config.db_index
        )
    }
}

/// Redis-backed cache and counter store
///
/// The connection manager multiplexes one connection and reconnects on
/// failure; each call works on a cheap clone of it.
pub struct RedisStore {
    conn: ConnectionManager,
    window_script: Script,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn new(config: &RedisConfig) -> StoreResult<Self> {
        info!(host = %config.host, port = config.port, db = config.db_index, "Connecting to Redis");

        let client = redis::Client::open(connection_url(config))
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            window_script: Script::new(WINDOW_SCRIPT),
            key_prefix: config
                .key_prefix
                .clone()
                .unwrap_or_else(config::default_key_prefix),
        })
    }

    fn full_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", prefix, key)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        // SET EX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.full_key(key), value, seconds).await?;
        debug!(key, seconds, "Cached value in Redis");
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr_within(
        &self,
        key: &str,
        max_calls: u64,
        window: Duration,
    ) -> StoreResult<WindowCount> {
        let mut conn = self.conn.clone();
        let (permitted, count, ttl): (i64, i64, i64) = self
            .window_script
            .key(self.full_key(key))
            .arg(max_calls)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowCount {
            permitted: permitted == 1,
            count: count.max(0) as u64,
            ttl_secs: ttl.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_config(password: &str) -> RedisConfig {
        RedisConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            password: password.to_string(),
            db_index: 2,
            key_prefix: None,
        }
    }

    #[test]
    fn test_connection_url_without_password() {
        assert_eq!(connection_url(&redis_config("")), "redis://cache.internal:6380/2");
    }

    #[test]
    fn test_connection_url_with_password() {
        assert_eq!(
            connection_url(&redis_config("s3cret")),
            "redis://:s3cret@cache.internal:6380/2"
        );
    }

    #[test]
    fn test_key_prefixing() {
        assert_eq!(prefixed("marketpulse", "stock:IBM"), "marketpulse:stock:IBM");
        assert_eq!(prefixed("", "stock:IBM"), "stock:IBM");
    }
}
