//! Configuration model for MarketPulse
//!
//! The master configuration is a single YAML document. Every section has
//! serde defaults, so an empty file (or one with only `service.name`)
//! yields a runnable in-memory setup with the stock provider budgets.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MasterConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

// ---- Service ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Directory served as the router fallback (e.g. the dashboard bundle)
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: default_http_port(),
            static_dir: None,
        }
    }
}

// ---- Store ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// `memory` or `redis`
    #[serde(rename = "type")]
    #[serde(default = "default_store_type")]
    pub store_type: String,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// What to do when the cache or counter backend errors
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            redis: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat backend failures as a cache miss / permitted call
    #[default]
    Open,
    /// Surface backend failures to the caller
    Closed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db_index: u8,
    /// Prepended to every cache and counter key
    #[serde(default)]
    pub key_prefix: Option<String>,
}

// ---- Providers ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub max_calls: u64,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub alpha_vantage: AlphaVantageConfig,
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
    #[serde(default)]
    pub news_api: NewsApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlphaVantageConfig {
    #[serde(default = "default_alpha_vantage_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_alpha_vantage_rate_limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_market_ttl_seconds")]
    pub indices_ttl_seconds: u64,
    #[serde(default = "default_market_ttl_seconds")]
    pub stock_ttl_seconds: u64,
    #[serde(default = "default_series_window")]
    pub series_window: usize,
    /// Interval used for intraday index series
    #[serde(default = "default_intraday_interval")]
    pub intraday_interval: String,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            base_url: default_alpha_vantage_url(),
            api_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
            rate_limit: default_alpha_vantage_rate_limit(),
            indices_ttl_seconds: default_market_ttl_seconds(),
            stock_ttl_seconds: default_market_ttl_seconds(),
            series_window: default_series_window(),
            intraday_interval: default_intraday_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_coingecko_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_coingecko_rate_limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_crypto_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_series_window")]
    pub series_window: usize,
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    #[serde(default = "default_ohlc_days")]
    pub days: u32,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: default_coingecko_url(),
            api_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
            rate_limit: default_coingecko_rate_limit(),
            ttl_seconds: default_crypto_ttl_seconds(),
            series_window: default_series_window(),
            vs_currency: default_vs_currency(),
            days: default_ohlc_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewsApiConfig {
    #[serde(default = "default_news_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_news_rate_limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_news_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_news_query")]
    pub query: String,
    #[serde(default = "default_news_page_size")]
    pub page_size: usize,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_api_url(),
            api_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
            rate_limit: default_news_rate_limit(),
            ttl_seconds: default_news_ttl_seconds(),
            query: default_news_query(),
            page_size: default_news_page_size(),
        }
    }
}

// ---- Broadcast ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_broadcast_coin")]
    pub coin_id: String,
    #[serde(default = "default_broadcast_interval_seconds")]
    pub interval_seconds: u64,
    /// Per-subscriber send timeout
    #[serde(default = "default_send_timeout_seconds")]
    pub send_timeout_seconds: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            coin_id: default_broadcast_coin(),
            interval_seconds: default_broadcast_interval_seconds(),
            send_timeout_seconds: default_send_timeout_seconds(),
        }
    }
}

// ---- Monitoring ----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// `pretty`, `json` or `compact`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Prometheus exporter port; the exporter is off when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg: MasterConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(cfg.service.port, 3000);
        assert_eq!(cfg.store.store_type, "memory");
        assert_eq!(cfg.store.failure_policy, FailurePolicy::Open);
        assert_eq!(cfg.providers.alpha_vantage.rate_limit.max_calls, 5);
        assert_eq!(cfg.providers.alpha_vantage.rate_limit.window_seconds, 60);
        assert_eq!(cfg.providers.coingecko.rate_limit.max_calls, 50);
        assert_eq!(cfg.providers.news_api.rate_limit.window_seconds, 86_400);
        assert_eq!(cfg.providers.alpha_vantage.indices_ttl_seconds, 900);
        assert_eq!(cfg.providers.coingecko.ttl_seconds, 60);
        assert_eq!(cfg.providers.news_api.ttl_seconds, 300);
        assert_eq!(cfg.broadcast.interval_seconds, 60);
        assert_eq!(cfg.broadcast.coin_id, "bitcoin");
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
service:
  name: pulse-test
  port: 8080
  static_dir: public
store:
  type: redis
  failure_policy: closed
  redis:
    host: localhost
    key_prefix: pulse
providers:
  alpha_vantage:
    base_url: https://www.alphavantage.co/query
    api_key: demo
    rate_limit:
      max_calls: 25
      window_seconds: 86400
  coingecko:
    base_url: https://api.coingecko.com/api/v3
    ttl_seconds: 30
broadcast:
  enabled: false
monitoring:
  log_format: json
  metrics_port: 9100
"#;
        let cfg: MasterConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(cfg.service.name, "pulse-test");
        assert_eq!(cfg.service.static_dir.as_deref(), Some("public"));
        assert_eq!(cfg.store.failure_policy, FailurePolicy::Closed);
        let redis = cfg.store.redis.unwrap();
        assert_eq!(redis.port, 6379);
        assert_eq!(redis.key_prefix.as_deref(), Some("pulse"));
        assert_eq!(cfg.providers.alpha_vantage.api_key, "demo");
        assert_eq!(cfg.providers.alpha_vantage.timeout_seconds, 10);
        assert_eq!(cfg.providers.alpha_vantage.rate_limit.max_calls, 25);
        assert_eq!(cfg.providers.coingecko.ttl_seconds, 30);
        assert_eq!(cfg.providers.coingecko.rate_limit.max_calls, 50);
        assert!(!cfg.broadcast.enabled);
        assert_eq!(cfg.monitoring.metrics_port, Some(9100));
    }
}
