use crate::RateLimitConfig;

pub fn default_enabled() -> bool {
    true
}

pub fn default_service_name() -> String {
    "marketpulse".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    3000
}

pub fn default_store_type() -> String {
    "memory".to_string()
}

pub fn default_redis_port() -> u16 {
    6379
}

pub fn default_timeout_seconds() -> u64 {
    10
}

pub fn default_series_window() -> usize {
    100
}

pub fn default_market_ttl_seconds() -> u64 {
    900
}

pub fn default_crypto_ttl_seconds() -> u64 {
    60
}

pub fn default_news_ttl_seconds() -> u64 {
    300
}

pub fn default_alpha_vantage_url() -> String {
    "https://www.alphavantage.co/query".to_string()
}

pub fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

pub fn default_news_api_url() -> String {
    "https://newsapi.org/v2".to_string()
}

pub fn default_alpha_vantage_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        max_calls: 5,
        window_seconds: 60,
    }
}

pub fn default_coingecko_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        max_calls: 50,
        window_seconds: 60,
    }
}

pub fn default_news_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        max_calls: 100,
        window_seconds: 86_400,
    }
}

pub fn default_intraday_interval() -> String {
    "1min".to_string()
}

pub fn default_vs_currency() -> String {
    "usd".to_string()
}

pub fn default_ohlc_days() -> u32 {
    7
}

pub fn default_news_query() -> String {
    r#"economy OR "federal reserve" OR geopolitical OR inflation OR earnings"#.to_string()
}

pub fn default_news_page_size() -> usize {
    20
}

pub fn default_broadcast_coin() -> String {
    "bitcoin".to_string()
}

pub fn default_broadcast_interval_seconds() -> u64 {
    60
}

pub fn default_send_timeout_seconds() -> u64 {
    5
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_key_prefix() -> String {
    "marketpulse".to_string()
}
