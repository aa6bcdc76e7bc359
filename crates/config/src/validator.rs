use crate::*;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Service port must be non-zero")]
    InvalidServicePort,

    #[error("Store: {message}")]
    InvalidStore { message: String },

    #[error("Provider '{provider}': {message}")]
    InvalidProvider { provider: String, message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Broadcast: {message}")]
    InvalidBroadcast { message: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Metrics port {0} collides with the HTTP port")]
    MetricsPortCollision(u16),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(&config.service, &mut report);
    validate_store(&config.store, &mut report);

    let av = &config.providers.alpha_vantage;
    validate_endpoint("alpha_vantage", &av.base_url, &av.api_key, av.timeout_seconds, &mut report);
    validate_rate_limit("alpha_vantage", &av.rate_limit, &mut report);
    positive("providers.alpha_vantage.indices_ttl_seconds", av.indices_ttl_seconds, &mut report);
    positive("providers.alpha_vantage.stock_ttl_seconds", av.stock_ttl_seconds, &mut report);
    positive("providers.alpha_vantage.series_window", av.series_window as u64, &mut report);

    let cg = &config.providers.coingecko;
    validate_endpoint("coingecko", &cg.base_url, &cg.api_key, cg.timeout_seconds, &mut report);
    validate_rate_limit("coingecko", &cg.rate_limit, &mut report);
    positive("providers.coingecko.ttl_seconds", cg.ttl_seconds, &mut report);
    positive("providers.coingecko.series_window", cg.series_window as u64, &mut report);
    positive("providers.coingecko.days", u64::from(cg.days), &mut report);

    let news = &config.providers.news_api;
    validate_endpoint("news_api", &news.base_url, &news.api_key, news.timeout_seconds, &mut report);
    validate_rate_limit("news_api", &news.rate_limit, &mut report);
    positive("providers.news_api.ttl_seconds", news.ttl_seconds, &mut report);
    if news.page_size == 0 || news.page_size > 100 {
        report.add_error(ValidationError::InvalidProvider {
            provider: "news_api".to_string(),
            message: format!("page_size must be between 1 and 100, got {}", news.page_size),
        });
    }

    validate_broadcast(&config.broadcast, &mut report);
    validate_monitoring(&config.monitoring, config.service.port, &mut report);

    report
}

fn positive(field: &str, value: u64, report: &mut ValidationReport) {
    if value == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: field.to_string(),
        });
    }
}

fn validate_service(service: &ServiceConfig, report: &mut ValidationReport) {
    if service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }

    if service.port == 0 {
        report.add_error(ValidationError::InvalidServicePort);
    }

    match &service.static_dir {
        None => report.add_default("service.static_dir", "disabled"),
        Some(dir) if !std::path::Path::new(dir).is_dir() => {
            report.add_warning(
                "service.static_dir",
                &format!("directory '{}' does not exist; static files will 404", dir),
            );
        }
        Some(_) => {}
    }
}

fn validate_store(store: &StoreConfig, report: &mut ValidationReport) {
    let valid_types = ["memory", "redis"];
    if !valid_types.contains(&store.store_type.as_str()) {
        report.add_error(ValidationError::InvalidStore {
            message: format!(
                "Invalid store type '{}'. Must be one of: memory, redis",
                store.store_type
            ),
        });
        return;
    }

    if store.store_type != "redis" {
        return;
    }

    let Some(redis) = &store.redis else {
        report.add_error(ValidationError::InvalidStore {
            message: "Store type is 'redis' but redis configuration is missing".to_string(),
        });
        return;
    };

    if redis.host.trim().is_empty() || has_unresolved_env_vars(&redis.host) {
        report.add_error(ValidationError::InvalidStore {
            message: "redis host is missing or unresolved".to_string(),
        });
    }

    if redis.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "store.redis.port".to_string(),
        });
    }

    if redis.key_prefix.is_none() {
        report.add_default("store.redis.key_prefix", &default_key_prefix());
    }
}

fn validate_endpoint(
    provider: &str,
    base_url: &str,
    api_key: &str,
    timeout_seconds: u64,
    report: &mut ValidationReport,
) {
    match url::Url::parse(base_url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        Ok(parsed) => report.add_error(ValidationError::InvalidProvider {
            provider: provider.to_string(),
            message: format!("base_url scheme '{}' is not http(s)", parsed.scheme()),
        }),
        Err(e) => report.add_error(ValidationError::InvalidProvider {
            provider: provider.to_string(),
            message: format!("base_url '{}' is invalid: {}", base_url, e),
        }),
    }

    let field = format!("providers.{}.api_key", provider);
    if api_key.is_empty() {
        report.add_warning(&field, "no api key configured; upstream calls will likely be rejected");
    } else if has_unresolved_env_vars(api_key) {
        report.add_warning(&field, "api key references an unset environment variable");
    }

    positive(&format!("providers.{}.timeout_seconds", provider), timeout_seconds, report);
}

fn validate_rate_limit(provider: &str, limit: &RateLimitConfig, report: &mut ValidationReport) {
    positive(&format!("providers.{}.rate_limit.max_calls", provider), limit.max_calls, report);
    positive(
        &format!("providers.{}.rate_limit.window_seconds", provider),
        limit.window_seconds,
        report,
    );
}

fn validate_broadcast(broadcast: &BroadcastConfig, report: &mut ValidationReport) {
    if !broadcast.enabled {
        return;
    }

    positive("broadcast.interval_seconds", broadcast.interval_seconds, report);
    positive("broadcast.send_timeout_seconds", broadcast.send_timeout_seconds, report);

    if broadcast.coin_id.trim().is_empty() {
        report.add_error(ValidationError::InvalidBroadcast {
            message: "coin_id is required when broadcast is enabled".to_string(),
        });
    }

    if broadcast.send_timeout_seconds >= broadcast.interval_seconds {
        report.add_warning(
            "broadcast.send_timeout_seconds",
            "send timeout is not shorter than the broadcast interval",
        );
    }
}

fn validate_monitoring(monitoring: &MonitoringConfig, http_port: u16, report: &mut ValidationReport) {
    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&monitoring.log_format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(monitoring.log_format.clone()));
    }

    if let Some(port) = monitoring.metrics_port {
        if port == http_port {
            report.add_error(ValidationError::MetricsPortCollision(port));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_config() -> MasterConfig {
        let mut config = MasterConfig::default();
        config.providers.alpha_vantage.api_key = "av".to_string();
        config.providers.coingecko.api_key = "cg".to_string();
        config.providers.news_api.api_key = "news".to_string();
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&keyed_config());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    }

    #[test]
    fn test_missing_api_keys_are_warnings() {
        let report = validate_config(&MasterConfig::default());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn test_unresolved_api_key_is_warning() {
        let report = validate_config(&generate_default_config());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.field == "providers.news_api.api_key"));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = keyed_config();
        config.providers.coingecko.rate_limit.max_calls = 0;

        let report = validate_config(&config);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidPositiveInteger { field } if field == "providers.coingecko.rate_limit.max_calls"
        )));
    }

    #[test]
    fn test_redis_store_requires_redis_section() {
        let mut config = keyed_config();
        config.store.store_type = "redis".to_string();

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidStore { .. })));
    }

    #[test]
    fn test_redis_key_prefix_default_recorded() {
        let mut config = keyed_config();
        config.store.store_type = "redis".to_string();
        config.store.redis = Some(RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db_index: 0,
            key_prefix: None,
        });

        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report
            .defaults_applied
            .iter()
            .any(|d| d.field == "store.redis.key_prefix" && d.value == "marketpulse"));
    }

    #[test]
    fn test_unknown_store_type_rejected() {
        let mut config = keyed_config();
        config.store.store_type = "postgres".to_string();
        assert!(!validate_config(&config).is_valid());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut config = keyed_config();
        config.providers.news_api.base_url = "not a url".to_string();
        let report = validate_config(&config);
        assert!(report.errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidProvider { provider, .. } if provider == "news_api"
        )));
    }

    #[test]
    fn test_news_page_size_bounds() {
        let mut config = keyed_config();
        config.providers.news_api.page_size = 101;
        assert!(!validate_config(&config).is_valid());
    }

    #[test]
    fn test_metrics_port_collision() {
        let mut config = keyed_config();
        config.monitoring.metrics_port = Some(config.service.port);
        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::MetricsPortCollision(3000))));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = keyed_config();
        config.monitoring.log_format = "xml".to_string();
        assert!(!validate_config(&config).is_valid());
    }
}
