//! Alpha Vantage adapter (index intraday and stock daily series)

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use common::{ProviderId, SeriesPoint};
use config::AlphaVantageConfig;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{check_status, http_client, SeriesProvider};
use crate::error::ProviderError;

const PROVIDER: ProviderId = ProviderId::AlphaVantage;

/// Which Alpha Vantage time series an adapter requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaVantageFunction {
    /// `TIME_SERIES_INTRADAY`, used for indices
    Intraday,
    /// `TIME_SERIES_DAILY`, used for stocks
    Daily,
}

impl AlphaVantageFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaVantageFunction::Intraday => "TIME_SERIES_INTRADAY",
            AlphaVantageFunction::Daily => "TIME_SERIES_DAILY",
        }
    }
}

/// Alpha Vantage client bound to one time series function
#[derive(Clone)]
pub struct AlphaVantage {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    interval: String,
    function: AlphaVantageFunction,
}

impl AlphaVantage {
    pub fn new(config: &AlphaVantageConfig, function: AlphaVantageFunction) -> Result<Self, ProviderError> {
        let http = http_client(PROVIDER, Duration::from_secs(config.timeout_seconds))?;
        Ok(Self::with_client(http, config, function))
    }

    /// Build an adapter on an existing client
    pub fn with_client(http: reqwest::Client, config: &AlphaVantageConfig, function: AlphaVantageFunction) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            interval: config.intraday_interval.clone(),
            function,
        }
    }

    /// The same client, requesting another function
    pub fn for_function(&self, function: AlphaVantageFunction) -> Self {
        Self {
            function,
            ..self.clone()
        }
    }

    fn series_field(&self) -> String {
        match self.function {
            AlphaVantageFunction::Intraday => format!("Time Series ({})", self.interval),
            AlphaVantageFunction::Daily => "Time Series (Daily)".to_string(),
        }
    }
}

#[async_trait]
impl SeriesProvider for AlphaVantage {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(skip(self), fields(function = self.function.as_str()))]
    async fn fetch_series(&self, instrument: &str) -> Result<Vec<SeriesPoint>, ProviderError> {
        let mut query = vec![
            ("function", self.function.as_str()),
            ("symbol", instrument),
            ("apikey", self.api_key.as_str()),
        ];
        if self.function == AlphaVantageFunction::Intraday {
            query.push(("interval", self.interval.as_str()));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let body: Value = check_status(PROVIDER, response)?
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let points = parse_series(body, &self.series_field())?;
        debug!(points = points.len(), "Parsed Alpha Vantage series");
        Ok(points)
    }
}

/// Extract `(timestamp, close)` points from a time series envelope
///
/// Quota notices arrive as HTTP 200 with a `Note` or `Information` field.
fn parse_series(body: Value, field: &str) -> Result<Vec<SeriesPoint>, ProviderError> {
    let Value::Object(mut root) = body else {
        return Err(malformed("expected a JSON object"));
    };

    for notice in ["Note", "Information"] {
        if let Some(message) = root.get(notice).and_then(Value::as_str) {
            return Err(ProviderError::QuotaExceeded {
                provider: PROVIDER,
                message: message.to_string(),
            });
        }
    }

    if let Some(message) = root.get("Error Message").and_then(Value::as_str) {
        return Err(malformed(message));
    }

    let Some(Value::Object(series)) = root.remove(field) else {
        return Err(malformed(&format!("missing '{}'", field)));
    };

    series
        .into_iter()
        .map(|(stamp, bar)| {
            let time = parse_timestamp(&stamp)
                .ok_or_else(|| malformed(&format!("bad timestamp '{}'", stamp)))?;
            let close = bar
                .get("4. close")
                .and_then(Value::as_str)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .ok_or_else(|| malformed(&format!("bad close at '{}'", stamp)))?;
            Ok(SeriesPoint::new(time, close))
        })
        .collect()
}

/// Timestamps carry no zone; they are read as UTC
fn parse_timestamp(raw: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
}

fn malformed(message: &str) -> ProviderError {
    ProviderError::Malformed {
        provider: PROVIDER,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_parse_intraday() {
        let body = json!({
            "Meta Data": { "2. Symbol": "SPY" },
            "Time Series (1min)": {
                "2024-01-02 16:00:00": { "1. open": "1.0", "4. close": "472.65" },
                "2024-01-02 15:59:00": { "1. open": "1.0", "4. close": "472.10" }
            }
        });

        let mut points = parse_series(body, "Time Series (1min)").unwrap();
        points.sort_by_key(|p| p.time);
        assert_eq!(
            points,
            vec![
                SeriesPoint::new(1_704_211_140, 472.10),
                SeriesPoint::new(1_704_211_200, 472.65),
            ]
        );
    }

    #[test]
    fn test_parse_daily() {
        let body = json!({
            "Time Series (Daily)": {
                "2024-01-02": { "4. close": "161.50" }
            }
        });
        let points = parse_series(body, "Time Series (Daily)").unwrap();
        assert_eq!(points, vec![SeriesPoint::new(1_704_153_600, 161.5)]);
    }

    #[test]
    fn test_note_and_information_are_quota() {
        let note = json!({ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute" });
        assert_matches!(
            parse_series(note, "Time Series (Daily)"),
            Err(ProviderError::QuotaExceeded { .. })
        );

        let info = json!({ "Information": "daily limit reached" });
        assert_matches!(
            parse_series(info, "Time Series (Daily)"),
            Err(ProviderError::QuotaExceeded { .. })
        );
    }

    #[test]
    fn test_missing_series_is_malformed() {
        assert_matches!(
            parse_series(json!({ "Error Message": "Invalid API call" }), "Time Series (Daily)"),
            Err(ProviderError::Malformed { message, .. }) if message == "Invalid API call"
        );
        assert_matches!(
            parse_series(json!({}), "Time Series (Daily)"),
            Err(ProviderError::Malformed { .. })
        );
        assert_matches!(
            parse_series(json!([1, 2]), "Time Series (Daily)"),
            Err(ProviderError::Malformed { .. })
        );
    }

    #[test]
    fn test_bad_close_is_malformed() {
        let body = json!({
            "Time Series (Daily)": { "2024-01-02": { "4. close": "n/a" } }
        });
        assert_matches!(
            parse_series(body, "Time Series (Daily)"),
            Err(ProviderError::Malformed { .. })
        );
    }

    #[test]
    fn test_series_field_per_function() {
        let config = AlphaVantageConfig::default();
        let intraday = AlphaVantage::with_client(
            reqwest::Client::new(),
            &config,
            AlphaVantageFunction::Intraday,
        );
        assert_eq!(intraday.series_field(), "Time Series (1min)");
        assert_eq!(
            intraday.for_function(AlphaVantageFunction::Daily).series_field(),
            "Time Series (Daily)"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = AlphaVantageConfig {
            base_url: "http://127.0.0.1:1/query".to_string(),
            ..AlphaVantageConfig::default()
        };
        let adapter = AlphaVantage::new(&config, AlphaVantageFunction::Daily).unwrap();
        assert_matches!(
            adapter.fetch_series("IBM").await,
            Err(ProviderError::Transport { .. })
        );
    }
}
