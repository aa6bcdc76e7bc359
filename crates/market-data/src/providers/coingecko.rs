//! CoinGecko adapter (crypto OHLC)

use async_trait::async_trait;
use common::{ProviderId, SeriesPoint};
use config::CoinGeckoConfig;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{check_status, http_client, SeriesProvider};
use crate::error::ProviderError;

const PROVIDER: ProviderId = ProviderId::CoinGecko;
const API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// CoinGecko OHLC client
#[derive(Clone)]
pub struct CoinGecko {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    vs_currency: String,
    days: u32,
}

impl CoinGecko {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, ProviderError> {
        let http = http_client(PROVIDER, Duration::from_secs(config.timeout_seconds))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            vs_currency: config.vs_currency.clone(),
            days: config.days,
        })
    }
}

#[async_trait]
impl SeriesProvider for CoinGecko {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(skip(self))]
    async fn fetch_series(&self, instrument: &str) -> Result<Vec<SeriesPoint>, ProviderError> {
        let url = format!("{}/coins/{}/ohlc", self.base_url, instrument);
        let days = self.days.to_string();

        let mut request = self
            .http
            .get(&url)
            .query(&[("vs_currency", self.vs_currency.as_str()), ("days", days.as_str())]);
        if !self.api_key.is_empty() {
            request = request.header(API_KEY_HEADER, &self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let body: Value = check_status(PROVIDER, response)?
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let points = parse_ohlc(body)?;
        debug!(points = points.len(), "Parsed CoinGecko OHLC");
        Ok(points)
    }
}

/// Rows are `[time_ms, open, high, low, close]`; the close is kept
fn parse_ohlc(body: Value) -> Result<Vec<SeriesPoint>, ProviderError> {
    let Value::Array(rows) = body else {
        return Err(malformed("expected an array of OHLC rows".to_string()));
    };

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let fields = row
                .as_array()
                .filter(|f| f.len() >= 5)
                .ok_or_else(|| malformed(format!("row {} is not a 5-tuple", i)))?;
            let millis = fields[0]
                .as_f64()
                .ok_or_else(|| malformed(format!("row {} has a bad timestamp", i)))?;
            let close = fields[4]
                .as_f64()
                .ok_or_else(|| malformed(format!("row {} has a bad close", i)))?;
            Ok(SeriesPoint::new((millis / 1000.0).trunc() as i64, close))
        })
        .collect()
}

fn malformed(message: String) -> ProviderError {
    ProviderError::Malformed {
        provider: PROVIDER,
        message,
    }
}
