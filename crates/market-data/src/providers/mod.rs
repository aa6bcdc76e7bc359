//! Upstream provider adapters
//!
//! Each adapter turns one provider's wire format into the canonical
//! [`SeriesPoint`] / [`NewsItem`] shapes. Adapters do no caching and no rate
//! limiting; the orchestrator wraps every call.

mod alpha_vantage;
mod coingecko;
mod newsapi;

use std::time::Duration;

use async_trait::async_trait;
use common::{NewsItem, ProviderId, SeriesPoint};

use crate::error::ProviderError;

pub use alpha_vantage::{AlphaVantage, AlphaVantageFunction};
pub use coingecko::CoinGecko;
pub use newsapi::NewsApi;

/// A source of price series keyed by an instrument identifier
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetch the series for `instrument`, in any order
    async fn fetch_series(&self, instrument: &str) -> Result<Vec<SeriesPoint>, ProviderError>;
}

/// A source of financial headlines
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, ProviderError>;
}

/// Build the HTTP client shared by one provider's adapters
pub(crate) fn http_client(provider: ProviderId, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("marketpulse/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Config {
            provider,
            message: e.to_string(),
        })
}

/// Turn a non-success response into a [`ProviderError`]
pub(crate) fn check_status(provider: ProviderId, response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::QuotaExceeded {
            provider,
            message: "HTTP 429".to_string(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
        });
    }
    Ok(response)
}
