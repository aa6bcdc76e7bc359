//! NewsAPI adapter (financial headlines)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Impact, NewsItem, ProviderId};
use config::NewsApiConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{http_client, NewsProvider};
use crate::error::ProviderError;

const PROVIDER: ProviderId = ProviderId::NewsApi;

/// Error codes NewsAPI uses for an exhausted quota
const QUOTA_CODES: [&str; 2] = ["rateLimited", "apiKeyExhausted"];

/// Titles NewsAPI substitutes for withdrawn articles
const REMOVED_TITLE: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    source: Option<ArticleSource>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// NewsAPI `everything` client
#[derive(Clone)]
pub struct NewsApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    query: String,
    page_size: usize,
}

impl NewsApi {
    pub fn new(config: &NewsApiConfig) -> Result<Self, ProviderError> {
        let http = http_client(PROVIDER, Duration::from_secs(config.timeout_seconds))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            query: config.query.clone(),
            page_size: config.page_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[async_trait]
impl NewsProvider for NewsApi {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    #[instrument(skip(self))]
    async fn fetch_news(&self) -> Result<Vec<NewsItem>, ProviderError> {
        let page_size = self.page_size.to_string();
        let response = self
            .http
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", self.query.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        // Error details are in the body even on 4xx, so read it first
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        let items = parse_envelope(status.as_u16(), &body)?;
        debug!(items = items.len(), "Parsed NewsAPI headlines");
        Ok(items)
    }
}

fn parse_envelope(status: u16, body: &[u8]) -> Result<Vec<NewsItem>, ProviderError> {
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(_) if status == 429 => return Err(quota("HTTP 429".to_string())),
        Err(_) if !(200..300).contains(&status) => {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status,
            })
        }
        Err(e) => {
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                message: e.to_string(),
            })
        }
    };

    if envelope.status != "ok" {
        let code = envelope.code.unwrap_or_default();
        let message = envelope.message.unwrap_or_else(|| code.clone());
        if status == 429 || QUOTA_CODES.contains(&code.as_str()) {
            return Err(quota(message));
        }
        if !(200..300).contains(&status) {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status,
            });
        }
        return Err(ProviderError::Malformed {
            provider: PROVIDER,
            message,
        });
    }

    Ok(envelope
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.title.filter(|t| !t.is_empty() && t != REMOVED_TITLE)?;
            let source = article
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| "Unknown".to_string());
            let time = article
                .published_at
                .map(|raw| format_time(&raw))
                .unwrap_or_default();
            Some(NewsItem {
                impact: Impact::classify(&title),
                title,
                time,
                source,
            })
        })
        .collect())
}

/// Wall-clock time of day in UTC, e.g. `2:05:09 PM`
fn format_time(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(published) => published
            .with_timezone(&Utc)
            .format("%-I:%M:%S %p")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn quota(message: String) -> ProviderError {
    ProviderError::QuotaExceeded {
        provider: PROVIDER,
        message,
    }
}
