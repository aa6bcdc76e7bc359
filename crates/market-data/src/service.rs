//! Market data service
//!
//! Binds each public data endpoint to its provider, cache key scheme, TTL and
//! rate budget, and routes every call through the [`FetchOrchestrator`].

use std::sync::Arc;
use std::time::Duration;

use common::{CoinId, NewsItem, SeriesPoint, Symbol};
use config::{FailurePolicy, ProvidersConfig};
use storage::StoreHandles;
use tracing::info;

use crate::error::{FetchError, ProviderError};
use crate::orchestrator::{FetchOrchestrator, FetchRequest};
use crate::providers::{
    AlphaVantage, AlphaVantageFunction, CoinGecko, NewsApi, NewsProvider, SeriesProvider,
};
use crate::rate_limiter::{FixedWindowLimiter, RateBudget, RateScope};

/// Cache key for the financial news feed
pub const NEWS_KEY: &str = "news:financial";

/// Caching and admission settings of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPolicy {
    pub ttl: Duration,
    pub budget: RateBudget,
    /// Items kept after normalization
    pub window: usize,
    pub timeout: Duration,
}

impl EndpointPolicy {
    fn request(&self, key: String, scope: RateScope) -> FetchRequest {
        FetchRequest {
            key,
            scope,
            budget: self.budget,
            ttl: self.ttl,
            window: self.window,
            timeout: self.timeout,
        }
    }
}

/// A series endpoint: provider plus policy
#[derive(Clone)]
pub struct SeriesRoute {
    pub provider: Arc<dyn SeriesProvider>,
    pub policy: EndpointPolicy,
}

/// The news endpoint: provider plus policy
#[derive(Clone)]
pub struct NewsRoute {
    pub provider: Arc<dyn NewsProvider>,
    pub policy: EndpointPolicy,
}

/// All endpoint bindings
#[derive(Clone)]
pub struct ServiceRoutes {
    pub indices: SeriesRoute,
    pub stocks: SeriesRoute,
    pub crypto: SeriesRoute,
    pub news: NewsRoute,
}

/// Entry point for every data read, whether from HTTP or the broadcast loop
pub struct MarketDataService {
    orchestrator: FetchOrchestrator,
    routes: ServiceRoutes,
}

impl MarketDataService {
    pub fn new(orchestrator: FetchOrchestrator, routes: ServiceRoutes) -> Self {
        Self { orchestrator, routes }
    }

    /// Wire the real provider adapters from configuration
    pub fn from_config(
        providers: &ProvidersConfig,
        stores: StoreHandles,
        policy: FailurePolicy,
    ) -> Result<Self, ProviderError> {
        let av = &providers.alpha_vantage;
        let intraday = AlphaVantage::new(av, AlphaVantageFunction::Intraday)?;
        let daily = intraday.for_function(AlphaVantageFunction::Daily);
        let av_budget = RateBudget::from(&av.rate_limit);
        let av_timeout = Duration::from_secs(av.timeout_seconds);

        let cg = &providers.coingecko;
        let news = &providers.news_api;

        let routes = ServiceRoutes {
            indices: SeriesRoute {
                provider: Arc::new(intraday),
                policy: EndpointPolicy {
                    ttl: Duration::from_secs(av.indices_ttl_seconds),
                    budget: av_budget,
                    window: av.series_window,
                    timeout: av_timeout,
                },
            },
            stocks: SeriesRoute {
                provider: Arc::new(daily),
                policy: EndpointPolicy {
                    ttl: Duration::from_secs(av.stock_ttl_seconds),
                    budget: av_budget,
                    window: av.series_window,
                    timeout: av_timeout,
                },
            },
            crypto: SeriesRoute {
                provider: Arc::new(CoinGecko::new(cg)?),
                policy: EndpointPolicy {
                    ttl: Duration::from_secs(cg.ttl_seconds),
                    budget: RateBudget::from(&cg.rate_limit),
                    window: cg.series_window,
                    timeout: Duration::from_secs(cg.timeout_seconds),
                },
            },
            news: NewsRoute {
                provider: Arc::new(NewsApi::new(news)?),
                policy: EndpointPolicy {
                    ttl: Duration::from_secs(news.ttl_seconds),
                    budget: RateBudget::from(&news.rate_limit),
                    window: news.page_size,
                    timeout: Duration::from_secs(news.timeout_seconds),
                },
            },
        };

        let limiter = Arc::new(FixedWindowLimiter::new(stores.counters, policy));
        let orchestrator = FetchOrchestrator::new(stores.cache, limiter, policy);

        info!(?policy, "Market data service configured");
        Ok(Self::new(orchestrator, routes))
    }

    /// Intraday series for a market index
    pub async fn indices(&self, symbol: &Symbol, caller: &str) -> Result<Vec<SeriesPoint>, FetchError> {
        self.series(&self.routes.indices, format!("indices:{}", symbol), symbol.as_str(), caller)
            .await
    }

    /// Daily series for a stock
    pub async fn stock(&self, symbol: &Symbol, caller: &str) -> Result<Vec<SeriesPoint>, FetchError> {
        self.series(&self.routes.stocks, format!("stock:{}", symbol), symbol.as_str(), caller)
            .await
    }

    /// OHLC close series for a coin
    pub async fn crypto(&self, coin: &CoinId, caller: &str) -> Result<Vec<SeriesPoint>, FetchError> {
        self.series(&self.routes.crypto, format!("crypto:{}", coin), coin.as_str(), caller)
            .await
    }

    /// Latest financial headlines
    pub async fn news(&self, caller: &str) -> Result<Vec<NewsItem>, FetchError> {
        let route = &self.routes.news;
        let provider = route.provider.clone();
        let request = route
            .policy
            .request(NEWS_KEY.to_string(), RateScope::new(provider.id(), caller));

        self.orchestrator
            .resolve(request, move || async move { provider.fetch_news().await })
            .await
    }

    async fn series(
        &self,
        route: &SeriesRoute,
        key: String,
        instrument: &str,
        caller: &str,
    ) -> Result<Vec<SeriesPoint>, FetchError> {
        let provider = route.provider.clone();
        let request = route.policy.request(key, RateScope::new(provider.id(), caller));
        let instrument = instrument.to_string();

        self.orchestrator
            .resolve(request, move || async move { provider.fetch_series(&instrument).await })
            .await
    }
}
