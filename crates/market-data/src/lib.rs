//! Market data aggregation for MarketPulse
//!
//! This crate fetches index, stock, crypto and news data from upstream
//! providers, protects each provider's quota with per-caller rate limits,
//! caches normalized results, and pushes a live crypto feed to WebSocket
//! subscribers.
//!
//! # Core Components
//!
//! - [`rate_limiter`] - Fixed-window limiter per (provider, caller)
//! - [`orchestrator`] - Cache-or-fetch pipeline with single-flight
//! - [`providers`] - Alpha Vantage, CoinGecko and NewsAPI adapters
//! - [`service`] - Endpoint bindings (keys, TTLs, budgets)
//! - [`subscribers`] - Live subscriber registry
//! - [`broadcast`] - Periodic crypto broadcast loop
//! - [`indicators`] - RSI, MACD and Bollinger bands
//! - `api` - HTTP and WebSocket routes (feature `api`)
//!
//! # Key Invariants
//!
//! - A cache hit never consumes rate limit budget or calls a provider
//! - A rejected call never reaches the provider
//! - Cached series are sorted by time and capped to the series window
//! - Concurrent misses for one key make at most one upstream call

pub mod broadcast;
pub mod error;
pub mod indicators;
pub mod orchestrator;
pub mod providers;
pub mod rate_limiter;
pub mod service;
pub mod subscribers;

#[cfg(feature = "api")]
pub mod api;

pub use broadcast::BroadcastLoop;
pub use error::{FetchError, ProviderError};
pub use orchestrator::{FetchOrchestrator, FetchRequest};
pub use rate_limiter::{FixedWindowLimiter, RateBudget, RateLimiter, RateScope};
pub use service::MarketDataService;
pub use subscribers::{SubscriberRegistry, SubscriberSink};

pub type Result<T> = std::result::Result<T, FetchError>;
