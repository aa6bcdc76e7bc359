//! Common types used across MarketPulse
//!
//! This module provides the canonical data shapes every provider adapter
//! normalizes into, plus the identifiers used to build cache and rate
//! limit keys.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upstream data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Alpha Vantage (indices intraday, stock daily)
    AlphaVantage,
    /// CoinGecko (crypto OHLC)
    #[serde(rename = "coingecko")]
    CoinGecko,
    /// NewsAPI (financial headlines)
    #[serde(rename = "newsapi")]
    NewsApi,
}

impl ProviderId {
    /// Stable identifier used in keys, logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::AlphaVantage => "alpha_vantage",
            ProviderId::CoinGecko => "coingecko",
            ProviderId::NewsApi => "newsapi",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticker symbol (e.g., "IBM", "SPY")
///
/// Symbols are uppercased so that `ibm` and `IBM` share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Longest symbol accepted from a caller
    pub const MAX_LEN: usize = 16;

    /// Validate and normalize a ticker symbol
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN {
            return Err(Error::invalid_input(format!("invalid symbol: {:?}", raw)));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
        {
            return Err(Error::invalid_input(format!("invalid symbol: {:?}", raw)));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// CoinGecko coin identifier (e.g., "bitcoin", "ethereum")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinId(String);

impl CoinId {
    /// Longest coin id accepted from a caller
    pub const MAX_LEN: usize = 64;

    /// Validate and normalize a coin id
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > Self::MAX_LEN
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::invalid_input(format!("invalid coin id: {:?}", raw)));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Get the coin id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CoinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One point of a normalized time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Unix timestamp in seconds
    pub time: i64,
    /// Observed value (closing price)
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Order a series oldest-to-newest and keep the most recent `window` points.
///
/// The sort is stable: points sharing a timestamp keep their input order.
pub fn normalize_series(mut points: Vec<SeriesPoint>, window: usize) -> Vec<SeriesPoint> {
    points.sort_by_key(|p| p.time);
    if points.len() > window {
        points.drain(..points.len() - window);
    }
    points
}

/// Estimated market impact of a headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    const HIGH_KEYWORDS: &'static [&'static str] =
        &["fed", "rate", "inflation", "gdp", "war", "crisis"];
    const MEDIUM_KEYWORDS: &'static [&'static str] = &["oil", "trade", "policy", "earnings"];

    /// Classify a headline by keyword (case-insensitive substring match)
    pub fn classify(title: &str) -> Self {
        let lower = title.to_lowercase();
        if Self::HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Impact::High
        } else if Self::MEDIUM_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::High => write!(f, "high"),
            Impact::Medium => write!(f, "medium"),
            Impact::Low => write!(f, "low"),
        }
    }
}

/// A normalized news headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    /// Publication time as a wall-clock string (e.g., "2:05:09 PM")
    pub time: String,
    /// Publisher name
    pub source: String,
    pub impact: Impact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_display() {
        assert_eq!(ProviderId::AlphaVantage.to_string(), "alpha_vantage");
        assert_eq!(ProviderId::CoinGecko.to_string(), "coingecko");
        assert_eq!(ProviderId::NewsApi.to_string(), "newsapi");
    }

    #[test]
    fn test_symbol() {
        assert_eq!(Symbol::parse("ibm").unwrap().as_str(), "IBM");
        assert_eq!(Symbol::parse(" brk.b ").unwrap().as_str(), "BRK.B");
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("IBM/../x").is_err());
        assert!(Symbol::parse(&"A".repeat(17)).is_err());
    }

    #[test]
    fn test_coin_id() {
        assert_eq!(CoinId::parse("Bitcoin").unwrap().as_str(), "bitcoin");
        assert_eq!(CoinId::parse("usd-coin").unwrap().as_str(), "usd-coin");
        assert!(CoinId::parse("bit coin").is_err());
    }

    #[test]
    fn test_normalize_series_keeps_newest_window() {
        let points: Vec<_> = (0..150).rev().map(|t| SeriesPoint::new(t, t as f64)).collect();
        let normalized = normalize_series(points, 100);

        assert_eq!(normalized.len(), 100);
        assert_eq!(normalized.first().unwrap().time, 50);
        assert_eq!(normalized.last().unwrap().time, 149);
        assert!(normalized.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_normalize_series_is_stable_for_duplicate_times() {
        let points = vec![
            SeriesPoint::new(2, 1.0),
            SeriesPoint::new(1, 9.0),
            SeriesPoint::new(2, 2.0),
        ];
        let normalized = normalize_series(points, 10);
        assert_eq!(
            normalized,
            vec![
                SeriesPoint::new(1, 9.0),
                SeriesPoint::new(2, 1.0),
                SeriesPoint::new(2, 2.0),
            ]
        );
    }

    #[test]
    fn test_impact_classification() {
        assert_eq!(Impact::classify("Fed holds steady"), Impact::High);
        assert_eq!(Impact::classify("Oil prices slide"), Impact::Medium);
        assert_eq!(Impact::classify("Tech stocks mixed"), Impact::Low);
        // High keywords win over medium ones
        assert_eq!(Impact::classify("Trade war escalates"), Impact::High);
    }

    #[test]
    fn test_series_point_serialization() {
        let json = serde_json::to_string(&SeriesPoint::new(1_700_000_000, 42.5)).unwrap();
        assert_eq!(json, r#"{"time":1700000000,"value":42.5}"#);
    }
}
