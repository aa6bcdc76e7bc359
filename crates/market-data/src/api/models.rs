//! API models for market data HTTP endpoints

use common::SeriesPoint;
use serde::{Deserialize, Serialize};

use crate::indicators::Indicator;

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            retry_after: None,
            provider: None,
        }
    }
}

/// Request to compute indicators over a caller-supplied series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub data: Vec<SeriesPoint>,
    #[serde(default = "all_indicators")]
    pub indicators: Vec<Indicator>,
}

fn all_indicators() -> Vec<Indicator> {
    vec![Indicator::Rsi, Indicator::Macd, Indicator::Bollinger]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_omits_empty_fields() {
        let body = serde_json::to_value(ErrorResponse::new("upstream_error", "boom")).unwrap();
        assert_eq!(body, json!({ "error": "boom", "code": "upstream_error" }));
    }

    #[test]
    fn test_indicator_request_defaults_to_all() {
        let req: IndicatorRequest =
            serde_json::from_value(json!({ "data": [{ "time": 1, "value": 2.0 }] })).unwrap();
        assert_eq!(req.indicators.len(), 3);

        let req: IndicatorRequest =
            serde_json::from_value(json!({ "data": [], "indicators": ["rsi"] })).unwrap();
        assert_eq!(req.indicators, vec![Indicator::Rsi]);
    }

    #[test]
    fn test_unrecognised_indicator_names_deserialize_as_unknown() {
        let req: IndicatorRequest =
            serde_json::from_value(json!({ "data": [], "indicators": ["rsi", "sma"] })).unwrap();
        assert_eq!(req.indicators, vec![Indicator::Rsi, Indicator::Unknown]);
    }
}
