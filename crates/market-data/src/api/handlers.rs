//! API handlers for market data HTTP endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{CoinId, NewsItem, SeriesPoint, Symbol};
use tracing::debug;

use crate::api::models::{ErrorResponse, IndicatorRequest};
use crate::error::FetchError;
use crate::indicators::{self, IndicatorSet};
use crate::service::MarketDataService;
use crate::subscribers::SubscriberRegistry;

/// Shared state of the market data router
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<MarketDataService>,
    pub registry: Arc<SubscriberRegistry>,
}

/// Failure of an API call, rendered as JSON with the matching status
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Fetch(FetchError),
}

impl From<common::Error> for ApiError {
    fn from(err: common::Error) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::Fetch(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("invalid_input", message))
            }
            ApiError::Fetch(err) => {
                let status = match &err {
                    FetchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                    FetchError::UpstreamQuotaExceeded { .. } | FetchError::CacheUnavailable(_) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    FetchError::Upstream(_)
                    | FetchError::Serialization(_)
                    | FetchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let mut body = ErrorResponse::new(err.code(), err.to_string());
                body.retry_after = err.retry_after_secs();
                if let FetchError::UpstreamQuotaExceeded { provider, .. } = &err {
                    body.provider = Some(provider.to_string());
                }
                (status, body)
            }
        };

        let retry_after = body.retry_after;
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Rate limit identity of an HTTP caller
fn caller(peer: SocketAddr) -> String {
    peer.ip().to_string()
}

/// Intraday index series
pub async fn get_indices(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError> {
    let symbol = Symbol::parse(&symbol)?;
    Ok(Json(state.service.indices(&symbol, &caller(peer)).await?))
}

/// Daily stock series
pub async fn get_stock(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError> {
    let symbol = Symbol::parse(&symbol)?;
    Ok(Json(state.service.stock(&symbol, &caller(peer)).await?))
}

/// Crypto close series
pub async fn get_crypto(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(coin_id): Path<String>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError> {
    let coin = CoinId::parse(&coin_id)?;
    Ok(Json(state.service.crypto(&coin, &caller(peer)).await?))
}

/// Financial headlines
pub async fn get_news(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    Ok(Json(state.service.news(&caller(peer)).await?))
}

/// Indicators over a caller-supplied series; no upstream access
pub async fn compute_indicators(
    request: Result<Json<IndicatorRequest>, JsonRejection>,
) -> Result<Json<IndicatorSet>, ApiError> {
    let Json(request) = request?;
    debug!(points = request.data.len(), indicators = ?request.indicators, "Computing indicators");
    Ok(Json(indicators::compute(&request.data, &request.indicators)))
}
