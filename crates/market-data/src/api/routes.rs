//! API routes for market data

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use server::{health_routes, HealthState};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::handlers::*;
use crate::api::ws::ws_handler;

/// Upper bound on a single HTTP request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the market data router
///
/// Unmatched paths fall back to `static_dir` when one is configured.
pub fn create_router(state: ApiState, health: Arc<HealthState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/api/indices/:symbol", get(get_indices))
        .route("/api/stock/:symbol", get(get_stock))
        .route("/api/crypto/:coin_id", get(get_crypto))
        .route("/api/news", get(get_news))
        .route("/api/indicators", post(compute_indicators))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .merge(health_routes(health));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(CorsLayer::permissive()),
    )
}
