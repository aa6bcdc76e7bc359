//! Health check endpoint

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

type GaugeFn = Box<dyn Fn() -> u64 + Send + Sync>;

/// Shared state for health checks
///
/// Components register named gauges (e.g. live subscriber count) that are
/// sampled on every health request.
pub struct HealthState {
    pub service_name: String,
    pub start_time: Instant,
    gauges: RwLock<Vec<(String, GaugeFn)>>,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            start_time: Instant::now(),
            gauges: RwLock::new(Vec::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Register a gauge reported under `name`, replacing any previous one
    pub fn register_gauge<F>(&self, name: impl Into<String>, gauge: F)
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        let name = name.into();
        let mut gauges = self.gauges.write();
        gauges.retain(|(existing, _)| *existing != name);
        gauges.push((name, Box::new(gauge)));
    }

    /// Sample every registered gauge
    pub fn sample(&self) -> Map<String, Value> {
        self.gauges
            .read()
            .iter()
            .map(|(name, gauge)| (name.clone(), Value::from(gauge())))
            .collect()
    }
}

/// Health check handler for HTTP
pub async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "gauges": state.sample(),
    }))
}

/// Create health check router
pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}
