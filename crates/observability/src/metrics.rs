//! Prometheus metrics infrastructure
//!
//! The exporter is optional. When it is not installed, the `metrics` macros
//! record into a no-op recorder, so the helpers below are always safe to call.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP listener on the specified port that exposes metrics
/// at the `/metrics` endpoint.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// The backend errored and the lookup was treated as a miss
    Error,
}

impl CacheOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Error => "error",
        }
    }
}

/// Metric helpers for the fetch pipeline
///
/// # Metrics
///
/// * `pulse_cache_lookups_total{outcome}` - Cache lookups by outcome
/// * `pulse_rate_limited_total{provider}` - Calls rejected by the local limiter
/// * `pulse_upstream_requests_total{provider,result}` - Upstream calls by result
/// * `pulse_upstream_duration_seconds{provider}` - Upstream call latency
/// * `pulse_broadcast_ticks_total{result}` - Broadcast ticks by result
/// * `pulse_broadcast_deliveries_total` / `pulse_broadcast_drops_total`
/// * `pulse_subscribers` - Live subscribers
pub struct FetchMetrics;

impl FetchMetrics {
    pub fn cache_lookup(outcome: CacheOutcome) {
        counter!("pulse_cache_lookups_total", "outcome" => outcome.as_str()).increment(1);
    }

    pub fn rate_limited(provider: &'static str) {
        counter!("pulse_rate_limited_total", "provider" => provider).increment(1);
    }

    /// Record a finished upstream call; `result` is `ok` or an error kind
    pub fn upstream_request(provider: &'static str, result: &'static str, elapsed: Duration) {
        counter!("pulse_upstream_requests_total", "provider" => provider, "result" => result)
            .increment(1);
        histogram!("pulse_upstream_duration_seconds", "provider" => provider)
            .record(elapsed.as_secs_f64());
    }

    pub fn broadcast_tick(ok: bool) {
        let result = if ok { "ok" } else { "error" };
        counter!("pulse_broadcast_ticks_total", "result" => result).increment(1);
    }

    pub fn broadcast_delivered(delivered: usize, dropped: usize) {
        counter!("pulse_broadcast_deliveries_total").increment(delivered as u64);
        counter!("pulse_broadcast_drops_total").increment(dropped as u64);
    }

    pub fn set_subscribers(count: usize) {
        gauge!("pulse_subscribers").set(count as f64);
    }
}
