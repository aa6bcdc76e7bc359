//! Periodic crypto broadcast
//!
//! Every interval the loop resolves the configured coin through the normal
//! cache-or-fetch path (as caller [`INTERNAL_BROADCAST_CALLER`]) and pushes
//! `{"type":"crypto","data":[...]}` to every live subscriber. A failed tick
//! is logged and the loop waits for the next one.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{CoinId, SeriesPoint};
use config::BroadcastConfig;
use observability::FetchMetrics;
use serde::Serialize;
use server::{run_until_shutdown, Server};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::rate_limiter::INTERNAL_BROADCAST_CALLER;
use crate::service::MarketDataService;
use crate::subscribers::{BroadcastReport, SubscriberRegistry};

/// Frame pushed to subscribers
#[derive(Debug, Serialize)]
pub struct StreamMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [SeriesPoint],
}

/// Background component driving the live crypto feed
pub struct BroadcastLoop {
    service: Arc<MarketDataService>,
    registry: Arc<SubscriberRegistry>,
    coin: CoinId,
    interval: Duration,
    running: AtomicBool,
}

impl BroadcastLoop {
    pub fn new(
        service: Arc<MarketDataService>,
        registry: Arc<SubscriberRegistry>,
        coin: CoinId,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            registry,
            coin,
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        config: &BroadcastConfig,
        service: Arc<MarketDataService>,
        registry: Arc<SubscriberRegistry>,
    ) -> common::Result<Self> {
        let coin = CoinId::parse(&config.coin_id)?;
        Ok(Self::new(
            service,
            registry,
            coin,
            Duration::from_secs(config.interval_seconds),
        ))
    }

    /// Run one resolve-and-broadcast cycle
    pub async fn tick(&self) -> Result<BroadcastReport, FetchError> {
        let series = self.service.crypto(&self.coin, INTERNAL_BROADCAST_CALLER).await?;

        let frame = serde_json::to_string(&StreamMessage {
            kind: "crypto",
            data: &series,
        })
        .map_err(|e| FetchError::Serialization(e.to_string()))?;

        Ok(self.registry.broadcast(&frame).await)
    }
}

#[async_trait]
impl Server for BroadcastLoop {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn address(&self) -> Option<SocketAddr> {
        None
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, shutdown: CancellationToken) -> server::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(coin = %self.coin, interval_secs = self.interval.as_secs(), "Broadcast loop started");

        // First broadcast after one full interval
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match run_until_shutdown(&shutdown, self.tick()).await {
                        None => break,
                        Some(Ok(report)) => {
                            FetchMetrics::broadcast_tick(true);
                            debug!(
                                delivered = report.delivered,
                                dropped = report.dropped,
                                "Broadcast tick complete"
                            );
                        }
                        Some(Err(e)) => {
                            FetchMetrics::broadcast_tick(false);
                            warn!(coin = %self.coin, error = %e, "Broadcast tick failed");
                        }
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Broadcast loop stopped");
        Ok(())
    }
}
