//! Live subscriber registry
//!
//! The registry holds weak handles to subscriber sinks; the transport that
//! accepted a connection owns the sink. A sink that fails a send, times out,
//! or has been dropped by its owner is removed during the broadcast that
//! notices it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use observability::FetchMetrics;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// Identifier handed out by [`SubscriberRegistry::add`]
pub type SubscriberId = u64;

/// Delivery to one subscriber failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("subscriber send failed: {0}")]
pub struct SinkError(pub String);

/// Somewhere a text frame can be pushed
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    async fn send_text(&self, text: Arc<str>) -> Result<(), SinkError>;
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Set of currently connected subscribers
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    sinks: RwLock<HashMap<SubscriberId, Weak<dyn SubscriberSink>>>,
    send_timeout: Duration,
}

impl SubscriberRegistry {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sinks: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Register a sink; the registry keeps only a weak handle
    pub fn add(&self, sink: &Arc<dyn SubscriberSink>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut sinks = self.sinks.write();
            sinks.insert(id, Arc::downgrade(sink));
            sinks.len()
        };
        FetchMetrics::set_subscribers(count);
        info!(subscriber = id, total = count, "Subscriber connected");
        id
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn remove(&self, id: SubscriberId) {
        let (removed, count) = {
            let mut sinks = self.sinks.write();
            (sinks.remove(&id).is_some(), sinks.len())
        };
        if removed {
            FetchMetrics::set_subscribers(count);
            info!(subscriber = id, total = count, "Subscriber disconnected");
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Send `message` to every live subscriber
    ///
    /// Sends run concurrently, each bounded by the send timeout. The set is
    /// snapshotted first, so subscribers added mid-broadcast wait for the
    /// next one.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let mut dead = Vec::new();
        let live: Vec<(SubscriberId, Arc<dyn SubscriberSink>)> = self
            .sinks
            .read()
            .iter()
            .filter_map(|(id, weak)| match weak.upgrade() {
                Some(sink) => Some((*id, sink)),
                None => {
                    dead.push(*id);
                    None
                }
            })
            .collect();

        let text: Arc<str> = Arc::from(message);
        let sends = live.iter().map(|(id, sink)| {
            let text = text.clone();
            async move {
                match tokio::time::timeout(self.send_timeout, sink.send_text(text)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => {
                        debug!(subscriber = id, error = %e, "Dropping subscriber after failed send");
                        Some(*id)
                    }
                    Err(_) => {
                        debug!(subscriber = id, "Dropping subscriber after send timeout");
                        Some(*id)
                    }
                }
            }
        });
        let failed: Vec<SubscriberId> = join_all(sends).await.into_iter().flatten().collect();

        let report = BroadcastReport {
            delivered: live.len() - failed.len(),
            dropped: failed.len() + dead.len(),
        };

        if report.dropped > 0 {
            let count = {
                let mut sinks = self.sinks.write();
                for id in failed.iter().chain(dead.iter()) {
                    sinks.remove(id);
                }
                sinks.len()
            };
            FetchMetrics::set_subscribers(count);
        }
        FetchMetrics::broadcast_delivered(report.delivered, report.dropped);

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that records frames, optionally failing or stalling
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub frames: Mutex<Vec<String>>,
        pub fail: bool,
        pub stall: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn stalling() -> Self {
            Self {
                stall: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SubscriberSink for RecordingSink {
        async fn send_text(&self, text: Arc<str>) -> Result<(), SinkError> {
            if self.stall {
                futures::future::pending::<()>().await;
            }
            if self.fail {
                return Err(SinkError("connection reset".into()));
            }
            self.frames.lock().push(text.to_string());
            Ok(())
        }
    }

    fn as_sink(sink: &Arc<RecordingSink>) -> Arc<dyn SubscriberSink> {
        sink.clone()
    }

    #[tokio::test]
    async fn test_add_remove() {
        let registry = SubscriberRegistry::new(Duration::from_secs(5));
        let sink = as_sink(&Arc::new(RecordingSink::default()));

        let a = registry.add(&sink);
        let b = registry.add(&sink);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        registry.remove(a);
        registry.remove(a);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sink_is_removed_others_delivered() {
        let registry = SubscriberRegistry::new(Duration::from_secs(5));
        let good = Arc::new(RecordingSink::default());
        let bad = Arc::new(RecordingSink::failing());
        let good_dyn = as_sink(&good);
        let bad_dyn = as_sink(&bad);
        registry.add(&good_dyn);
        registry.add(&bad_dyn);

        let report = registry.broadcast("hello").await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(registry.len(), 1);
        assert_eq!(*good.frames.lock(), vec!["hello".to_string()]);

        let report = registry.broadcast("again").await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sink_times_out() {
        let registry = SubscriberRegistry::new(Duration::from_secs(5));
        let good = Arc::new(RecordingSink::default());
        let slow = Arc::new(RecordingSink::stalling());
        let good_dyn = as_sink(&good);
        let slow_dyn = as_sink(&slow);
        registry.add(&good_dyn);
        registry.add(&slow_dyn);

        let started = tokio::time::Instant::now();
        let report = registry.broadcast("tick").await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_owner_is_swept() {
        let registry = SubscriberRegistry::new(Duration::from_secs(5));
        let sink = as_sink(&Arc::new(RecordingSink::default()));
        registry.add(&sink);
        drop(sink);

        let report = registry.broadcast("x").await;
        assert_eq!(report, BroadcastReport { delivered: 0, dropped: 1 });
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_to_nobody() {
        let registry = SubscriberRegistry::new(Duration::from_secs(5));
        assert_eq!(registry.broadcast("x").await, BroadcastReport::default());
    }
}
