//! Observability infrastructure for MarketPulse
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the fetch pipeline and broadcast loop
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("marketpulse", LogFormat::Pretty)?;
//! observability::init_metrics(9100)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, CacheOutcome, FetchMetrics};
