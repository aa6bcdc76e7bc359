//! Common types and utilities for MarketPulse
//!
//! This crate provides the canonical data shapes shared by every
//! MarketPulse crate.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (SeriesPoint, NewsItem, ProviderId, etc.)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
