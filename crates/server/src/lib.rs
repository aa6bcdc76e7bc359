//! Server infrastructure for MarketPulse
//!
//! This crate provides the HTTP server and the lifecycle plumbing that runs
//! it next to background components (such as the broadcast loop) with one
//! graceful shutdown path.
//!
//! # Architecture
//!
//! Every long-running piece implements the [`Server`] trait. The
//! [`Supervisor`] starts each registered component with a child
//! `CancellationToken`; cancelling the root token, or any component exiting,
//! stops the rest.
//!
//! # Quick Start
//!
//! ```ignore
//! use server::{HttpServer, ServerConfig, ServerExt, Supervisor};
//!
//! let supervisor = Supervisor::new("marketpulse")
//!     .with(HttpServer::new(ServerConfig::default(), router))
//!     .with(broadcast_loop);
//!
//! supervisor.run_with_signals().await?;
//! ```
//!
//! # Modules
//!
//! - [`config`] - Bind configuration
//! - [`traits`] - `Server` and `ServerExt` traits
//! - [`http`] - HTTP server using Axum
//! - [`health`] - Health check endpoint
//! - [`shutdown`] - Graceful shutdown utilities
//! - [`port_validator`] - Startup port checks

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod port_validator;
pub mod shutdown;
pub mod traits;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use health::{health_routes, HealthState};
pub use http::HttpServer;
pub use port_validator::validate_ports_available;
pub use shutdown::{run_until_shutdown, ShutdownController};
pub use traits::{Server, ServerExt};

/// How long the supervisor waits for components to drain after shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs several components together under one shutdown token
///
/// A component that exits on its own (successfully or not) is treated as
/// fatal for the process: the remaining components are cancelled too.
pub struct Supervisor {
    name: String,
    components: Vec<Arc<dyn Server>>,
    shutdown_timeout: Duration,
}

impl Supervisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// Register a component
    pub fn with(mut self, component: impl Server) -> Self {
        self.components.push(Arc::new(component));
        self
    }

    /// Override the drain timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Names of the registered components, in start order
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }
}

#[async_trait::async_trait]
impl Server for Supervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Option<std::net::SocketAddr> {
        self.components.iter().find_map(|c| c.address())
    }

    fn is_running(&self) -> bool {
        self.components.iter().any(|c| c.is_running())
    }

    async fn run(&self, shutdown_token: CancellationToken) -> Result<()> {
        info!(server = %self.name, components = ?self.component_names(), "Starting supervisor...");

        if self.components.is_empty() {
            warn!("No components configured to start");
            return Ok(());
        }

        let mut handles: Vec<tokio::task::JoinHandle<Result<()>>> = self
            .components
            .iter()
            .map(|component| {
                let component = component.clone();
                let token = shutdown_token.child_token();
                info!(component = component.name(), "Starting component");
                tokio::spawn(async move { component.run(token).await })
            })
            .collect();

        info!(server = %self.name, "All components started");

        let first = tokio::select! {
            _ = shutdown_token.cancelled() => {
                info!("Shutdown signal received");
                None
            }
            first = wait_for_first_completion(&mut handles) => first,
        };

        let mut failure = None;
        if let Some((result, index)) = first {
            // Already resolved; it must not be polled again below
            handles.swap_remove(index);
            match result {
                Ok(Ok(())) => {
                    warn!("A component exited unexpectedly (but successfully)");
                }
                Ok(Err(e)) => {
                    error!(%e, "A component exited with error");
                    failure = Some(e);
                }
                Err(e) => {
                    error!(%e, "A component task panicked");
                    failure = Some(ServerError::component(&self.name, e.to_string()));
                }
            }
            shutdown_token.cancel();
        }

        info!("Waiting for all components to shut down...");
        match tokio::time::timeout(self.shutdown_timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                let errors: Vec<_> = results
                    .into_iter()
                    .filter_map(|r| match r {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(e) => Some(format!("Task panicked: {}", e)),
                    })
                    .collect();

                if errors.is_empty() {
                    info!(server = %self.name, "All components shut down successfully");
                } else {
                    warn!(?errors, "Some components had errors during shutdown");
                }
            }
            Err(_) => {
                warn!("Timed out waiting for components to shut down");
            }
        }

        info!(server = %self.name, "Supervisor shutdown complete");
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Wait for the first handle to complete, returning its result and index
async fn wait_for_first_completion(
    handles: &mut [tokio::task::JoinHandle<Result<()>>],
) -> Option<(std::result::Result<Result<()>, tokio::task::JoinError>, usize)> {
    if handles.is_empty() {
        return None;
    }

    let (result, index, _remaining) = futures::future::select_all(handles.iter_mut()).await;

    Some((result, index))
}
