//! Graceful shutdown utilities using CancellationToken
//!
//! Every long-running component receives a child of one root token; cancelling
//! the root (on SIGINT/SIGTERM or manually) stops them all.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A shutdown controller that coordinates graceful shutdown across components.
///
/// # Example
///
/// ```ignore
/// let shutdown = ShutdownController::with_signals();
///
/// let http_token = shutdown.child_token();
/// tokio::spawn(async move { http_server.run(http_token).await });
///
/// shutdown.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a new shutdown controller
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Create a shutdown controller that cancels on Ctrl+C or SIGTERM
    pub fn with_signals() -> Self {
        let controller = Self::new();
        let token = controller.token.clone();

        tokio::spawn(async move {
            wait_for_signal().await;
            token.cancel();
        });

        controller
    }

    /// Get a child token that will be cancelled when this controller is cancelled.
    ///
    /// Child tokens can also be cancelled independently without affecting the parent.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Get a clone of the main token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown manually
    pub fn shutdown(&self) {
        info!("Manual shutdown triggered");
        self.token.cancel();
    }

    /// Check if shutdown has been triggered
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for shutdown to be triggered (signal or manual)
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = term.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            // Without a signal source, only a manual shutdown can stop us
            std::future::pending::<()>().await;
        }
    }
}

/// Utility to run a future until shutdown is signalled
///
/// Returns `Some(result)` if the future completed, `None` if shutdown was triggered first.
pub async fn run_until_shutdown<F, T>(token: &CancellationToken, future: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        result = future => Some(result),
        _ = token.cancelled() => None,
    }
}
