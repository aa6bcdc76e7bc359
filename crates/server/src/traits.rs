//! Server traits for polymorphic component handling
//!
//! Anything long-running (the HTTP listener, periodic background loops, the
//! supervisor itself) implements [`Server`] so it can be started, observed
//! and shut down the same way.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Core trait for supervised long-running components.
///
/// # Implementors
///
/// - [`HttpServer`](crate::http::HttpServer) - HTTP server using Axum
/// - [`Supervisor`](crate::Supervisor) - Runs several components together
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Returns the component's name for logging and identification.
    fn name(&self) -> &str;

    /// Returns the address the component is bound to, if it listens at all.
    fn address(&self) -> Option<SocketAddr>;

    /// Returns true if the component is currently running.
    fn is_running(&self) -> bool;

    /// Runs the component until the shutdown token is cancelled.
    ///
    /// Implementations return `Ok(())` on clean shutdown and an error only
    /// for failures that prevent the component from continuing.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Extension trait providing convenience methods for servers.
///
/// This trait is automatically implemented for all types that implement [`Server`].
pub trait ServerExt: Server + Sized {
    /// Spawns the server on a new task and returns a handle and shutdown token.
    fn spawn(self) -> (tokio::task::JoinHandle<Result<()>>, CancellationToken) {
        let token = CancellationToken::new();
        let token_clone = token.clone();
        let handle = tokio::spawn(async move { self.run(token_clone).await });
        (handle, token)
    }

    /// Runs the server until Ctrl+C or SIGTERM.
    fn run_with_signals(self) -> impl std::future::Future<Output = Result<()>> + Send {
        async move {
            let shutdown = crate::shutdown::ShutdownController::with_signals();
            self.run(shutdown.token()).await
        }
    }
}

impl<T: Server + Sized> ServerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockServer {
        name: String,
    }

    #[async_trait]
    impl Server for MockServer {
        fn name(&self) -> &str {
            &self.name
        }

        fn address(&self) -> Option<SocketAddr> {
            None
        }

        fn is_running(&self) -> bool {
            false
        }

        async fn run(&self, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_server_ext_spawn() {
        let server = MockServer {
            name: "test".to_string(),
        };
        assert_eq!(server.name(), "test");

        let (handle, token) = server.spawn();
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
