//! Server configuration

use crate::error::{Result, ServerError};
use std::net::SocketAddr;

/// Default HTTP port for the aggregation server
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Bind configuration for the HTTP server
///
/// # Example
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1", 3000);
/// assert_eq!(config.http_addr().unwrap().port(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// HTTP port; 0 asks the OS for an ephemeral port
    pub http_port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, http_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port,
        }
    }

    /// Get HTTP socket address
    pub fn http_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.http_port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.http_port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", DEFAULT_HTTP_PORT)
    }
}
