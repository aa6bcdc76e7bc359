//! Port validation utilities
//!
//! Checking a port before binding is inherently racy: another process can
//! take it in between. These checks give early feedback at startup; the
//! actual bind remains authoritative.

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Validate that the configured HTTP port (and optional extra ports) are free
pub async fn validate_ports_available(config: &ServerConfig, extra: &[(&str, u16)]) -> Result<()> {
    info!("Validating server ports...");

    let mut ports_to_check = vec![("HTTP", config.http_port)];
    ports_to_check.extend_from_slice(extra);

    for (label, port) in ports_to_check {
        validate_port_range(port)?;
        validate_single_port(&config.host, port, label).await?;
    }

    info!("All server ports validated successfully");
    Ok(())
}

async fn validate_single_port(host: &str, port: u16, label: &str) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    debug!("Checking {} port {}", label, port);

    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            let local_addr = listener
                .local_addr()
                .map_err(|e| ServerError::bind(addr.clone(), e))?;
            drop(listener);

            info!("{} port {} is available ({})", label, port, local_addr);
            Ok(())
        }
        Err(e) => {
            error!("{} port {} is NOT available: {}", label, port, e);
            Err(ServerError::port_in_use(port, e.to_string()))
        }
    }
}

/// Check if a port is in use
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr).await.is_err()
}

/// Validate port range
///
/// Port 0 is rejected; ports below 1024 generate a warning.
pub fn validate_port_range(port: u16) -> Result<()> {
    if port == 0 {
        Err(ServerError::ConfigError(
            "Port cannot be 0 (ephemeral port assignment not supported for explicit binding)"
                .to_string(),
        ))
    } else {
        if port < 1024 {
            warn!("Port {} is a privileged port (requires root/admin privileges)", port);
        }
        Ok(())
    }
}
