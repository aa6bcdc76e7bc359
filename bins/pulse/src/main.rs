//! MarketPulse CLI and Server Binary
//!
//! This is the main entry point for the MarketPulse application.
//! It provides commands for initializing, validating, and starting
//! the aggregation server.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{generate_default_config, load_config, save_config, validate_config, MasterConfig, ValidationReport};
use market_data::api::{create_router, ApiState};
use market_data::{BroadcastLoop, MarketDataService, SubscriberRegistry};
use observability::{init_logging, init_metrics, LogFormat};
use server::{validate_ports_available, HealthState, HttpServer, ServerConfig, ServerExt, Supervisor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start { config, port } => {
            let config = load_config(&config)
                .with_context(|| format!("Failed to load configuration from {:?}", config))?;
            let format = LogFormat::from_setting(&config.monitoring.log_format);
            init_logging(&config.service.name, format)?;
            if let Ok(path) = dotenv {
                debug!(?path, "Loaded environment file");
            }

            info!("Executing 'start' command");
            start_server(config, port).await
        }
        Commands::Validate { config } => {
            init_logging("pulse", LogFormat::Pretty)?;
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging("pulse", LogFormat::Pretty)?;
            info!("Executing 'init' command");
            init_command(output)
        }
    }
}

fn log_report(report: &ValidationReport) {
    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Default applied");
    }
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    for err in &report.errors {
        error!("{}", err);
    }
}

async fn start_server(mut config: MasterConfig, port_override: Option<u16>) -> Result<()> {
    if let Some(port) = port_override {
        debug!(port, "Overriding HTTP port from command line");
        config.service.port = port;
    }

    let report = validate_config(&config);
    log_report(&report);
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        anyhow::bail!("Cannot start server due to configuration errors");
    }

    let server_config = ServerConfig::new(config.service.host.clone(), config.service.port);
    validate_ports_available(&server_config, &[]).await?;

    if let Some(metrics_port) = config.monitoring.metrics_port {
        init_metrics(metrics_port)?;
    }

    let stores = storage::create_store_from_config(&config.store)
        .await
        .context("Failed to create cache store")?;

    let service = Arc::new(MarketDataService::from_config(
        &config.providers,
        stores,
        config.store.failure_policy,
    )?);
    let registry = Arc::new(SubscriberRegistry::new(Duration::from_secs(
        config.broadcast.send_timeout_seconds,
    )));

    let health = Arc::new(HealthState::new(config.service.name.clone()));
    {
        let registry = registry.clone();
        health.register_gauge("subscribers", move || registry.len() as u64);
    }

    let router = create_router(
        ApiState {
            service: service.clone(),
            registry: registry.clone(),
        },
        health,
        config.service.static_dir.as_deref().map(Path::new),
    );

    let mut supervisor = Supervisor::new(config.service.name.clone())
        .with(HttpServer::new(server_config, router));

    if config.broadcast.enabled {
        let broadcast = BroadcastLoop::from_config(&config.broadcast, service, registry)?;
        supervisor = supervisor.with(broadcast);
    } else {
        info!("Broadcast loop disabled");
    }

    info!(
        service = %config.service.name,
        host = %config.service.host,
        port = config.service.port,
        store = %config.store.store_type,
        "Starting server"
    );

    supervisor.run_with_signals().await?;
    Ok(())
}

fn validate_command(config_path: PathBuf) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {} on {}:{}", config.service.name, config.service.host, config.service.port);
    println!("Store: {} (failure policy: {:?})", config.store.store_type, config.store.failure_policy);
    println!(
        "Broadcast: {}",
        if config.broadcast.enabled {
            format!("{} every {}s", config.broadcast.coin_id, config.broadcast.interval_seconds)
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}

fn init_command(output_path: PathBuf) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, &output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Set ALPHA_VANTAGE_KEY, COINGECKO_KEY and NEWS_API_KEY (or add them to .env)");
    println!(
        "  2. Run 'pulse validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'pulse start --config {:?}' to start the server",
        output_path
    );

    Ok(())
}
