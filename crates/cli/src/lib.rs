use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default location of the master configuration file
pub const DEFAULT_CONFIG_PATH: &str = "master_config/master_config.yaml";

#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(about = "MarketPulse - financial market data aggregation server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server with the given configuration
    Start {
        /// Path to the configuration file
        #[arg(short, long, env = "PULSE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Override the HTTP port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Validate configuration without starting the server
    Validate {
        /// Path to the configuration file
        #[arg(short, long, env = "PULSE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "master_config.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
