//! Process-wide `tracing` setup for the pulse binary
//!
//! `pulse start` picks the output format from `monitoring.log_format` in the
//! master config; `validate` and `init` always log pretty. Verbosity comes
//! from `RUST_LOG` and falls back to `info`, so per-crate overrides such as
//! `RUST_LOG=market_data=debug,tower_http=debug,info` expose the fetch
//! pipeline and request traces without touching the config file.

use std::fmt;

use tracing_subscriber::{layer::Layered, prelude::*, registry::Registry, EnvFilter, Layer};

const DEFAULT_DIRECTIVE: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, multi-line, with file and line (default)
    #[default]
    Pretty,
    /// One JSON object per event, with span context
    Json,
    /// Single-line text
    Compact,
}

impl LogFormat {
    /// Parse a `monitoring.log_format` value (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    /// Format for a config value, falling back to [`LogFormat::Pretty`]
    ///
    /// The config validator reports an unknown value as an error after
    /// logging is up, so startup still logs that error readably.
    pub fn from_setting(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    fn as_str(self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type FilteredRegistry = Layered<EnvFilter, Registry>;

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<FilteredRegistry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    match format {
        LogFormat::Pretty => layer
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed(),
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber
///
/// Returns an error instead of panicking when a subscriber is already set,
/// which happens when tests in one binary initialize logging twice.
pub fn init_logging(service_name: &str, format: LogFormat) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer(format))
        .try_init()?;

    tracing::info!(service = service_name, format = %format, "Logging initialized");
    Ok(())
}
