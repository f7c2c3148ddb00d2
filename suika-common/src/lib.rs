//! Suika Common Library
//!
//! This crate provides shared types and utilities for the Suika telemetry bridge:
//!
//! - [`telemetry`] - Sensor data model (`SensorCategory`, `SensorSnapshot`, `Counters`, `Uptime`)
//! - [`config`] - Configuration loading (JSON5 format) and logging settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use telemetry::{Counters, SensorCategory, SensorSnapshot, Uptime};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Output goes to stderr in
/// the configured [`LogFormat`].
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| Error::Config(format!("Invalid log level '{}': {e}", config.level)))?,
    };

    let output = match config.format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {e}")))
}
