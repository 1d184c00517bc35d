pub mod config;
pub mod error;

pub use config::{
    Config, LocationConfig, SearchConfig, StoreConfig, TemperatureUnit, ValidationResult,
    WeatherConfig,
};
pub use error::{
    AppError, ConfigError, DatabaseError, DecodeError, LocationError, NetworkError,
    ReqwestErrorExt, RusqliteErrorExt, WeatherError,
};

use anyhow::Result;

/// Initialize logging for the process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Breeze core initialized");
    Ok(())
}
