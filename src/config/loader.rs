//! Configuration loader

use config::{Config, Environment, File, FileFormat};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::Result;

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with STRATEGY_, `__` between levels,
///    e.g. `STRATEGY_STRATEGY__TRAILING_PCT=0.02`)
/// 2. Configuration file (TOML format)
/// 3. Default values
///
/// The strategy and rotation sections are validated before returning.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    // Pick up a .env file if present
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::new(path, FileFormat::Toml).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("STRATEGY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: AppConfig = builder.build()?.try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from a TOML string (no environment overlay)
pub fn load_from_str(toml: &str) -> Result<AppConfig> {
    let config: AppConfig = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    config.strategy.validate()?;
    if let Some(rotation) = &config.rotation {
        rotation.validate()?;
    }
    Ok(())
}
