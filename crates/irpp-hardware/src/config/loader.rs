//! Configuration loading.
//!
//! Layering, later layers override earlier ones:
//! 1. Defaults from [`AppConfig::default`]
//! 2. The TOML file
//! 3. Environment variables prefixed with `IRPP_`, nested with `__`
//!
//! ```text
//! IRPP_SERVER__BIND_ADDRESS=127.0.0.1:9000
//! IRPP_DAYLIGHT_MIRCAT__DRIVER=mock
//! IRPP_DAYLIGHT_MIRCAT__SCAN__PING_PONG_FALLBACK=false
//! ```

use super::schema::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;
use tracing::{debug, info};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "IRPP_";

/// Error types for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// No file at the given path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Invalid TOML or wrong field types
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Parsed but semantically invalid; one problem per line.
    #[error("Config validation failed:\n{0}")]
    ValidationError(String),
}

/// Load and validate the configuration file at `path`, with environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading hardware config from: {}", path.display());

    let figment = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config = extract(figment)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;

    info!(
        driver = %config.daylight_mircat.driver,
        bind = %config.server.bind_address,
        "Loaded hardware configuration"
    );
    Ok(config)
}

/// Load and validate configuration from a TOML string. No environment layer.
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig> {
    let figment =
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml_str));
    Ok(extract(figment)?)
}

fn extract(figment: Figment) -> Result<AppConfig, ConfigLoadError> {
    let config: AppConfig = figment
        .extract()
        .map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;

    config
        .daylight_mircat
        .validate()
        .map_err(|errors| ConfigLoadError::ValidationError(errors.join("\n")))?;

    Ok(config)
}
