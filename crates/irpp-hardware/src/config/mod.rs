//! Hardware configuration.
//!
//! - [`schema`]: typed view of `hardware_configuration.toml`
//! - [`loader`]: figment layering (defaults, file, `IRPP_` environment) plus validation

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, ConfigLoadError};
pub use schema::{
    AppConfig, LaserConfig, LaserParameters, QclRange, ScanConfig, ServerConfig, TimingConfig,
};
