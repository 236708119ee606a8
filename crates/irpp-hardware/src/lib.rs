//! Laser control layer for the Daylight MIRcat.
//!
//! - [`config`]: `hardware_configuration.toml` schema and loader
//! - [`registry`]: selects the hardware link by driver type
//! - [`controller`]: arm/tune/emission state machine and scan orchestration
//! - [`ping_pong`]: software bidirectional sweep fallback

pub use irpp_core::capabilities;
pub mod config;
pub mod controller;
pub mod ping_pong;
pub mod registry;

pub use config::{load_config, load_config_from_str, AppConfig, LaserConfig, ServerConfig};
pub use controller::{LaserController, PingPongStatus, StatusReport};
pub use registry::LinkRegistry;
