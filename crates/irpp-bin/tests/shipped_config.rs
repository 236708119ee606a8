//! The configuration file shipped in `config/` must load and pass every driver's checks.

use irpp_driver_mircat::{MircatConfig, MircatFactory};
use irpp_driver_mock::{MockQclConfig, MockQclFactory};
use irpp_hardware::{load_config, LinkRegistry};
use std::path::PathBuf;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/hardware_configuration.toml")
}

#[test]
fn shipped_config_loads() {
    let config = load_config(&shipped_config()).unwrap();
    let laser = &config.daylight_mircat;

    assert_eq!(laser.driver, "mock");
    assert_eq!(laser.qcls.len(), 2);
    assert_eq!(laser.qcl_for(1700.0), 1);
    assert_eq!(laser.qcl_for(2000.0), 2);
    assert!(laser.scan.ping_pong_fallback);
}

#[test]
fn shipped_config_passes_driver_validation() {
    let config = load_config(&shipped_config()).unwrap();
    let laser = &config.daylight_mircat;

    let mut registry = LinkRegistry::new();
    registry.register_factory(Box::new(MockQclFactory));
    registry.register_factory(Box::new(MircatFactory));
    registry.validate(laser).unwrap();

    let mock = MockQclConfig::from_toml(laser.mock.as_ref().unwrap()).unwrap();
    assert!(!mock.honor_bidirectional);

    let sdk = MircatConfig::from_toml(laser.sdk.as_ref().unwrap()).unwrap();
    assert!(!sdk.native_bidirectional);
}
