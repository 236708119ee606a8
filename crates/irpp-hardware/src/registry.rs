//! Link registry.
//!
//! The composition root registers every [`LinkFactory`] it was built with.
//! [`LinkRegistry::build`] then selects exactly one by the configured
//! `driver` key and returns the constructed link. There is no runtime
//! dispatch by name after that point.
//!
//! ```rust,ignore
//! let mut registry = LinkRegistry::new();
//! registry.register_factory(Box::new(MockQclFactory));
//! registry.register_factory(Box::new(MircatFactory));
//!
//! let link = registry.build(&config.daylight_mircat).await?;
//! ```

use crate::config::LaserConfig;
use anyhow::{anyhow, Context, Result};
use irpp_core::capabilities::HardwareLink;
use irpp_core::driver::LinkFactory;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Factories keyed by driver type.
#[derive(Default)]
pub struct LinkRegistry {
    factories: BTreeMap<&'static str, Box<dyn LinkFactory>>,
}

impl LinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration for the same driver type replaces the earlier one.
    pub fn register_factory(&mut self, factory: Box<dyn LinkFactory>) {
        self.factories.insert(factory.driver_type(), factory);
    }

    /// Registered driver types, sorted.
    pub fn driver_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    fn factory(&self, driver: &str) -> Result<&dyn LinkFactory> {
        self.factories
            .get(driver)
            .map(|f| &**f)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown laser driver '{}'. Available drivers: {}",
                    driver,
                    self.driver_types().join(", ")
                )
            })
    }

    /// Check the driver selection and its table without building anything.
    pub fn validate(&self, config: &LaserConfig) -> Result<()> {
        let factory = self.factory(&config.driver)?;
        factory
            .validate(&config.driver_table())
            .with_context(|| format!("Invalid configuration for driver '{}'", config.driver))
    }

    /// Select the configured factory and build the link.
    pub async fn build(&self, config: &LaserConfig) -> Result<Arc<dyn HardwareLink>> {
        self.validate(config)?;
        let factory = self.factory(&config.driver)?;
        let link = factory
            .build(config.driver_table())
            .await
            .with_context(|| format!("Failed to build driver '{}'", config.driver))?;
        info!(driver = factory.driver_type(), name = factory.name(), "Laser link selected");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irpp_driver_mock::MockQclFactory;

    #[tokio::test]
    async fn test_build_selects_configured_driver() {
        let mut registry = LinkRegistry::new();
        registry.register_factory(Box::new(MockQclFactory));

        let link = registry.build(&LaserConfig::default()).await.unwrap();
        assert_eq!(link.driver_type(), "mock");
    }

    #[tokio::test]
    async fn test_unknown_driver_lists_available() {
        let mut registry = LinkRegistry::new();
        registry.register_factory(Box::new(MockQclFactory));

        let config = LaserConfig {
            driver: "picoscope".to_string(),
            ..Default::default()
        };
        let err = registry.build(&config).await.err().unwrap();
        let message = err.to_string();
        assert!(message.contains("picoscope"));
        assert!(message.contains("mock"));
    }

    #[test]
    fn test_driver_table_is_validated() {
        let mut registry = LinkRegistry::new();
        registry.register_factory(Box::new(MockQclFactory));

        let config = LaserConfig {
            mock: Some(toml::from_str("failure_rate = 2.0").unwrap()),
            ..Default::default()
        };
        assert!(registry.validate(&config).is_err());
    }
}
