//! Link factory trait.
//!
//! Every link implementation ships a [`LinkFactory`]. The composition root
//! registers the factories it was compiled with, and the hardware registry
//! picks one by the `driver` key of the laser configuration. Selection
//! happens once at startup; afterwards the controller only sees
//! `Arc<dyn HardwareLink>`.
//!
//! ```rust,ignore
//! use irpp_core::driver::LinkFactory;
//! use futures::future::BoxFuture;
//!
//! pub struct SimulatedQclFactory;
//!
//! impl LinkFactory for SimulatedQclFactory {
//!     fn driver_type(&self) -> &'static str { "mock" }
//!     fn name(&self) -> &'static str { "Simulated MIRcat QCL" }
//!
//!     fn validate(&self, config: &toml::Value) -> anyhow::Result<()> {
//!         MockQclConfig::from_toml(config).map(|_| ())
//!     }
//!
//!     fn build(&self, config: toml::Value) -> BoxFuture<'static, anyhow::Result<Arc<dyn HardwareLink>>> {
//!         Box::pin(async move {
//!             let cfg = MockQclConfig::from_toml(&config)?;
//!             Ok(Arc::new(SimulatedQcl::new(cfg)) as Arc<dyn HardwareLink>)
//!         })
//!     }
//! }
//! ```

use crate::capabilities::HardwareLink;
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Builds a [`HardwareLink`] from its driver-specific TOML table.
pub trait LinkFactory: Send + Sync + 'static {
    /// Value of the `driver` key that selects this factory.
    fn driver_type(&self) -> &'static str;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Check the driver table without touching hardware.
    ///
    /// The default accepts anything; drivers with required fields override it.
    fn validate(&self, _config: &toml::Value) -> Result<()> {
        Ok(())
    }

    /// Construct the link. The returned link is not yet initialized;
    /// `HardwareLink::initialize` runs on `connect`.
    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<Arc<dyn HardwareLink>>>;
}
