//! Simulated hardware for the laser control service.
//!
//! [`SimulatedQcl`] stands in for a MIRcat laser head. All timing uses the
//! tokio clock (`tokio::time::Instant`), so tests can run with paused time.
//!
//! # Behavior
//!
//! - Arm, tune and emission settle after configurable delays
//! - TECs report stable a fixed time after arming
//! - Interlock, key switch and system fault can be flipped at runtime
//! - Scans run for their analytic duration (`|end - start| / speed` per sweep pass)
//! - Firmware that ignores the bidirectional flag can be emulated
//! - Every command is logged; queries are counted
//! - Failures can be injected through [`ErrorConfig`]
//!
//! # Driver Factory
//!
//! ```rust,ignore
//! use irpp_driver_mock::MockQclFactory;
//! use irpp_hardware::LinkRegistry;
//!
//! let mut registry = LinkRegistry::new();
//! registry.register_factory(Box::new(MockQclFactory));
//! ```

pub mod common;
pub mod simulated_qcl;

pub use common::{ErrorConfig, ErrorScenario, MockRng};
pub use simulated_qcl::{LinkCommand, MockQclConfig, MockQclFactory, SimulatedQcl};
