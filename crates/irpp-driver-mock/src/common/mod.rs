//! Shared infrastructure for simulated hardware.
//!
//! - **errors**: error injection framework
//! - **rng**: seeded random number generator

pub mod errors;
pub mod rng;

pub use errors::{ErrorConfig, ErrorScenario};
pub use rng::MockRng;
