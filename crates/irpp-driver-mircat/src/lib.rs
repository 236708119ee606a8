//! Daylight MIRcat link backed by the vendor SDK.
//!
//! The SDK library is loaded at runtime, so the crate builds and the rest of
//! the service runs on machines without it. Select it with:
//!
//! ```toml
//! [daylight_mircat]
//! driver = "mircat_sdk"
//!
//! [daylight_mircat.sdk]
//! sdk_path = "C:/Program Files/Daylight Solutions/MIRcatSDK"
//! native_bidirectional = false
//! ```

pub mod mircat;
pub mod sdk;

pub use mircat::{MircatConfig, MircatFactory, MircatLink};
pub use sdk::{MircatSdk, SdkFailure, SdkLoadError};

pub(crate) const DRIVER_TYPE: &str = "mircat_sdk";
