//! Core types for the IR pump-probe laser control service.
//!
//! - [`error`]: error taxonomy, driver errors and the [`ErrorRecord`](error::ErrorRecord)
//! - [`capabilities`]: the [`HardwareLink`](capabilities::HardwareLink) trait every laser driver implements
//! - [`driver`]: [`LinkFactory`](driver::LinkFactory) for startup driver selection
//! - [`session`], [`status`], [`scan`]: controller state and snapshots
//! - [`polling`]: bounded polling waiter
//! - [`limits`]: shared timeouts

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod limits;
pub mod polling;
pub mod scan;
pub mod session;
pub mod status;

pub use capabilities::{HardwareLink, ScanProgress, Temperatures};
pub use error::{DriverError, DriverErrorKind, ErrorCode, ErrorRecord, LaserError, LaserResult};
pub use session::{DeviceSession, LaserMode, ScanMode};
pub use status::HardwareStatus;
