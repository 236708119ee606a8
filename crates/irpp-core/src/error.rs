//! Error types for the laser controller.
//!
//! Two layers of errors exist:
//!
//! - **`DriverError`**: raised by a [`HardwareLink`](crate::capabilities::HardwareLink)
//!   implementation. It carries the driver type and a coarse [`DriverErrorKind`]
//!   describing where the failure happened (SDK return code, serial I/O, ...).
//! - **`LaserError`**: raised by the controller. Each variant corresponds to
//!   exactly one hardware-facing [`ErrorCode`], which is what callers see.
//!
//! Precondition violations (`NotConnected`, `NotArmed`, `NotTuned`,
//! `InvalidParameter`) are produced locally before any hardware call. Timing
//! failures (`TuningTimeout`, `EmissionTimeout`, arming timeout reported as
//! `Hardware`) are only produced after the polling budget is exhausted.
//! Driver failures are converted with `From<DriverError>` and never retried.
//!
//! The most recent failure is kept in an [`ErrorRecord`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Codes
// =============================================================================

/// Hardware-facing error taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Operation requires an open hardware session.
    NotConnected,
    /// Operation requires the laser to be armed.
    NotArmed,
    /// Operation requires the laser to be tuned.
    NotTuned,
    /// TEC temperatures did not settle.
    TemperatureUnstable,
    /// Interlock or key switch is open.
    InterlockFault,
    /// The laser reports a system fault.
    SystemFault,
    /// A caller-supplied value was rejected.
    InvalidParameter,
    /// Tuning was not confirmed within the polling budget.
    TuningTimeout,
    /// Emission was not confirmed within the polling budget.
    EmissionTimeout,
    /// The vendor SDK returned a failure.
    SdkError,
    /// Transport to the device failed.
    CommunicationError,
    /// The device misbehaved (timeouts on arm, faults, unexpected state).
    HardwareError,
}

impl ErrorCode {
    /// Wire label, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::NotArmed => "NOT_ARMED",
            Self::NotTuned => "NOT_TUNED",
            Self::TemperatureUnstable => "TEMPERATURE_UNSTABLE",
            Self::InterlockFault => "INTERLOCK_FAULT",
            Self::SystemFault => "SYSTEM_FAULT",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::TuningTimeout => "TUNING_TIMEOUT",
            Self::EmissionTimeout => "EMISSION_TIMEOUT",
            Self::SdkError => "SDK_ERROR",
            Self::CommunicationError => "COMMUNICATION_ERROR",
            Self::HardwareError => "HARDWARE_ERROR",
        }
    }

    /// True for failures detected locally before any hardware call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::NotArmed | Self::NotTuned | Self::InvalidParameter
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Driver Errors
// =============================================================================

/// Where inside a driver a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Loading the SDK or opening the session.
    Initialization,
    /// The device stopped answering.
    Communication,
    /// The SDK returned a non-success code.
    Sdk,
    /// The device reported a fault.
    Hardware,
    /// A driver-side wait ran out.
    Timeout,
    /// The SDK rejected an argument.
    InvalidParameter,
    /// Anything not classified above.
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Sdk => "sdk",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured error returned by [`HardwareLink`](crate::capabilities::HardwareLink) calls.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that raised the error.
    pub driver_type: String,
    /// Failure category.
    pub kind: DriverErrorKind,
    /// Driver-supplied detail.
    pub message: String,
}

impl DriverError {
    /// Build an error for `driver_type`.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result alias for link-level calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

// =============================================================================
// Controller Errors
// =============================================================================

/// Error returned by controller operations.
///
/// Every variant maps onto one [`ErrorCode`] via [`LaserError::code`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaserError {
    /// No hardware session is open.
    #[error("Device not connected")]
    NotConnected,

    /// The operation named in the payload needs an armed laser.
    #[error("Laser must be armed before {0}")]
    NotArmed(&'static str),

    /// The operation named in the payload needs a tuned laser.
    #[error("Laser must be tuned before {0}")]
    NotTuned(&'static str),

    /// TECs did not settle after arming.
    #[error("Temperature did not stabilize within {0:?}")]
    TemperatureUnstable(Duration),

    /// Interlock open or key switch off.
    #[error("Interlock fault: {0}")]
    InterlockFault(String),

    /// Laser head fault flag is set.
    #[error("System fault reported by laser: {0}")]
    SystemFault(String),

    /// Rejected locally before any hardware call.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tuning was not confirmed within the poll budget.
    #[error("Tuning to {wavenumber} cm-1 not confirmed within {waited:?}")]
    TuningTimeout {
        /// Requested target in cm⁻¹.
        wavenumber: f64,
        /// Poll budget that ran out.
        waited: Duration,
    },

    /// Emission was not confirmed within the poll budget.
    #[error("Emission not confirmed within {0:?}")]
    EmissionTimeout(Duration),

    /// The SDK reported a failure.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The link to the device failed.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Any other hardware-side failure.
    #[error("Hardware error: {0}")]
    Hardware(String),
}

impl LaserError {
    /// Taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::NotConnected,
            Self::NotArmed(_) => ErrorCode::NotArmed,
            Self::NotTuned(_) => ErrorCode::NotTuned,
            Self::TemperatureUnstable(_) => ErrorCode::TemperatureUnstable,
            Self::InterlockFault(_) => ErrorCode::InterlockFault,
            Self::SystemFault(_) => ErrorCode::SystemFault,
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::TuningTimeout { .. } => ErrorCode::TuningTimeout,
            Self::EmissionTimeout(_) => ErrorCode::EmissionTimeout,
            Self::Sdk(_) => ErrorCode::SdkError,
            Self::Communication(_) => ErrorCode::CommunicationError,
            Self::Hardware(_) => ErrorCode::HardwareError,
        }
    }

    /// Shorthand for [`LaserError::InvalidParameter`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

impl From<DriverError> for LaserError {
    fn from(err: DriverError) -> Self {
        let message = err.to_string();
        match err.kind {
            DriverErrorKind::Communication => Self::Communication(message),
            DriverErrorKind::Sdk | DriverErrorKind::Initialization => Self::Sdk(message),
            DriverErrorKind::InvalidParameter => Self::InvalidParameter(message),
            DriverErrorKind::Hardware | DriverErrorKind::Timeout | DriverErrorKind::Unknown => {
                Self::Hardware(message)
            }
        }
    }
}

/// Convenience alias for controller results.
pub type LaserResult<T> = std::result::Result<T, LaserError>;

// =============================================================================
// Error Record
// =============================================================================

/// Most recent failure seen by a controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human-readable message.
    pub last_error: Option<String>,
    /// Code matching `last_error`.
    pub last_error_code: Option<ErrorCode>,
}

impl ErrorRecord {
    /// Overwrite the record with `err`.
    pub fn record(&mut self, err: &LaserError) {
        self.last_error = Some(err.to_string());
        self.last_error_code = Some(err.code());
    }

    /// Forget the last failure.
    pub fn clear(&mut self) {
        self.last_error = None;
        self.last_error_code = None;
    }

    /// `true` while a failure is recorded.
    pub fn is_set(&self) -> bool {
        self.last_error_code.is_some()
    }
}
