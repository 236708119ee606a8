//! Request and response bodies.
//!
//! Scan requests are taken straight from `irpp_core::scan`; everything else
//! is defined here.

use irpp_core::session::{LaserMode, ScanMode};
use irpp_hardware::StatusReport;
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /api/daylight_mircat/tune`.
#[derive(Debug, Clone, Deserialize)]
pub struct TuneRequest {
    /// Target in cm⁻¹.
    pub wavenumber: f64,
}

/// Mode is accepted as its display name (`"Pulsed"`, `"CW"`,
/// `"CW + Modulation"`), case-insensitively.
#[derive(Debug, Clone, Deserialize)]
pub struct LaserModeRequest {
    /// Display name of the mode.
    pub mode: String,
}

/// Body of `POST /api/daylight_mircat/pulse-parameters`.
#[derive(Debug, Clone, Deserialize)]
pub struct PulseParametersRequest {
    /// Hz.
    pub pulse_rate: u32,
    /// ns.
    pub pulse_width: u32,
}

// ============================================================================
// Responses
// ============================================================================

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Always `true`; failures use the error body.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl MessageResponse {
    /// Successful acknowledgement with `message`.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Outcome of connect and disconnect.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Session state afterwards.
    pub connected: bool,
}

/// Outcome of arm and disarm.
#[derive(Debug, Clone, Serialize)]
pub struct ArmResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Arm state afterwards.
    pub armed: bool,
}

/// Outcome of emission on and off.
#[derive(Debug, Clone, Serialize)]
pub struct EmissionResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Emission state afterwards.
    pub emission_on: bool,
}

/// Outcome of a tune.
#[derive(Debug, Clone, Serialize)]
pub struct TuneResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Confirmed target in cm⁻¹.
    pub wavenumber: f64,
}

/// Outcome of a mode change.
#[derive(Debug, Clone, Serialize)]
pub struct ModeResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Mode now in effect.
    pub mode: LaserMode,
}

/// Outcome of a pulse parameter change.
#[derive(Debug, Clone, Serialize)]
pub struct PulseParametersResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Hz.
    pub pulse_rate: u32,
    /// ns.
    pub pulse_width: u32,
}

/// Outcome of a scan start or stop.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    /// Operation succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Scan kind now running, `none` after a stop.
    pub scan_mode: ScanMode,
    /// A scan is running.
    pub scan_in_progress: bool,
}

/// Full status report with the `success` flag alongside.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// The status refresh succeeded.
    pub success: bool,
    /// Report fields, flattened.
    #[serde(flatten)]
    pub report: StatusReport,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    /// Service banner.
    pub message: String,
    /// Always `"running"`.
    pub status: String,
}

impl Default for RootResponse {
    fn default() -> Self {
        Self {
            message: "IR Spectroscopy Control Interface API".to_string(),
            status: "running".to_string(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Human-readable status.
    pub message: String,
    /// Crate version.
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            message: "API is running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
