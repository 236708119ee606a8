//! Hardware capability interface for tunable QCL lasers.
//!
//! The controller never talks to a vendor SDK directly. It drives a
//! [`HardwareLink`], and exactly one implementation per SDK exists
//! (`irpp-driver-mircat` for the MIRcat DLL, `irpp-driver-mock` for the
//! simulator). The implementation is chosen once at startup through a
//! [`LinkFactory`](crate::driver::LinkFactory).
//!
//! # Contract
//!
//! - Commands (`arm`, `tune_to`, `emission_on`, scan starts) only *request*
//!   a transition. The controller confirms it by polling the matching query
//!   (`is_armed`, `is_tuned`, `is_emitting`, `scan_status`).
//! - Queries always hit the hardware. Implementations must not cache.
//! - Implementations serialise their own hardware calls. The controller may
//!   call a query from a background task while no command is in flight.
//! - Repeat counts arrive already translated to the SDK field width (see
//!   [`sdk_repeat_count`](crate::scan::sdk_repeat_count)).

use crate::error::DriverResult;
use crate::scan::{ManualStepParams, MultispectralParams, StepParams, SweepParams};
use crate::session::LaserMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Temperature readout in degrees Celsius.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    /// First case thermistor.
    pub case_temp_1: f64,
    /// Second case thermistor.
    pub case_temp_2: f64,
    /// Controller board.
    pub pcb_temperature: f64,
}

/// Scan status as reported by the hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// A scan has been started and not yet finished or stopped.
    pub in_progress: bool,
    /// The laser is currently moving or emitting as part of the scan.
    pub active: bool,
    /// Firmware reports the bidirectional flag for the running scan.
    pub bidirectional: bool,
    /// 1-based pass number of the running scan.
    pub current_scan_number: u16,
    /// 0-100.
    pub percent_complete: u16,
    /// cm⁻¹.
    pub current_wavenumber: f64,
}

/// Capability: vendor SDK session for one QCL laser head.
#[async_trait]
pub trait HardwareLink: Send + Sync {
    /// Driver identifier, e.g. `"mircat_sdk"`. Used in error messages.
    fn driver_type(&self) -> &str;

    // ===== Session =====

    /// Open the SDK session. Fails if the device does not answer.
    async fn initialize(&self) -> DriverResult<()>;

    /// Release the SDK session.
    async fn deinitialize(&self) -> DriverResult<()>;

    // ===== Commands =====

    /// Request arming. Confirm with [`is_armed`](Self::is_armed).
    async fn arm(&self) -> DriverResult<()>;
    /// Request disarming. Also ends emission on the device.
    async fn disarm(&self) -> DriverResult<()>;

    /// Request tuning to `wavenumber` (cm⁻¹) on QCL chip `qcl` (1-based).
    async fn tune_to(&self, wavenumber: f64, qcl: u8) -> DriverResult<()>;

    /// Request emission. Confirm with [`is_emitting`](Self::is_emitting).
    async fn emission_on(&self) -> DriverResult<()>;
    /// Stop emission.
    async fn emission_off(&self) -> DriverResult<()>;

    /// Select pulsed, CW or CW-modulation operation.
    async fn set_laser_mode(&self, mode: LaserMode) -> DriverResult<()>;

    /// Pulse rate in Hz and pulse width in ns. Only meaningful in pulsed mode.
    async fn set_pulse_parameters(&self, rate_hz: u32, width_ns: u32) -> DriverResult<()>;

    // ===== Queries =====

    /// `true` once the arm request has settled.
    async fn is_armed(&self) -> DriverResult<bool>;
    /// `true` once the last tune request has settled.
    async fn is_tuned(&self) -> DriverResult<bool>;
    /// `true` while the laser emits.
    async fn is_emitting(&self) -> DriverResult<bool>;
    /// `true` when the external interlock circuit is closed.
    async fn is_interlocked(&self) -> DriverResult<bool>;
    /// `true` when the front-panel key switch is on.
    async fn is_key_switch_on(&self) -> DriverResult<bool>;
    /// `true` when all TECs report being at their set temperature.
    async fn is_temperature_stable(&self) -> DriverResult<bool>;
    /// `true` while the head reports a system fault.
    async fn is_system_fault(&self) -> DriverResult<bool>;
    /// `true` when beam pointing correction is active.
    async fn is_pointing_compensated(&self) -> DriverResult<bool>;
    /// Current thermistor readings.
    async fn temperatures(&self) -> DriverResult<Temperatures>;

    // ===== Scans =====

    /// Start a continuous sweep.
    async fn start_sweep(&self, params: &SweepParams) -> DriverResult<()>;
    /// Start a step-and-dwell scan.
    async fn start_step(&self, params: &StepParams) -> DriverResult<()>;
    /// Start a multispectral scan over discrete targets.
    async fn start_multispectral(&self, params: &MultispectralParams) -> DriverResult<()>;
    /// Start a manual step scan. Steps are advanced by [`manual_step_next`](Self::manual_step_next).
    async fn start_manual_step(&self, params: &ManualStepParams) -> DriverResult<()>;

    /// Advance a running manual step scan by one step.
    async fn manual_step_next(&self) -> DriverResult<()>;

    /// Stop whatever scan is running. Succeeds when none is.
    async fn stop_scan(&self) -> DriverResult<()>;
    /// Progress of the current or last scan.
    async fn scan_status(&self) -> DriverResult<ScanProgress>;
}
