//! Cached device session state.
//!
//! [`DeviceSession`] is the controller's view of the laser. Flags only move
//! to `true` after a hardware acknowledgement; they move to `false` on every
//! "turn off" path, whether or not the hardware call succeeded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which kind of scan, if any, the controller believes is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// No scan.
    #[default]
    None,
    /// Continuous sweep, native or ping-pong.
    Sweep,
    /// Step and dwell.
    Step,
    /// Discrete target list.
    Multispectral,
    /// Steps advanced by the caller.
    ManualStep,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScanMode::None => "none",
            ScanMode::Sweep => "sweep",
            ScanMode::Step => "step",
            ScanMode::Multispectral => "multispectral",
            ScanMode::ManualStep => "manual_step",
        };
        f.write_str(label)
    }
}

/// Laser operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaserMode {
    /// Pulsed operation with configurable rate and width.
    #[default]
    #[serde(rename = "Pulsed")]
    Pulsed,
    /// Continuous wave.
    #[serde(rename = "CW")]
    Cw,
    /// Continuous wave with external modulation.
    #[serde(rename = "CW + Modulation")]
    CwModulation,
}

impl LaserMode {
    /// Every mode, in display order.
    pub const ALL: [LaserMode; 3] = [LaserMode::Pulsed, LaserMode::Cw, LaserMode::CwModulation];

    /// Label used on the wire and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaserMode::Pulsed => "Pulsed",
            LaserMode::Cw => "CW",
            LaserMode::CwModulation => "CW + Modulation",
        }
    }
}

impl fmt::Display for LaserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaserMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LaserMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown laser mode '{}'", s))
    }
}

/// Pulse settings last acknowledged by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseParameters {
    /// Pulse repetition rate.
    pub rate_hz: u32,
    /// Pulse width.
    pub width_ns: u32,
}

/// Controller-side state for one laser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSession {
    /// An SDK session is open.
    pub connected: bool,
    /// Arm was confirmed by the hardware.
    pub armed: bool,
    /// Emission was confirmed by the hardware.
    pub emission_on: bool,
    /// The last tune was confirmed.
    pub tuned: bool,
    /// TECs settled after arming.
    pub temperature_stable: bool,
    /// A scan was started and has not finished.
    pub scan_in_progress: bool,
    /// Kind of the running scan.
    pub current_scan_mode: ScanMode,
    /// Last confirmed tune target, cm⁻¹.
    pub current_wavenumber: Option<f64>,
    /// Chip used for the last tune.
    pub current_qcl: Option<u8>,
    /// Last acknowledged operating mode.
    pub laser_mode: LaserMode,
    /// Last acknowledged pulse settings.
    pub pulse: Option<PulseParameters>,
}

impl DeviceSession {
    /// Back to the state at process start.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// No scan running.
    pub fn clear_scan(&mut self) {
        self.scan_in_progress = false;
        self.current_scan_mode = ScanMode::None;
    }

    /// Disarming also ends emission and any scan.
    pub fn clear_arm(&mut self) {
        self.armed = false;
        self.emission_on = false;
        self.clear_scan();
    }

    /// `emission_on` implies `armed` and `tuned`.
    pub fn is_consistent(&self) -> bool {
        !self.emission_on || (self.armed && self.tuned)
    }
}
