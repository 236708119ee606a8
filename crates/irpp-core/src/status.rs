//! Hardware status snapshot.
//!
//! A [`HardwareStatus`] is assembled from every getter of the link on each
//! request. Nothing in it is reused across requests.

use crate::capabilities::HardwareLink;
use crate::error::DriverResult;
use serde::{Deserialize, Serialize};

/// Flat snapshot of hardware readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareStatus {
    /// A session is open.
    pub connected: bool,
    /// Interlock circuit closed.
    pub interlocks: bool,
    /// Key switch on.
    pub key_switch: bool,
    /// TECs at set temperature.
    pub temperature: bool,
    /// Laser emitting.
    pub emission: bool,
    /// Laser armed.
    pub armed: bool,
    /// Last tune settled.
    pub tuned: bool,
    /// Beam pointing compensation active.
    pub pointing_correction: bool,
    /// Head reports a fault.
    pub system_fault: bool,
    /// °C.
    pub case_temp_1: f64,
    /// °C.
    pub case_temp_2: f64,
    /// °C.
    pub pcb_temperature: f64,
}

impl HardwareStatus {
    /// Snapshot reported while no session is open.
    ///
    /// `system_fault` is `true` so that a client never mistakes a missing
    /// session for a healthy laser.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            interlocks: false,
            key_switch: false,
            temperature: false,
            emission: false,
            armed: false,
            tuned: false,
            pointing_correction: false,
            system_fault: true,
            case_temp_1: 0.0,
            case_temp_2: 0.0,
            pcb_temperature: 0.0,
        }
    }

    /// Read every getter of `link`. The first failing getter aborts the read.
    pub async fn read(link: &dyn HardwareLink) -> DriverResult<Self> {
        let interlocks = link.is_interlocked().await?;
        let key_switch = link.is_key_switch_on().await?;
        let temperature = link.is_temperature_stable().await?;
        let emission = link.is_emitting().await?;
        let armed = link.is_armed().await?;
        let tuned = link.is_tuned().await?;
        let pointing_correction = link.is_pointing_compensated().await?;
        let system_fault = link.is_system_fault().await?;
        let temps = link.temperatures().await?;

        Ok(Self {
            connected: true,
            interlocks,
            key_switch,
            temperature,
            emission,
            armed,
            tuned,
            pointing_correction,
            system_fault,
            case_temp_1: temps.case_temp_1,
            case_temp_2: temps.case_temp_2,
            pcb_temperature: temps.pcb_temperature,
        })
    }
}

impl Default for HardwareStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}
