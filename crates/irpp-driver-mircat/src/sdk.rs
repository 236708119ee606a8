//! MIRcat SDK function table.
//!
//! The vendor ships the SDK as a shared library (`MIRcatSDK.dll` on Windows).
//! It is opened once with `libloading`, every entry point used by the link is
//! resolved up front, and the [`Library`] is kept alive next to the function
//! pointers so they never dangle.
//!
//! Every SDK call returns a `u32` status code; zero is success. Wavenumbers
//! are passed as `f32` together with a units selector, always cm⁻¹ here.

#![allow(unsafe_code)]

use irpp_core::error::{DriverError, DriverErrorKind};
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// Return codes
// =============================================================================

/// `MIRcatSDK_RET_*` status code.
pub type RetCode = u32;

/// Call succeeded.
pub const RET_SUCCESS: RetCode = 0;
/// No usable USB or serial transport.
pub const RET_UNSUPPORTED_TRANSPORT: RetCode = 1;
/// Session could not be opened.
pub const RET_INITIALIZATION_FAILURE: RetCode = 32;
/// Arm or disarm rejected.
pub const RET_ARMDISARM_FAILURE: RetCode = 64;
/// Tune rejected.
pub const RET_STARTTUNE_FAILURE: RetCode = 65;
/// Interlock open or key switch off.
pub const RET_INTERLOCK_KEYSWITCH_FAILURE: RetCode = 66;
/// Scan start rejected.
pub const RET_STARTSCAN_FAILURE: RetCode = 67;
/// Scan stop rejected.
pub const RET_STOPSCAN_FAILURE: RetCode = 68;
/// No laser head answered.
pub const RET_LASER_NOT_CONNECTED: RetCode = 128;

/// `MIRcatSDK_UNITS_CM1`
pub const UNITS_CM1: u8 = 2;

/// Label for a known status code.
pub fn code_name(code: RetCode) -> &'static str {
    match code {
        RET_SUCCESS => "success",
        RET_UNSUPPORTED_TRANSPORT => "unsupported transport",
        RET_INITIALIZATION_FAILURE => "initialization failure",
        RET_ARMDISARM_FAILURE => "arm/disarm failure",
        RET_STARTTUNE_FAILURE => "start tune failure",
        RET_INTERLOCK_KEYSWITCH_FAILURE => "interlock or key switch failure",
        RET_STARTSCAN_FAILURE => "start scan failure",
        RET_STOPSCAN_FAILURE => "stop scan failure",
        RET_LASER_NOT_CONNECTED => "laser not connected",
        _ => "unknown",
    }
}

/// A non-zero status code returned by an SDK call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdkFailure {
    /// Exported function that failed.
    pub call: &'static str,
    /// Returned status.
    pub code: RetCode,
}

impl std::fmt::Display for SdkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} returned {} ({})", self.call, self.code, code_name(self.code))
    }
}

impl std::error::Error for SdkFailure {}

impl SdkFailure {
    /// Driver error category for this code.
    pub fn kind(&self) -> DriverErrorKind {
        match self.code {
            RET_UNSUPPORTED_TRANSPORT | RET_LASER_NOT_CONNECTED => DriverErrorKind::Communication,
            RET_INITIALIZATION_FAILURE => DriverErrorKind::Initialization,
            _ => DriverErrorKind::Sdk,
        }
    }
}

impl From<SdkFailure> for DriverError {
    fn from(failure: SdkFailure) -> Self {
        DriverError::new(crate::DRIVER_TYPE, failure.kind(), failure.to_string())
    }
}

fn check(call: &'static str, code: RetCode) -> Result<(), SdkFailure> {
    if code == RET_SUCCESS {
        Ok(())
    } else {
        Err(SdkFailure { call, code })
    }
}

/// Failure to open the library or resolve a symbol.
#[derive(Debug, Error)]
pub enum SdkLoadError {
    /// The library could not be opened.
    #[error("failed to load MIRcat SDK from '{path}': {cause}")]
    LoadFailed {
        /// Library file that was tried.
        path: String,
        /// Loader message.
        cause: String,
    },

    /// The library lacks an expected export.
    #[error("MIRcat SDK symbol '{symbol}' not found: {cause}")]
    SymbolNotFound {
        /// Exported function name.
        symbol: &'static str,
        /// Loader message.
        cause: String,
    },
}

impl From<SdkLoadError> for DriverError {
    fn from(err: SdkLoadError) -> Self {
        DriverError::new(
            crate::DRIVER_TYPE,
            DriverErrorKind::Initialization,
            err.to_string(),
        )
    }
}

// =============================================================================
// Function signatures
// =============================================================================

type FnVoid = unsafe extern "system" fn() -> RetCode;
type FnGetBool = unsafe extern "system" fn(*mut bool) -> RetCode;
/// wavenumber, units, qcl
type FnTune = unsafe extern "system" fn(f32, u8, u8) -> RetCode;
type FnSetMode = unsafe extern "system" fn(u8) -> RetCode;
/// qcl, rate (Hz), width (ns)
type FnSetPulse = unsafe extern "system" fn(u8, f32, f32) -> RetCode;
type FnGetTemps = unsafe extern "system" fn(*mut f32, *mut f32, *mut f32) -> RetCode;
/// start, stop, speed, units, scans, bidirectional, qcl
type FnSweep = unsafe extern "system" fn(f32, f32, f32, u8, u16, bool, u8) -> RetCode;
/// start, stop, step, units, dwell (ms), off (ms), scans, bidirectional, qcl
type FnStep = unsafe extern "system" fn(f32, f32, f32, u8, u32, u32, u16, bool, u8) -> RetCode;
/// start, stop, step, units, scans, bidirectional, qcl
type FnManual = unsafe extern "system" fn(f32, f32, f32, u8, u16, bool, u8) -> RetCode;
type FnSetCount = unsafe extern "system" fn(u8) -> RetCode;
/// wavenumber, units, dwell (ms), off (ms)
type FnAddElement = unsafe extern "system" fn(f32, u8, u32, u32) -> RetCode;
type FnStartMulti = unsafe extern "system" fn(u16) -> RetCode;
/// in progress, active, paused, scan number, percent, wavenumber, units, TEC busy, motion busy
type FnScanStatus = unsafe extern "system" fn(
    *mut bool,
    *mut bool,
    *mut bool,
    *mut u16,
    *mut u16,
    *mut f32,
    *mut u8,
    *mut bool,
    *mut bool,
) -> RetCode;

/// Firmware-reported scan state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawScanStatus {
    /// A scan is running.
    pub in_progress: bool,
    /// The laser is moving or emitting for the scan.
    pub active: bool,
    /// Scan paused by the firmware.
    pub paused: bool,
    /// Current pass.
    pub scan_number: u16,
    /// 0-100.
    pub percent: u16,
    /// Current position, cm⁻¹.
    pub wavenumber: f32,
}

// =============================================================================
// MircatSdk
// =============================================================================

/// Loaded SDK with every entry point resolved.
///
/// Calls block; callers run them on the blocking pool and serialize them.
pub struct MircatSdk {
    _library: Library,
    path: PathBuf,

    initialize: FnVoid,
    deinitialize: FnVoid,
    arm_laser: FnVoid,
    disarm_laser: FnVoid,
    turn_emission_on: FnVoid,
    turn_emission_off: FnVoid,
    stop_scan: FnVoid,
    next_manual_step: FnVoid,

    is_laser_armed: FnGetBool,
    is_tuned: FnGetBool,
    is_emission_on: FnGetBool,
    is_interlock_set: FnGetBool,
    is_key_switch_set: FnGetBool,
    are_tecs_at_temperature: FnGetBool,
    is_system_error: FnGetBool,
    is_pointing_compensated: FnGetBool,

    tune_to_ww: FnTune,
    set_laser_mode: FnSetMode,
    set_pulse_params: FnSetPulse,
    get_temperatures: FnGetTemps,
    start_sweep: FnSweep,
    start_step: FnStep,
    start_manual_step: FnManual,
    set_multispectral_count: FnSetCount,
    add_multispectral_element: FnAddElement,
    start_multispectral: FnStartMulti,
    get_scan_status: FnScanStatus,
}

fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, SdkLoadError> {
    tracing::trace!(symbol, "resolving MIRcat SDK symbol");
    // SAFETY: the type `T` at each call site matches the signature the SDK
    // header declares for `symbol`.
    unsafe {
        let sym: Symbol<T> =
            library
                .get(symbol.as_bytes())
                .map_err(|e| SdkLoadError::SymbolNotFound {
                    symbol,
                    cause: e.to_string(),
                })?;
        Ok(*sym)
    }
}

impl MircatSdk {
    /// Open the SDK library at `path` and resolve the function table.
    pub fn load(path: &Path) -> Result<Self, SdkLoadError> {
        let path_str = path.display().to_string();

        // SAFETY: loading the vendor library runs its initializers; the
        // configured path is trusted operator input.
        let library = unsafe { Library::new(path) }.map_err(|e| SdkLoadError::LoadFailed {
            path: path_str.clone(),
            cause: e.to_string(),
        })?;
        tracing::info!("loaded MIRcat SDK from '{path_str}'");

        Ok(Self {
            initialize: resolve(&library, "MIRcatSDK_Initialize")?,
            deinitialize: resolve(&library, "MIRcatSDK_DeInitialize")?,
            arm_laser: resolve(&library, "MIRcatSDK_ArmLaser")?,
            disarm_laser: resolve(&library, "MIRcatSDK_DisarmLaser")?,
            turn_emission_on: resolve(&library, "MIRcatSDK_TurnEmissionOn")?,
            turn_emission_off: resolve(&library, "MIRcatSDK_TurnEmissionOff")?,
            stop_scan: resolve(&library, "MIRcatSDK_StopScanInProgress")?,
            next_manual_step: resolve(&library, "MIRcatSDK_NextManualStep")?,
            is_laser_armed: resolve(&library, "MIRcatSDK_IsLaserArmed")?,
            is_tuned: resolve(&library, "MIRcatSDK_IsTuned")?,
            is_emission_on: resolve(&library, "MIRcatSDK_IsEmissionOn")?,
            is_interlock_set: resolve(&library, "MIRcatSDK_IsInterlockedStatusSet")?,
            is_key_switch_set: resolve(&library, "MIRcatSDK_IsKeySwitchStatusSet")?,
            are_tecs_at_temperature: resolve(&library, "MIRcatSDK_AreTECsAtSetTemperature")?,
            is_system_error: resolve(&library, "MIRcatSDK_IsSystemError")?,
            is_pointing_compensated: resolve(&library, "MIRcatSDK_IsPointingCompensationOn")?,
            tune_to_ww: resolve(&library, "MIRcatSDK_TuneToWW")?,
            set_laser_mode: resolve(&library, "MIRcatSDK_SetLaserMode")?,
            set_pulse_params: resolve(&library, "MIRcatSDK_SetQCLPulseParams")?,
            get_temperatures: resolve(&library, "MIRcatSDK_GetTemperatures")?,
            start_sweep: resolve(&library, "MIRcatSDK_StartSweepScan")?,
            start_step: resolve(&library, "MIRcatSDK_StartStepScanMode")?,
            start_manual_step: resolve(&library, "MIRcatSDK_StartManualStepScanMode")?,
            set_multispectral_count: resolve(&library, "MIRcatSDK_SetNumMultiSpectralElements")?,
            add_multispectral_element: resolve(&library, "MIRcatSDK_AddMultiSpectralElement")?,
            start_multispectral: resolve(&library, "MIRcatSDK_StartMultiSpectralMode")?,
            get_scan_status: resolve(&library, "MIRcatSDK_GetScanStatus")?,
            _library: library,
            path: path.to_path_buf(),
        })
    }

    /// Library file this handle was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call(&self, name: &'static str, f: FnVoid) -> Result<(), SdkFailure> {
        // SAFETY: resolved from the loaded library, which outlives `self`.
        check(name, unsafe { f() })
    }

    fn flag(&self, name: &'static str, f: FnGetBool) -> Result<bool, SdkFailure> {
        let mut value = false;
        // SAFETY: `value` is a valid out pointer for the duration of the call.
        check(name, unsafe { f(&mut value) })?;
        Ok(value)
    }

    // ===== Session =====

    /// `MIRcatSDK_Initialize`
    pub fn initialize(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_Initialize", self.initialize)
    }

    /// `MIRcatSDK_DeInitialize`
    pub fn deinitialize(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_DeInitialize", self.deinitialize)
    }

    // ===== Commands =====

    /// `MIRcatSDK_ArmLaser`
    pub fn arm(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_ArmLaser", self.arm_laser)
    }

    /// `MIRcatSDK_DisarmLaser`
    pub fn disarm(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_DisarmLaser", self.disarm_laser)
    }

    /// `MIRcatSDK_TurnEmissionOn`
    pub fn emission_on(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_TurnEmissionOn", self.turn_emission_on)
    }

    /// `MIRcatSDK_TurnEmissionOff`
    pub fn emission_off(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_TurnEmissionOff", self.turn_emission_off)
    }

    /// `MIRcatSDK_StopScanInProgress`
    pub fn stop_scan(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_StopScanInProgress", self.stop_scan)
    }

    /// `MIRcatSDK_NextManualStep`
    pub fn next_manual_step(&self) -> Result<(), SdkFailure> {
        self.call("MIRcatSDK_NextManualStep", self.next_manual_step)
    }

    /// `MIRcatSDK_TuneToWW` in cm⁻¹.
    pub fn tune(&self, wavenumber: f32, qcl: u8) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_TuneToWW", unsafe {
            (self.tune_to_ww)(wavenumber, UNITS_CM1, qcl)
        })
    }

    /// `MIRcatSDK_SetLaserMode`
    pub fn set_laser_mode(&self, mode: u8) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_SetLaserMode", unsafe { (self.set_laser_mode)(mode) })
    }

    /// `MIRcatSDK_SetQCLPulseParams`
    pub fn set_pulse_params(&self, qcl: u8, rate_hz: f32, width_ns: f32) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_SetQCLPulseParams", unsafe {
            (self.set_pulse_params)(qcl, rate_hz, width_ns)
        })
    }

    /// `MIRcatSDK_StartSweepScan` in cm⁻¹.
    #[allow(clippy::too_many_arguments)]
    pub fn start_sweep(
        &self,
        start: f32,
        stop: f32,
        speed: f32,
        num_scans: u16,
        bidirectional: bool,
        qcl: u8,
    ) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_StartSweepScan", unsafe {
            (self.start_sweep)(start, stop, speed, UNITS_CM1, num_scans, bidirectional, qcl)
        })
    }

    /// `MIRcatSDK_StartStepScanMode` in cm⁻¹.
    #[allow(clippy::too_many_arguments)]
    pub fn start_step(
        &self,
        start: f32,
        stop: f32,
        step: f32,
        dwell_ms: u32,
        off_ms: u32,
        num_scans: u16,
        bidirectional: bool,
        qcl: u8,
    ) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_StartStepScanMode", unsafe {
            (self.start_step)(
                start,
                stop,
                step,
                UNITS_CM1,
                dwell_ms,
                off_ms,
                num_scans,
                bidirectional,
                qcl,
            )
        })
    }

    /// `MIRcatSDK_StartManualStepScanMode` in cm⁻¹.
    pub fn start_manual_step(
        &self,
        start: f32,
        stop: f32,
        step: f32,
        num_scans: u16,
        bidirectional: bool,
        qcl: u8,
    ) -> Result<(), SdkFailure> {
        // SAFETY: plain value arguments.
        check("MIRcatSDK_StartManualStepScanMode", unsafe {
            (self.start_manual_step)(start, stop, step, UNITS_CM1, num_scans, bidirectional, qcl)
        })
    }

    /// Load the element table and start a multispectral scan.
    pub fn start_multispectral(
        &self,
        elements: &[(f32, u32, u32)],
        num_scans: u16,
    ) -> Result<(), SdkFailure> {
        let count = u8::try_from(elements.len()).map_err(|_| SdkFailure {
            call: "MIRcatSDK_SetNumMultiSpectralElements",
            code: RET_STARTSCAN_FAILURE,
        })?;
        // SAFETY: plain value arguments.
        check("MIRcatSDK_SetNumMultiSpectralElements", unsafe {
            (self.set_multispectral_count)(count)
        })?;
        for &(wavenumber, dwell_ms, off_ms) in elements {
            // SAFETY: plain value arguments.
            check("MIRcatSDK_AddMultiSpectralElement", unsafe {
                (self.add_multispectral_element)(wavenumber, UNITS_CM1, dwell_ms, off_ms)
            })?;
        }
        // SAFETY: plain value arguments.
        check("MIRcatSDK_StartMultiSpectralMode", unsafe {
            (self.start_multispectral)(num_scans)
        })
    }

    // ===== Queries =====

    /// `MIRcatSDK_IsLaserArmed`
    pub fn is_armed(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsLaserArmed", self.is_laser_armed)
    }

    /// `MIRcatSDK_IsTuned`
    pub fn is_tuned(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsTuned", self.is_tuned)
    }

    /// `MIRcatSDK_IsEmissionOn`
    pub fn is_emitting(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsEmissionOn", self.is_emission_on)
    }

    /// `MIRcatSDK_IsInterlockedStatusSet`
    pub fn is_interlocked(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsInterlockedStatusSet", self.is_interlock_set)
    }

    /// `MIRcatSDK_IsKeySwitchStatusSet`
    pub fn is_key_switch_on(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsKeySwitchStatusSet", self.is_key_switch_set)
    }

    /// `MIRcatSDK_AreTECsAtSetTemperature`
    pub fn is_temperature_stable(&self) -> Result<bool, SdkFailure> {
        self.flag(
            "MIRcatSDK_AreTECsAtSetTemperature",
            self.are_tecs_at_temperature,
        )
    }

    /// `MIRcatSDK_IsSystemError`
    pub fn is_system_fault(&self) -> Result<bool, SdkFailure> {
        self.flag("MIRcatSDK_IsSystemError", self.is_system_error)
    }

    /// `MIRcatSDK_IsPointingCompensationOn`
    pub fn is_pointing_compensated(&self) -> Result<bool, SdkFailure> {
        self.flag(
            "MIRcatSDK_IsPointingCompensationOn",
            self.is_pointing_compensated,
        )
    }

    /// Case sensor 1, case sensor 2, PCB, in °C.
    pub fn temperatures(&self) -> Result<(f32, f32, f32), SdkFailure> {
        let (mut case_1, mut case_2, mut pcb) = (0.0f32, 0.0f32, 0.0f32);
        // SAFETY: all three are valid out pointers for the duration of the call.
        check("MIRcatSDK_GetTemperatures", unsafe {
            (self.get_temperatures)(&mut case_1, &mut case_2, &mut pcb)
        })?;
        Ok((case_1, case_2, pcb))
    }

    /// `MIRcatSDK_GetScanStatus`
    pub fn scan_status(&self) -> Result<RawScanStatus, SdkFailure> {
        let mut status = RawScanStatus::default();
        let mut units = 0u8;
        let mut tec_busy = false;
        let mut motion_busy = false;
        // SAFETY: every pointer refers to a live local for the duration of the call.
        check("MIRcatSDK_GetScanStatus", unsafe {
            (self.get_scan_status)(
                &mut status.in_progress,
                &mut status.active,
                &mut status.paused,
                &mut status.scan_number,
                &mut status.percent,
                &mut status.wavenumber,
                &mut units,
                &mut tec_busy,
                &mut motion_busy,
            )
        })?;
        tracing::trace!(units, tec_busy, motion_busy, "MIRcat scan status");
        Ok(status)
    }
}

impl std::fmt::Debug for MircatSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MircatSdk")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code_passes() {
        assert!(check("MIRcatSDK_ArmLaser", RET_SUCCESS).is_ok());
    }

    #[test]
    fn test_failure_code_maps_to_driver_error_kind() {
        let failure = check("MIRcatSDK_ArmLaser", RET_ARMDISARM_FAILURE).unwrap_err();
        assert_eq!(failure.kind(), DriverErrorKind::Sdk);
        assert_eq!(
            failure.to_string(),
            "MIRcatSDK_ArmLaser returned 64 (arm/disarm failure)"
        );

        let err: DriverError = failure.into();
        assert_eq!(err.kind, DriverErrorKind::Sdk);
        assert_eq!(err.driver_type, "mircat_sdk");
    }

    #[test]
    fn test_transport_codes_are_communication_errors() {
        for code in [RET_UNSUPPORTED_TRANSPORT, RET_LASER_NOT_CONNECTED] {
            let failure = SdkFailure {
                call: "MIRcatSDK_IsLaserArmed",
                code,
            };
            assert_eq!(failure.kind(), DriverErrorKind::Communication);
        }
        let init = SdkFailure {
            call: "MIRcatSDK_Initialize",
            code: RET_INITIALIZATION_FAILURE,
        };
        assert_eq!(init.kind(), DriverErrorKind::Initialization);
    }

    #[test]
    fn test_unknown_code_is_sdk_error() {
        let failure = SdkFailure {
            call: "MIRcatSDK_TuneToWW",
            code: 9999,
        };
        assert_eq!(failure.kind(), DriverErrorKind::Sdk);
        assert!(failure.to_string().contains("unknown"));
    }

    #[test]
    fn test_missing_library_is_load_error() {
        let err = MircatSdk::load(Path::new("/nonexistent/MIRcatSDK.dll")).unwrap_err();
        assert!(matches!(err, SdkLoadError::LoadFailed { .. }));

        let driver: DriverError = err.into();
        assert_eq!(driver.kind, DriverErrorKind::Initialization);
        assert!(driver.message.contains("/nonexistent/MIRcatSDK.dll"));
    }
}
