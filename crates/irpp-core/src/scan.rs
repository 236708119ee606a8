//! Scan requests, SDK-level scan parameters, and the active [`ScanJob`].
//!
//! Requests carry caller units: wavenumbers in cm⁻¹, speed in cm⁻¹/s, times
//! in milliseconds and a signed repeat count where `<= 0` means "run until
//! stopped". Before reaching a [`HardwareLink`](crate::capabilities::HardwareLink)
//! they are validated against the configured tuning range and converted into
//! `*Params`, where the repeat count has the SDK's field width.

use crate::capabilities::ScanProgress;
use crate::error::{LaserError, LaserResult};
use crate::limits::MIN_SWEEP_SPEED;
use crate::session::ScanMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Translate a caller repeat count to the SDK's 16-bit repeat field.
///
/// Zero or negative means "indefinitely", which the SDK expresses as the
/// largest representable count. Values above the field width saturate.
pub fn sdk_repeat_count(num_scans: i32) -> u16 {
    if num_scans <= 0 {
        return u16::MAX;
    }
    u16::try_from(num_scans).unwrap_or(u16::MAX)
}

fn default_num_scans() -> i32 {
    1
}

// =============================================================================
// Tuning range
// =============================================================================

/// Closed wavenumber interval in cm⁻¹.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavenumberRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl WavenumberRange {
    /// Range `[min, max]`.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN and infinities are never contained.
    pub fn contains(&self, wavenumber: f64) -> bool {
        wavenumber.is_finite() && wavenumber >= self.min && wavenumber <= self.max
    }

    /// `INVALID_PARAMETER` unless `wavenumber` lies inside the range.
    pub fn check(&self, what: &str, wavenumber: f64) -> LaserResult<()> {
        if self.contains(wavenumber) {
            Ok(())
        } else {
            Err(LaserError::invalid(format!(
                "{} {} cm-1 outside tuning range [{}, {}]",
                what, wavenumber, self.min, self.max
            )))
        }
    }
}

fn check_positive(what: &str, value: f64) -> LaserResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LaserError::invalid(format!("{} must be positive, got {}", what, value)))
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Continuous sweep between two wavenumbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRequest {
    /// First wavenumber, cm⁻¹.
    pub start_wavenumber: f64,
    /// Last wavenumber, cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹ per second.
    pub speed: f64,
    /// Repeat count; `<= 0` runs until stopped.
    #[serde(default = "default_num_scans")]
    pub num_scans: i32,
    /// Run alternate passes in reverse.
    #[serde(default)]
    pub bidirectional: bool,
}

impl SweepRequest {
    /// `INVALID_PARAMETER` unless the request fits `range`. Speeds below
    /// [`MIN_SWEEP_SPEED`] are rejected.
    pub fn validate(&self, range: &WavenumberRange) -> LaserResult<()> {
        range.check("start wavenumber", self.start_wavenumber)?;
        range.check("end wavenumber", self.end_wavenumber)?;
        if self.start_wavenumber == self.end_wavenumber {
            return Err(LaserError::invalid("sweep start and end must differ"));
        }
        check_positive("sweep speed", self.speed)?;
        if self.speed < MIN_SWEEP_SPEED {
            return Err(LaserError::invalid(format!(
                "sweep speed {} below minimum {} cm-1/s",
                self.speed, MIN_SWEEP_SPEED
            )));
        }
        Ok(())
    }

    /// SDK parameters for chip `qcl`.
    pub fn to_params(&self, qcl: u8) -> SweepParams {
        SweepParams {
            start_wavenumber: self.start_wavenumber,
            end_wavenumber: self.end_wavenumber,
            speed: self.speed,
            num_scans: sdk_repeat_count(self.num_scans),
            bidirectional: self.bidirectional,
            qcl,
        }
    }

    /// Analytic duration of one start→end pass, in seconds.
    pub fn segment_seconds(&self) -> f64 {
        (self.end_wavenumber - self.start_wavenumber).abs() / self.speed
    }
}

/// Step-and-dwell scan across a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRequest {
    /// First wavenumber, cm⁻¹.
    pub start_wavenumber: f64,
    /// Last wavenumber, cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹ between consecutive steps.
    pub step_size: f64,
    /// Time spent emitting at each step.
    pub dwell_ms: u32,
    /// Emission-off time between steps.
    #[serde(default)]
    pub off_ms: u32,
    /// Repeat count; `<= 0` runs until stopped.
    #[serde(default = "default_num_scans")]
    pub num_scans: i32,
    /// Run alternate passes in reverse.
    #[serde(default)]
    pub bidirectional: bool,
}

impl StepRequest {
    /// `INVALID_PARAMETER` unless the request fits `range`.
    pub fn validate(&self, range: &WavenumberRange) -> LaserResult<()> {
        range.check("start wavenumber", self.start_wavenumber)?;
        range.check("end wavenumber", self.end_wavenumber)?;
        check_positive("step size", self.step_size)?;
        if self.step_size > (self.end_wavenumber - self.start_wavenumber).abs() {
            return Err(LaserError::invalid(format!(
                "step size {} larger than scan range",
                self.step_size
            )));
        }
        if self.dwell_ms == 0 {
            return Err(LaserError::invalid("dwell time must be positive"));
        }
        Ok(())
    }

    /// SDK parameters for chip `qcl`.
    pub fn to_params(&self, qcl: u8) -> StepParams {
        StepParams {
            start_wavenumber: self.start_wavenumber,
            end_wavenumber: self.end_wavenumber,
            step_size: self.step_size,
            dwell_ms: self.dwell_ms,
            off_ms: self.off_ms,
            num_scans: sdk_repeat_count(self.num_scans),
            bidirectional: self.bidirectional,
            qcl,
        }
    }
}

/// One entry of a multispectral scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultispectralTarget {
    /// cm⁻¹.
    pub wavenumber: f64,
    /// Time spent emitting at the target.
    pub dwell_ms: u32,
    /// Emission-off time after the target.
    #[serde(default)]
    pub off_ms: u32,
}

/// Ordered list of targets visited in sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultispectralRequest {
    /// Visited in order.
    pub targets: Vec<MultispectralTarget>,
    /// Repeat count; `<= 0` runs until stopped.
    #[serde(default = "default_num_scans")]
    pub num_scans: i32,
}

impl MultispectralRequest {
    /// `INVALID_PARAMETER` unless the request fits `range`. At least one target is required.
    pub fn validate(&self, range: &WavenumberRange) -> LaserResult<()> {
        if self.targets.is_empty() {
            return Err(LaserError::invalid("multispectral scan needs at least one target"));
        }
        for (index, target) in self.targets.iter().enumerate() {
            range.check(&format!("target {} wavenumber", index), target.wavenumber)?;
            if target.dwell_ms == 0 {
                return Err(LaserError::invalid(format!(
                    "target {} dwell time must be positive",
                    index
                )));
            }
        }
        Ok(())
    }

    /// SDK parameters.
    pub fn to_params(&self) -> MultispectralParams {
        MultispectralParams {
            targets: self.targets.clone(),
            num_scans: sdk_repeat_count(self.num_scans),
        }
    }
}

/// Step scan advanced one step at a time by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualStepRequest {
    /// First wavenumber, cm⁻¹.
    pub start_wavenumber: f64,
    /// Last wavenumber, cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹ advanced per step.
    pub step_size: f64,
    /// Repeat count; `<= 0` runs until stopped.
    #[serde(default = "default_num_scans")]
    pub num_scans: i32,
    /// Run alternate passes in reverse.
    #[serde(default)]
    pub bidirectional: bool,
}

impl ManualStepRequest {
    /// `INVALID_PARAMETER` unless the request fits `range`.
    pub fn validate(&self, range: &WavenumberRange) -> LaserResult<()> {
        range.check("start wavenumber", self.start_wavenumber)?;
        range.check("end wavenumber", self.end_wavenumber)?;
        check_positive("step size", self.step_size)
    }

    /// SDK parameters for chip `qcl`.
    pub fn to_params(&self, qcl: u8) -> ManualStepParams {
        ManualStepParams {
            start_wavenumber: self.start_wavenumber,
            end_wavenumber: self.end_wavenumber,
            step_size: self.step_size,
            num_scans: sdk_repeat_count(self.num_scans),
            bidirectional: self.bidirectional,
            qcl,
        }
    }
}

// =============================================================================
// SDK-level parameters
// =============================================================================

/// Sweep as handed to a [`HardwareLink`](crate::capabilities::HardwareLink).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParams {
    /// cm⁻¹.
    pub start_wavenumber: f64,
    /// cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹ per second.
    pub speed: f64,
    /// SDK repeat field, see [`sdk_repeat_count`].
    pub num_scans: u16,
    /// Ask the firmware for alternating passes.
    pub bidirectional: bool,
    /// Preferred QCL chip (1-based).
    pub qcl: u8,
}

/// Step-and-dwell scan as handed to a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// cm⁻¹.
    pub start_wavenumber: f64,
    /// cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹.
    pub step_size: f64,
    /// Milliseconds.
    pub dwell_ms: u32,
    /// Milliseconds.
    pub off_ms: u32,
    /// SDK repeat field.
    pub num_scans: u16,
    /// Alternate pass direction.
    pub bidirectional: bool,
    /// Preferred QCL chip (1-based).
    pub qcl: u8,
}

/// Multispectral scan as handed to a link.
#[derive(Debug, Clone, PartialEq)]
pub struct MultispectralParams {
    /// Visited in order.
    pub targets: Vec<MultispectralTarget>,
    /// SDK repeat field.
    pub num_scans: u16,
}

/// Manual step scan as handed to a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualStepParams {
    /// cm⁻¹.
    pub start_wavenumber: f64,
    /// cm⁻¹.
    pub end_wavenumber: f64,
    /// cm⁻¹.
    pub step_size: f64,
    /// SDK repeat field.
    pub num_scans: u16,
    /// Alternate pass direction.
    pub bidirectional: bool,
    /// Preferred QCL chip (1-based).
    pub qcl: u8,
}

// =============================================================================
// Active job
// =============================================================================

/// Parameters of the scan that started a [`ScanJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanRequest {
    /// Continuous sweep.
    Sweep(SweepRequest),
    /// Step and dwell.
    Step(StepRequest),
    /// Discrete targets.
    Multispectral(MultispectralRequest),
    /// Caller-advanced steps.
    ManualStep(ManualStepRequest),
}

impl ScanRequest {
    /// Session scan mode for this request.
    pub fn mode(&self) -> ScanMode {
        match self {
            ScanRequest::Sweep(_) => ScanMode::Sweep,
            ScanRequest::Step(_) => ScanMode::Step,
            ScanRequest::Multispectral(_) => ScanMode::Multispectral,
            ScanRequest::ManualStep(_) => ScanMode::ManualStep,
        }
    }
}

/// A scan started by the controller, with its runtime progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    /// What was started.
    pub request: ScanRequest,
    /// Time the start command was accepted.
    pub started_at: DateTime<Utc>,
    /// Driven by the software ping-pong task instead of the firmware.
    pub ping_pong: bool,
    /// Last reported pass number.
    pub current_scan_number: u16,
    /// Last reported progress, 0-100.
    pub percent_complete: u16,
    /// Last reported position in cm⁻¹.
    pub current_wavenumber: Option<f64>,
}

impl ScanJob {
    /// Job for `request`, started now.
    pub fn new(request: ScanRequest) -> Self {
        Self {
            request,
            started_at: Utc::now(),
            ping_pong: false,
            current_scan_number: 0,
            percent_complete: 0,
            current_wavenumber: None,
        }
    }

    /// Session scan mode of the job.
    pub fn mode(&self) -> ScanMode {
        self.request.mode()
    }

    /// Copy firmware-reported progress into the job.
    pub fn update_from(&mut self, progress: &ScanProgress) {
        self.current_scan_number = progress.current_scan_number;
        self.percent_complete = progress.percent_complete;
        self.current_wavenumber = Some(progress.current_wavenumber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> WavenumberRange {
        WavenumberRange::new(1638.81, 2077.27)
    }

    #[test]
    fn test_repeat_count_indefinite() {
        assert_eq!(sdk_repeat_count(0), u16::MAX);
        assert_eq!(sdk_repeat_count(-1), u16::MAX);
        assert_eq!(sdk_repeat_count(i32::MIN), u16::MAX);
    }

    #[test]
    fn test_repeat_count_passthrough_and_saturation() {
        assert_eq!(sdk_repeat_count(1), 1);
        assert_eq!(sdk_repeat_count(65_535), u16::MAX);
        assert_eq!(sdk_repeat_count(70_000), u16::MAX);
    }

    #[test]
    fn test_range_rejects_non_finite() {
        let r = range();
        assert!(r.contains(1638.81));
        assert!(r.contains(2077.27));
        assert!(!r.contains(f64::NAN));
        assert!(!r.contains(f64::INFINITY));
        assert!(!r.contains(2077.28));
    }

    #[test]
    fn test_sweep_validation() {
        let mut req = SweepRequest {
            start_wavenumber: 1800.0,
            end_wavenumber: 1850.0,
            speed: 10.0,
            num_scans: 0,
            bidirectional: true,
        };
        assert!(req.validate(&range()).is_ok());
        assert_eq!(req.segment_seconds(), 5.0);
        assert_eq!(req.to_params(2).num_scans, u16::MAX);

        req.speed = 0.0;
        assert!(req.validate(&range()).is_err());
        req.speed = f64::NAN;
        assert!(req.validate(&range()).is_err());
        req.speed = 10.0;
        req.end_wavenumber = 3000.0;
        assert!(req.validate(&range()).is_err());
    }

    #[test]
    fn test_sweep_speed_floor() {
        let mut req = SweepRequest {
            start_wavenumber: 1700.0,
            end_wavenumber: 2000.0,
            speed: 1e-300,
            num_scans: 1,
            bidirectional: true,
        };
        let err = req.validate(&range()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidParameter);

        req.speed = MIN_SWEEP_SPEED;
        assert!(req.validate(&range()).is_ok());
    }

    #[test]
    fn test_multispectral_validation() {
        let empty = MultispectralRequest {
            targets: vec![],
            num_scans: 1,
        };
        assert!(empty.validate(&range()).is_err());

        let ok = MultispectralRequest {
            targets: vec![MultispectralTarget {
                wavenumber: 1700.0,
                dwell_ms: 100,
                off_ms: 0,
            }],
            num_scans: -3,
        };
        assert!(ok.validate(&range()).is_ok());
        assert_eq!(ok.to_params().num_scans, u16::MAX);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: SweepRequest = serde_json::from_str(
            r#"{"start_wavenumber": 1700, "end_wavenumber": 1750, "speed": 5}"#,
        )
        .unwrap();
        assert_eq!(req.num_scans, 1);
        assert!(!req.bidirectional);
    }

    #[test]
    fn test_job_progress() {
        let mut job = ScanJob::new(ScanRequest::Step(StepRequest {
            start_wavenumber: 1700.0,
            end_wavenumber: 1710.0,
            step_size: 1.0,
            dwell_ms: 10,
            off_ms: 0,
            num_scans: 1,
            bidirectional: false,
        }));
        assert_eq!(job.mode(), ScanMode::Step);
        job.update_from(&ScanProgress {
            in_progress: true,
            active: true,
            bidirectional: false,
            current_scan_number: 1,
            percent_complete: 40,
            current_wavenumber: 1704.0,
        });
        assert_eq!(job.percent_complete, 40);
        assert_eq!(job.current_wavenumber, Some(1704.0));
    }
}
