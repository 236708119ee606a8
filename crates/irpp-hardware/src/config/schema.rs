//! Configuration schema for `hardware_configuration.toml`.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8000"
//!
//! [daylight_mircat]
//! driver = "mircat_sdk"
//! wait_for_temperature = true
//!
//! [daylight_mircat.parameters]
//! wavenumber_min = 1638.81
//! wavenumber_max = 2077.27
//!
//! [[daylight_mircat.qcls]]
//! qcl = 1
//! min = 1638.81
//! max = 1850.0
//!
//! [daylight_mircat.timing.tune]
//! interval_ms = 100
//! max_attempts = 100
//!
//! [daylight_mircat.scan]
//! ping_pong_fallback = true
//!
//! [daylight_mircat.sdk]
//! sdk_path = "C:/Program Files/Daylight Solutions/MIRcatSDK"
//! ```

use irpp_core::limits::{SEGMENT_POLL_INTERVAL, SHUTDOWN_TIMEOUT};
use irpp_core::polling::PollPolicy;
use irpp_core::scan::WavenumberRange;
use irpp_core::session::LaserMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `[server]`
    pub server: ServerConfig,
    /// `[daylight_mircat]`
    pub daylight_mircat: LaserConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind_address: String,
    /// Allow any origin (the GUI is served from a different port).
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            cors_allow_any: true,
        }
    }
}

// =============================================================================
// Laser
// =============================================================================

/// Settings for the MIRcat laser controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    /// Link implementation: `"mock"` or `"mircat_sdk"`.
    pub driver: String,
    /// Wait for TEC stability after arming before reporting success.
    pub wait_for_temperature: bool,
    /// Datasheet bounds used for local validation.
    pub parameters: LaserParameters,
    /// Wavenumber coverage of each QCL chip. Empty means one chip covering
    /// the whole range.
    pub qcls: Vec<QclRange>,
    /// Poll budgets.
    pub timing: TimingConfig,
    /// Scan orchestration.
    pub scan: ScanConfig,
    /// Driver table for `driver = "mock"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock: Option<toml::Value>,
    /// Driver table for `driver = "mircat_sdk"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<toml::Value>,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            driver: "mock".to_string(),
            wait_for_temperature: true,
            parameters: LaserParameters::default(),
            qcls: Vec::new(),
            timing: TimingConfig::default(),
            scan: ScanConfig::default(),
            mock: None,
            sdk: None,
        }
    }
}

impl LaserConfig {
    /// Configured tuning range.
    pub fn wavenumber_range(&self) -> WavenumberRange {
        WavenumberRange::new(self.parameters.wavenumber_min, self.parameters.wavenumber_max)
    }

    /// QCL chip covering `wavenumber`; chip 1 when no chip table is configured
    /// or no entry matches.
    pub fn qcl_for(&self, wavenumber: f64) -> u8 {
        self.qcls
            .iter()
            .find(|q| wavenumber >= q.min && wavenumber <= q.max)
            .map_or(1, |q| q.qcl)
    }

    /// Driver-specific table for the selected driver, empty if absent.
    pub fn driver_table(&self) -> toml::Value {
        let table = if self.driver == "mock" {
            &self.mock
        } else {
            &self.sdk
        };
        table
            .clone()
            .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()))
    }

    /// Semantic checks that serde cannot express. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let p = &self.parameters;

        if self.driver.trim().is_empty() {
            errors.push("daylight_mircat.driver cannot be empty".to_string());
        }
        if !(p.wavenumber_min.is_finite() && p.wavenumber_max.is_finite())
            || p.wavenumber_min >= p.wavenumber_max
        {
            errors.push(format!(
                "wavenumber range [{}, {}] is not an increasing finite interval",
                p.wavenumber_min, p.wavenumber_max
            ));
        }
        if p.pulse_rate_min == 0 || p.pulse_rate_min > p.pulse_rate_max {
            errors.push(format!(
                "pulse rate range [{}, {}] is invalid",
                p.pulse_rate_min, p.pulse_rate_max
            ));
        }
        if p.pulse_width_min == 0 || p.pulse_width_min > p.pulse_width_max {
            errors.push(format!(
                "pulse width range [{}, {}] is invalid",
                p.pulse_width_min, p.pulse_width_max
            ));
        }
        if p.laser_modes.is_empty() {
            errors.push("at least one laser mode must be enabled".to_string());
        }
        for q in &self.qcls {
            if q.qcl == 0 || q.min >= q.max {
                errors.push(format!("QCL entry {} has an invalid range", q.qcl));
            }
        }

        for (name, policy) in self.timing.policies() {
            if policy.interval_ms == 0 || policy.max_attempts == 0 {
                errors.push(format!(
                    "timing.{} needs a positive interval_ms and max_attempts",
                    name
                ));
            }
        }

        let s = &self.scan;
        if s.segment_poll_interval_ms == 0 {
            errors.push("scan.segment_poll_interval_ms must be positive".to_string());
        }
        if !(s.safety_factor.is_finite() && s.safety_factor >= 1.0) {
            errors.push(format!(
                "scan.safety_factor {} must be at least 1.0",
                s.safety_factor
            ));
        }
        if s.join_timeout_ms == 0 {
            errors.push("scan.join_timeout_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Numeric bounds from the laser's datasheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserParameters {
    /// Lowest tunable wavenumber, cm⁻¹.
    pub wavenumber_min: f64,
    /// Highest tunable wavenumber, cm⁻¹.
    pub wavenumber_max: f64,
    /// Hz
    pub pulse_rate_min: u32,
    /// Hz
    pub pulse_rate_max: u32,
    /// ns
    pub pulse_width_min: u32,
    /// ns
    pub pulse_width_max: u32,
    /// Modes `set_mode` accepts.
    pub laser_modes: Vec<LaserMode>,
}

impl Default for LaserParameters {
    fn default() -> Self {
        Self {
            wavenumber_min: 1638.81,
            wavenumber_max: 2077.27,
            pulse_rate_min: 10,
            pulse_rate_max: 3_000_000,
            pulse_width_min: 20,
            pulse_width_max: 1000,
            laser_modes: LaserMode::ALL.to_vec(),
        }
    }
}

/// Tuning coverage of one QCL chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QclRange {
    /// 1-based chip index
    pub qcl: u8,
    /// Lowest wavenumber on this chip, cm⁻¹.
    pub min: f64,
    /// Highest wavenumber on this chip, cm⁻¹.
    pub max: f64,
}

/// Polling budgets per subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Arm confirmation.
    pub arm: PollPolicy,
    /// Tune confirmation.
    pub tune: PollPolicy,
    /// Emission confirmation.
    pub emission: PollPolicy,
    /// TEC settling after arm; tens of seconds on real heads.
    pub temperature: PollPolicy,
    /// Confirmation that the laser reports disarmed.
    pub disarm: PollPolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            arm: PollPolicy::new(100, 100),
            tune: PollPolicy::new(100, 100),
            emission: PollPolicy::new(100, 30),
            temperature: PollPolicy::new(500, 120),
            disarm: PollPolicy::new(100, 50),
        }
    }
}

impl TimingConfig {
    fn policies(&self) -> [(&'static str, PollPolicy); 5] {
        [
            ("arm", self.arm),
            ("tune", self.tune),
            ("emission", self.emission),
            ("temperature", self.temperature),
            ("disarm", self.disarm),
        ]
    }
}

/// Scan orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Emulate bidirectional sweeps in software when firmware ignores the flag.
    pub ping_pong_fallback: bool,
    /// Scan-in-progress poll interval during a ping-pong segment.
    pub segment_poll_interval_ms: u64,
    /// Multiple of the analytic segment duration before a segment is force-stopped.
    pub safety_factor: f64,
    /// Fixed slack added to every segment timeout.
    pub safety_margin_ms: u64,
    /// Bound on joining the ping-pong task before it is aborted.
    pub join_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ping_pong_fallback: true,
            segment_poll_interval_ms: millis(SEGMENT_POLL_INTERVAL),
            safety_factor: 3.0,
            safety_margin_ms: 5000,
            join_timeout_ms: millis(SHUTDOWN_TIMEOUT),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ScanConfig {
    /// [`segment_poll_interval_ms`](Self::segment_poll_interval_ms) as a duration.
    pub fn segment_poll_interval(&self) -> Duration {
        Duration::from_millis(self.segment_poll_interval_ms)
    }

    /// [`join_timeout_ms`](Self::join_timeout_ms) as a duration.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Safety timeout for one sweep segment of `segment_seconds` analytic length.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing; NaN counts as zero.
    pub fn segment_timeout(&self, segment_seconds: f64) -> Duration {
        let scaled = (segment_seconds * self.safety_factor).max(0.0);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(Duration::MAX)
            .saturating_add(Duration::from_millis(self.safety_margin_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LaserConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wavenumber_range(), WavenumberRange::new(1638.81, 2077.27));
        assert_eq!(config.parameters.laser_modes.len(), 3);
    }

    #[test]
    fn test_qcl_selection() {
        let config = LaserConfig {
            qcls: vec![
                QclRange {
                    qcl: 1,
                    min: 1638.81,
                    max: 1850.0,
                },
                QclRange {
                    qcl: 2,
                    min: 1850.01,
                    max: 2077.27,
                },
            ],
            ..Default::default()
        };
        assert_eq!(config.qcl_for(1700.0), 1);
        assert_eq!(config.qcl_for(1900.0), 2);
        assert_eq!(LaserConfig::default().qcl_for(1900.0), 1);
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config = LaserConfig::default();
        config.parameters.wavenumber_min = 2100.0;
        config.parameters.laser_modes.clear();
        config.timing.tune.max_attempts = 0;
        config.scan.safety_factor = 0.5;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors.iter().any(|e| e.contains("timing.tune")));
    }

    #[test]
    fn test_segment_timeout() {
        let scan = ScanConfig {
            safety_factor: 2.0,
            safety_margin_ms: 500,
            ..Default::default()
        };
        assert_eq!(scan.segment_timeout(5.0), Duration::from_millis(10_500));
    }

    #[test]
    fn test_segment_timeout_saturates() {
        let scan = ScanConfig::default();
        assert_eq!(scan.segment_timeout(300.0 / 1e-300), Duration::MAX);
        assert_eq!(scan.segment_timeout(f64::INFINITY), Duration::MAX);
        assert_eq!(
            scan.segment_timeout(f64::NAN),
            Duration::from_millis(scan.safety_margin_ms)
        );
    }

    #[test]
    fn test_driver_table_selection() {
        let mut config = LaserConfig::default();
        assert!(config.driver_table().as_table().is_some_and(|t| t.is_empty()));

        config.driver = "mircat_sdk".to_string();
        config.sdk = Some(toml::from_str("sdk_path = \"C:/MIRcat\"").unwrap());
        assert_eq!(
            config.driver_table().get("sdk_path").and_then(|v| v.as_str()),
            Some("C:/MIRcat")
        );
    }
}
