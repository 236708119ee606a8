//! Simulated MIRcat-class QCL.
//!
//! Transitions settle over time on the tokio clock, so tests running with
//! paused time see the same polling behavior as the real laser without
//! waiting. Every command is appended to a log that tests use to assert
//! which hardware calls were (or were not) issued.

use crate::common::ErrorConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use irpp_core::capabilities::{HardwareLink, ScanProgress, Temperatures};
use irpp_core::driver::LinkFactory;
use irpp_core::error::{DriverError, DriverErrorKind, DriverResult};
use irpp_core::scan::{ManualStepParams, MultispectralParams, StepParams, SweepParams};
use irpp_core::session::{LaserMode, ScanMode};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const DRIVER_TYPE: &str = "mock";

// =============================================================================
// MockQclFactory - LinkFactory implementation
// =============================================================================

/// Configuration for [`SimulatedQcl`], read from `[daylight_mircat.mock]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockQclConfig {
    /// `false` makes `initialize` fail as if no laser were attached
    pub device_present: bool,
    /// Time from `arm` until `is_armed` reports true
    pub arm_delay_ms: u64,
    /// Time from `tune_to` until `is_tuned` reports true
    pub tune_delay_ms: u64,
    /// Time from `emission_on` until `is_emitting` reports true
    pub emission_delay_ms: u64,
    /// Time after arming until the TECs report stable
    pub temperature_settle_ms: u64,
    /// Initial interlock state
    pub interlock_closed: bool,
    /// Initial key switch state
    pub key_switch_on: bool,
    /// Initial system fault flag
    pub system_fault: bool,
    /// Value reported by `is_pointing_compensated`
    pub pointing_compensated: bool,
    /// `false` emulates firmware that ignores the bidirectional sweep flag
    pub honor_bidirectional: bool,
    /// Delay added to every SDK call
    pub command_latency_ms: u64,
    /// Random failure probability for every call (0.0 to 1.0)
    pub failure_rate: f64,
    /// Seed for the failure RNG; random when absent
    pub seed: Option<u64>,
}

impl Default for MockQclConfig {
    fn default() -> Self {
        Self {
            device_present: true,
            arm_delay_ms: 500,
            tune_delay_ms: 300,
            emission_delay_ms: 200,
            temperature_settle_ms: 1500,
            interlock_closed: true,
            key_switch_on: true,
            system_fault: false,
            pointing_compensated: true,
            honor_bidirectional: true,
            command_latency_ms: 0,
            failure_rate: 0.0,
            seed: None,
        }
    }
}

impl MockQclConfig {
    /// Parse and range-check a `[daylight_mircat.mock]` table.
    pub fn from_toml(value: &toml::Value) -> Result<Self> {
        let cfg: MockQclConfig = value.clone().try_into()?;
        if !(0.0..=1.0).contains(&cfg.failure_rate) {
            return Err(anyhow!(
                "failure_rate {} must be between 0.0 and 1.0",
                cfg.failure_rate
            ));
        }
        Ok(cfg)
    }
}

/// Factory for [`SimulatedQcl`] links.
pub struct MockQclFactory;

impl LinkFactory for MockQclFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Simulated MIRcat QCL"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        MockQclConfig::from_toml(config).map(|_| ())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<Arc<dyn HardwareLink>>> {
        Box::pin(async move {
            let cfg = MockQclConfig::from_toml(&config)?;
            Ok(Arc::new(SimulatedQcl::new(cfg)) as Arc<dyn HardwareLink>)
        })
    }
}

// =============================================================================
// Command log
// =============================================================================

/// A command received by the simulator. Queries are counted, not logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// `initialize`
    Initialize,
    /// `deinitialize`
    Deinitialize,
    /// `arm`
    Arm,
    /// `disarm`
    Disarm,
    /// `tune_to`
    TuneTo {
        /// cm⁻¹.
        wavenumber: f64,
        /// 1-based chip.
        qcl: u8,
    },
    /// `emission_on`
    EmissionOn,
    /// `emission_off`
    EmissionOff,
    /// `set_laser_mode`
    SetLaserMode(LaserMode),
    /// `set_pulse_parameters`
    SetPulseParameters {
        /// Hz.
        rate_hz: u32,
        /// ns.
        width_ns: u32,
    },
    /// `start_sweep`
    StartSweep(SweepParams),
    /// `start_step`
    StartStep(StepParams),
    /// `start_multispectral`
    StartMultispectral(MultispectralParams),
    /// `start_manual_step`
    StartManualStep(ManualStepParams),
    /// `manual_step_next`
    ManualStepNext,
    /// `stop_scan`
    StopScan,
}

// =============================================================================
// SimulatedQcl
// =============================================================================

#[derive(Debug, Clone)]
struct SimScan {
    kind: ScanMode,
    started: Instant,
    /// `None` runs until stopped
    duration: Option<Duration>,
    /// One pass for sweeps, used to derive scan number and position
    pass: Duration,
    num_scans: u16,
    bidirectional: bool,
    start_wavenumber: f64,
    end_wavenumber: f64,
    manual_steps_taken: u32,
    manual_steps_total: Option<u32>,
}

impl SimScan {
    fn in_progress(&self) -> bool {
        match (self.kind, self.duration) {
            (ScanMode::ManualStep, _) => self
                .manual_steps_total
                .map_or(true, |total| self.manual_steps_taken < total),
            (_, Some(duration)) => self.started.elapsed() < duration,
            (_, None) => true,
        }
    }

    fn progress(&self, honor_bidirectional: bool) -> ScanProgress {
        let in_progress = self.in_progress();
        let elapsed = self.started.elapsed();
        let pass_secs = self.pass.as_secs_f64();
        let (scan_index, fraction) = if pass_secs > 0.0 {
            let passes = elapsed.as_secs_f64() / pass_secs;
            (passes.floor(), passes.fract())
        } else {
            (0.0, 0.0)
        };
        let current_scan_number = if in_progress {
            (scan_index as u64 + 1).min(u64::from(self.num_scans)) as u16
        } else {
            self.num_scans
        };
        let percent_complete = match self.duration {
            Some(d) if !d.is_zero() => {
                ((elapsed.as_secs_f64() / d.as_secs_f64()) * 100.0).min(100.0) as u16
            }
            _ if !in_progress => 100,
            _ => 0,
        };
        let reverse = self.bidirectional && honor_bidirectional && (scan_index as u64) % 2 == 1;
        let (from, to) = if reverse {
            (self.end_wavenumber, self.start_wavenumber)
        } else {
            (self.start_wavenumber, self.end_wavenumber)
        };
        let current_wavenumber = if in_progress {
            from + (to - from) * fraction
        } else {
            to
        };

        ScanProgress {
            in_progress,
            active: in_progress,
            bidirectional: self.bidirectional && honor_bidirectional,
            current_scan_number,
            percent_complete,
            current_wavenumber,
        }
    }
}

#[derive(Debug)]
struct SimState {
    initialized: bool,
    armed_at: Option<Instant>,
    tuned_at: Option<(Instant, f64, u8)>,
    emission_at: Option<Instant>,
    mode: LaserMode,
    pulse: Option<(u32, u32)>,
    scan: Option<SimScan>,
    interlock_closed: bool,
    key_switch_on: bool,
    system_fault: bool,
    honor_bidirectional: bool,
    commands: Vec<LinkCommand>,
    query_count: u64,
}

/// Simulated MIRcat laser implementing [`HardwareLink`].
pub struct SimulatedQcl {
    config: MockQclConfig,
    state: Mutex<SimState>,
    errors: Mutex<ErrorConfig>,
}

impl SimulatedQcl {
    /// Powered-on laser with no open session.
    pub fn new(config: MockQclConfig) -> Self {
        let errors = if config.failure_rate > 0.0 {
            ErrorConfig::random_failures_seeded(config.failure_rate, config.seed)
        } else {
            ErrorConfig::none()
        };
        let state = SimState {
            initialized: false,
            armed_at: None,
            tuned_at: None,
            emission_at: None,
            mode: LaserMode::default(),
            pulse: None,
            scan: None,
            interlock_closed: config.interlock_closed,
            key_switch_on: config.key_switch_on,
            system_fault: config.system_fault,
            honor_bidirectional: config.honor_bidirectional,
            commands: Vec::new(),
            query_count: 0,
        };
        Self {
            config,
            state: Mutex::new(state),
            errors: Mutex::new(errors),
        }
    }

    // ===== Test controls =====

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<LinkCommand> {
        self.state.lock().commands.clone()
    }

    /// Number of query calls (`is_*`, `temperatures`, `scan_status`).
    pub fn query_count(&self) -> u64 {
        self.state.lock().query_count
    }

    /// Forget logged commands and reset the query counter.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.commands.clear();
        state.query_count = 0;
    }

    /// Open or close the interlock circuit.
    pub fn set_interlock(&self, closed: bool) {
        self.state.lock().interlock_closed = closed;
    }

    /// Turn the key switch.
    pub fn set_key_switch(&self, on: bool) {
        self.state.lock().key_switch_on = on;
    }

    /// Raise or clear the system fault flag.
    pub fn set_system_fault(&self, fault: bool) {
        self.state.lock().system_fault = fault;
    }

    /// Switch firmware bidirectional support at runtime.
    pub fn set_honor_bidirectional(&self, honor: bool) {
        self.state.lock().honor_bidirectional = honor;
    }

    /// Replace the error injection configuration.
    pub fn set_error_config(&self, errors: ErrorConfig) {
        *self.errors.lock() = errors;
    }

    // ===== Internals =====

    async fn latency(&self) {
        if self.config.command_latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.command_latency_ms)).await;
        }
    }

    fn inject(&self, operation: &'static str) -> DriverResult<()> {
        let errors = self.errors.lock().clone();
        errors.check_operation(DRIVER_TYPE, operation)
    }

    fn error(kind: DriverErrorKind, message: impl Into<String>) -> DriverError {
        DriverError::new(DRIVER_TYPE, kind, message)
    }

    /// Log `command`, apply error injection, then require an open session.
    async fn command(&self, operation: &'static str, command: LinkCommand) -> DriverResult<()> {
        self.latency().await;
        self.state.lock().commands.push(command);
        self.inject(operation)?;
        if !self.state.lock().initialized {
            return Err(Self::error(
                DriverErrorKind::Communication,
                "SDK session not initialized",
            ));
        }
        Ok(())
    }

    async fn query<T>(
        &self,
        operation: &'static str,
        read: impl FnOnce(&SimState) -> T,
    ) -> DriverResult<T> {
        self.latency().await;
        self.state.lock().query_count += 1;
        self.inject(operation)?;
        let state = self.state.lock();
        if !state.initialized {
            return Err(Self::error(
                DriverErrorKind::Communication,
                "SDK session not initialized",
            ));
        }
        Ok(read(&state))
    }

    fn settled(at: Option<Instant>, delay_ms: u64) -> bool {
        at.is_some_and(|t| t.elapsed() >= Duration::from_millis(delay_ms))
    }

    fn is_armed_now(&self, state: &SimState) -> bool {
        Self::settled(state.armed_at, self.config.arm_delay_ms)
    }

    fn is_tuned_now(&self, state: &SimState) -> bool {
        Self::settled(state.tuned_at.map(|(t, _, _)| t), self.config.tune_delay_ms)
    }

    fn start_scan(&self, scan: SimScan) -> DriverResult<()> {
        let mut state = self.state.lock();
        if !self.is_armed_now(&state) {
            return Err(Self::error(
                DriverErrorKind::Hardware,
                "scan requires an armed laser",
            ));
        }
        if state.scan.as_ref().is_some_and(SimScan::in_progress) {
            return Err(Self::error(
                DriverErrorKind::Hardware,
                "scan already in progress",
            ));
        }
        debug!(kind = %scan.kind, duration = ?scan.duration, "simulated scan started");
        state.scan = Some(scan);
        Ok(())
    }
}

fn total_duration(pass: Duration, num_scans: u16) -> Option<Duration> {
    (num_scans != u16::MAX).then(|| pass.saturating_mul(u32::from(num_scans)))
}

fn step_count(start: f64, end: f64, step: f64) -> u32 {
    ((end - start).abs() / step).floor() as u32 + 1
}

#[async_trait]
impl HardwareLink for SimulatedQcl {
    fn driver_type(&self) -> &str {
        DRIVER_TYPE
    }

    async fn initialize(&self) -> DriverResult<()> {
        self.latency().await;
        self.state.lock().commands.push(LinkCommand::Initialize);
        self.inject("initialize")?;
        if !self.config.device_present {
            return Err(Self::error(
                DriverErrorKind::Initialization,
                "no MIRcat laser detected",
            ));
        }
        self.state.lock().initialized = true;
        Ok(())
    }

    async fn deinitialize(&self) -> DriverResult<()> {
        self.command("deinitialize", LinkCommand::Deinitialize).await?;
        let mut state = self.state.lock();
        state.initialized = false;
        state.armed_at = None;
        state.tuned_at = None;
        state.emission_at = None;
        state.scan = None;
        Ok(())
    }

    async fn arm(&self) -> DriverResult<()> {
        self.command("arm", LinkCommand::Arm).await?;
        let mut state = self.state.lock();
        if !state.interlock_closed || !state.key_switch_on {
            return Err(Self::error(
                DriverErrorKind::Hardware,
                "arm refused: interlock or key switch open",
            ));
        }
        if state.armed_at.is_none() {
            state.armed_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn disarm(&self) -> DriverResult<()> {
        self.command("disarm", LinkCommand::Disarm).await?;
        let mut state = self.state.lock();
        state.armed_at = None;
        state.emission_at = None;
        state.scan = None;
        Ok(())
    }

    async fn tune_to(&self, wavenumber: f64, qcl: u8) -> DriverResult<()> {
        self.command("tune_to", LinkCommand::TuneTo { wavenumber, qcl })
            .await?;
        self.state.lock().tuned_at = Some((Instant::now(), wavenumber, qcl));
        Ok(())
    }

    async fn emission_on(&self) -> DriverResult<()> {
        self.command("emission_on", LinkCommand::EmissionOn).await?;
        let mut state = self.state.lock();
        if !self.is_armed_now(&state) || !self.is_tuned_now(&state) {
            return Err(Self::error(
                DriverErrorKind::Hardware,
                "emission requires an armed and tuned laser",
            ));
        }
        if state.emission_at.is_none() {
            state.emission_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn emission_off(&self) -> DriverResult<()> {
        self.command("emission_off", LinkCommand::EmissionOff).await?;
        self.state.lock().emission_at = None;
        Ok(())
    }

    async fn set_laser_mode(&self, mode: LaserMode) -> DriverResult<()> {
        self.command("set_laser_mode", LinkCommand::SetLaserMode(mode))
            .await?;
        self.state.lock().mode = mode;
        Ok(())
    }

    async fn set_pulse_parameters(&self, rate_hz: u32, width_ns: u32) -> DriverResult<()> {
        self.command(
            "set_pulse_parameters",
            LinkCommand::SetPulseParameters { rate_hz, width_ns },
        )
        .await?;
        let mut state = self.state.lock();
        if state.mode != LaserMode::Pulsed {
            return Err(Self::error(
                DriverErrorKind::InvalidParameter,
                "pulse parameters require pulsed mode",
            ));
        }
        state.pulse = Some((rate_hz, width_ns));
        Ok(())
    }

    async fn is_armed(&self) -> DriverResult<bool> {
        self.query("is_armed", |s| self.is_armed_now(s)).await
    }

    async fn is_tuned(&self) -> DriverResult<bool> {
        self.query("is_tuned", |s| self.is_tuned_now(s)).await
    }

    async fn is_emitting(&self) -> DriverResult<bool> {
        self.query("is_emitting", |s| {
            Self::settled(s.emission_at, self.config.emission_delay_ms)
        })
        .await
    }

    async fn is_interlocked(&self) -> DriverResult<bool> {
        self.query("is_interlocked", |s| s.interlock_closed).await
    }

    async fn is_key_switch_on(&self) -> DriverResult<bool> {
        self.query("is_key_switch_on", |s| s.key_switch_on).await
    }

    async fn is_temperature_stable(&self) -> DriverResult<bool> {
        self.query("is_temperature_stable", |s| {
            Self::settled(s.armed_at, self.config.temperature_settle_ms)
        })
        .await
    }

    async fn is_system_fault(&self) -> DriverResult<bool> {
        self.query("is_system_fault", |s| s.system_fault).await
    }

    async fn is_pointing_compensated(&self) -> DriverResult<bool> {
        let compensated = self.config.pointing_compensated;
        self.query("is_pointing_compensated", |_| compensated).await
    }

    async fn temperatures(&self) -> DriverResult<Temperatures> {
        self.query("temperatures", |s| {
            let load = if s.emission_at.is_some() { 4.0 } else { 0.0 };
            Temperatures {
                case_temp_1: 23.0 + load / 2.0,
                case_temp_2: 23.5 + load / 2.0,
                pcb_temperature: 31.0 + load,
            }
        })
        .await
    }

    async fn start_sweep(&self, params: &SweepParams) -> DriverResult<()> {
        self.command("start_sweep", LinkCommand::StartSweep(*params))
            .await?;
        let pass = Duration::try_from_secs_f64(
            (params.end_wavenumber - params.start_wavenumber).abs() / params.speed,
        )
        .unwrap_or(Duration::MAX);
        self.start_scan(SimScan {
            kind: ScanMode::Sweep,
            started: Instant::now(),
            duration: total_duration(pass, params.num_scans),
            pass,
            num_scans: params.num_scans,
            bidirectional: params.bidirectional,
            start_wavenumber: params.start_wavenumber,
            end_wavenumber: params.end_wavenumber,
            manual_steps_taken: 0,
            manual_steps_total: None,
        })
    }

    async fn start_step(&self, params: &StepParams) -> DriverResult<()> {
        self.command("start_step", LinkCommand::StartStep(*params))
            .await?;
        let steps = step_count(params.start_wavenumber, params.end_wavenumber, params.step_size);
        let pass = Duration::from_millis(u64::from(params.dwell_ms) + u64::from(params.off_ms))
            * steps;
        self.start_scan(SimScan {
            kind: ScanMode::Step,
            started: Instant::now(),
            duration: total_duration(pass, params.num_scans),
            pass,
            num_scans: params.num_scans,
            bidirectional: params.bidirectional,
            start_wavenumber: params.start_wavenumber,
            end_wavenumber: params.end_wavenumber,
            manual_steps_taken: 0,
            manual_steps_total: None,
        })
    }

    async fn start_multispectral(&self, params: &MultispectralParams) -> DriverResult<()> {
        self.command(
            "start_multispectral",
            LinkCommand::StartMultispectral(params.clone()),
        )
        .await?;
        let pass: Duration = params
            .targets
            .iter()
            .map(|t| Duration::from_millis(u64::from(t.dwell_ms) + u64::from(t.off_ms)))
            .sum();
        let first = params.targets.first().map_or(0.0, |t| t.wavenumber);
        let last = params.targets.last().map_or(0.0, |t| t.wavenumber);
        self.start_scan(SimScan {
            kind: ScanMode::Multispectral,
            started: Instant::now(),
            duration: total_duration(pass, params.num_scans),
            pass,
            num_scans: params.num_scans,
            bidirectional: false,
            start_wavenumber: first,
            end_wavenumber: last,
            manual_steps_taken: 0,
            manual_steps_total: None,
        })
    }

    async fn start_manual_step(&self, params: &ManualStepParams) -> DriverResult<()> {
        self.command("start_manual_step", LinkCommand::StartManualStep(*params))
            .await?;
        let steps = step_count(params.start_wavenumber, params.end_wavenumber, params.step_size);
        let total = (params.num_scans != u16::MAX).then(|| steps * u32::from(params.num_scans));
        self.start_scan(SimScan {
            kind: ScanMode::ManualStep,
            started: Instant::now(),
            duration: None,
            pass: Duration::ZERO,
            num_scans: params.num_scans,
            bidirectional: params.bidirectional,
            start_wavenumber: params.start_wavenumber,
            end_wavenumber: params.end_wavenumber,
            manual_steps_taken: 0,
            manual_steps_total: total,
        })
    }

    async fn manual_step_next(&self) -> DriverResult<()> {
        self.command("manual_step_next", LinkCommand::ManualStepNext)
            .await?;
        let mut state = self.state.lock();
        match state.scan.as_mut() {
            Some(scan) if scan.kind == ScanMode::ManualStep && scan.in_progress() => {
                scan.manual_steps_taken += 1;
                Ok(())
            }
            _ => Err(Self::error(
                DriverErrorKind::Hardware,
                "no manual step scan in progress",
            )),
        }
    }

    async fn stop_scan(&self) -> DriverResult<()> {
        self.command("stop_scan", LinkCommand::StopScan).await?;
        self.state.lock().scan = None;
        Ok(())
    }

    async fn scan_status(&self) -> DriverResult<ScanProgress> {
        self.query("scan_status", |s| {
            s.scan
                .as_ref()
                .map(|scan| scan.progress(s.honor_bidirectional))
                .unwrap_or_default()
        })
        .await
    }
}
