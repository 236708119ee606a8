//! Laser controller: connection, arm/tune/emission state machine, scans.
//!
//! One [`LaserController`] owns one [`HardwareLink`]. Every operation takes
//! the controller's async mutex for its full duration, polling waits
//! included, so two hardware command sequences for the same laser never
//! interleave. The only concurrent activity is the ping-pong task, which is
//! cancelled and joined before any scan operation proceeds.
//!
//! # Safety policy
//!
//! "Turn on" paths (`arm`, `tune`, `emission_on`, scan starts) check every
//! precondition locally before the first hardware call and only set a flag
//! after the hardware confirmed the transition.
//!
//! "Turn off" paths (`disconnect`, `disarm`, `emission_off`, `stop_scan`)
//! attempt every hardware call, log failures, and reset the flags regardless.
//! They report success.
//!
//! # Error record
//!
//! An operation that finishes without any failure clears the
//! [`ErrorRecord`]. A failure overwrites it, including a failure swallowed by a
//! best-effort step of an otherwise successful operation. `status` and
//! `config` never clear it. `clear_error` does.

use crate::config::LaserConfig;
use crate::ping_pong::{self, PingPongExit, PingPongHandle, PingPongPlan};
use chrono::{DateTime, Utc};
use irpp_core::capabilities::HardwareLink;
use irpp_core::error::{DriverResult, ErrorCode, ErrorRecord, LaserError, LaserResult};
use irpp_core::limits::STATUS_CHANNEL_CAPACITY;
use irpp_core::polling::{poll_until, PollOutcome, PollPolicy};
use irpp_core::scan::{
    ManualStepRequest, MultispectralRequest, ScanJob, ScanRequest, StepRequest, SweepRequest,
};
use irpp_core::session::{DeviceSession, LaserMode, PulseParameters, ScanMode};
use irpp_core::status::HardwareStatus;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Reports
// =============================================================================

/// Progress of a running software ping-pong sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingPongStatus {
    /// Segments issued so far, both directions.
    pub segments_started: u32,
    /// Forward and reverse pairs finished.
    pub cycles_completed: u32,
    /// Direction of the current segment.
    pub forward: bool,
}

/// Controller state as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// When the report was built.
    pub timestamp: DateTime<Utc>,
    /// Cached session flags, flattened into the report.
    #[serde(flatten)]
    pub session: DeviceSession,
    /// Hardware readings from the last refresh.
    pub status: HardwareStatus,
    /// Running scan, if any.
    pub scan: Option<ScanJob>,
    /// Present while the software fallback drives the sweep.
    pub ping_pong: Option<PingPongStatus>,
    /// Most recent failure.
    #[serde(flatten)]
    pub error: ErrorRecord,
}

struct ControllerState {
    session: DeviceSession,
    status: HardwareStatus,
    error: ErrorRecord,
    scan: Option<ScanJob>,
    ping_pong: Option<PingPongHandle>,
    /// Last failure swallowed by a best-effort step of the running operation.
    swallowed: Option<LaserError>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            session: DeviceSession::default(),
            status: HardwareStatus::disconnected(),
            error: ErrorRecord::default(),
            scan: None,
            ping_pong: None,
            swallowed: None,
        }
    }

    /// Log and remember a failure that does not fail the operation.
    fn swallow(&mut self, step: &'static str, result: DriverResult<()>) {
        if let Err(e) = result {
            let err = LaserError::from(e);
            warn!(step, error = %err, "Best-effort step failed");
            self.swallowed = Some(err);
        }
    }

    fn clear_scan(&mut self) {
        self.session.clear_scan();
        self.scan = None;
    }

    fn reset(&mut self) {
        self.session.reset();
        self.status = HardwareStatus::disconnected();
        self.scan = None;
    }

    fn report(&self) -> StatusReport {
        StatusReport {
            timestamp: Utc::now(),
            session: self.session.clone(),
            status: self.status.clone(),
            scan: self.scan.clone(),
            ping_pong: self.ping_pong.as_ref().map(|h| PingPongStatus {
                segments_started: h.progress().segments_started(),
                cycles_completed: h.progress().cycles_completed(),
                forward: h.progress().is_forward(),
            }),
            error: self.error.clone(),
        }
    }
}

// =============================================================================
// LaserController
// =============================================================================

/// Stateful service object for one MIRcat laser.
///
/// ```
/// use irpp_driver_mock::{MockQclConfig, SimulatedQcl};
/// use irpp_hardware::{LaserConfig, LaserController};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> irpp_core::LaserResult<()> {
/// let link = Arc::new(SimulatedQcl::new(MockQclConfig {
///     arm_delay_ms: 0,
///     tune_delay_ms: 0,
///     emission_delay_ms: 0,
///     temperature_settle_ms: 0,
///     ..Default::default()
/// }));
/// let laser = LaserController::new(link, LaserConfig::default());
///
/// laser.connect().await?;
/// laser.arm().await?;
/// laser.tune(1800.0).await?;
/// laser.emission_on().await?;
/// assert!(laser.snapshot().await.session.emission_on);
///
/// laser.disconnect().await?;
/// assert!(!laser.snapshot().await.session.armed);
/// # Ok(())
/// # }
/// ```
pub struct LaserController {
    link: Arc<dyn HardwareLink>,
    config: Arc<LaserConfig>,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<StatusReport>,
}

impl LaserController {
    /// Disconnected controller driving `link`.
    pub fn new(link: Arc<dyn HardwareLink>, config: LaserConfig) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            link,
            config: Arc::new(config),
            state: Mutex::new(ControllerState::new()),
            events,
        }
    }

    /// Configuration the controller was built with.
    pub fn config(&self) -> &LaserConfig {
        &self.config
    }

    /// Status reports published after every operation.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusReport> {
        self.events.subscribe()
    }

    /// Cached state without touching the hardware.
    pub async fn snapshot(&self) -> StatusReport {
        self.state.lock().await.report()
    }

    fn publish(&self, state: &ControllerState) {
        // no subscribers is fine
        let _ = self.events.send(state.report());
    }

    /// Apply the error record policy and publish the new state.
    fn conclude<T>(&self, state: &mut ControllerState, result: LaserResult<T>) -> LaserResult<T> {
        let swallowed = state.swallowed.take();
        match &result {
            Ok(_) => match swallowed {
                Some(err) => state.error.record(&err),
                None => state.error.clear(),
            },
            Err(err) => {
                warn!(code = %err.code(), error = %err, "Laser operation failed");
                state.error.record(err);
            }
        }
        self.publish(state);
        result
    }

    fn ensure_connected(state: &ControllerState) -> LaserResult<()> {
        if state.session.connected {
            Ok(())
        } else {
            Err(LaserError::NotConnected)
        }
    }

    // ===== Connection =====

    /// Open the SDK session and adopt the hardware state.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.connect_inner(&mut state).await;
        self.conclude(&mut state, result)
    }

    async fn connect_inner(&self, state: &mut ControllerState) -> LaserResult<()> {
        if state.session.connected {
            debug!("Already connected");
            return Ok(());
        }

        info!(driver = self.link.driver_type(), "Connecting to MIRcat");
        let opened = match self.link.initialize().await {
            Ok(()) => HardwareStatus::read(self.link.as_ref()).await,
            Err(e) => Err(e),
        };

        match opened {
            Ok(status) => {
                let session = &mut state.session;
                session.connected = true;
                session.armed = status.armed;
                session.tuned = status.tuned;
                session.emission_on = status.emission && status.armed && status.tuned;
                session.temperature_stable = status.temperature;
                state.status = status;
                info!(armed = session.armed, tuned = session.tuned, "Connected to MIRcat");
                Ok(())
            }
            Err(err) => {
                if let Err(e) = self.link.deinitialize().await {
                    debug!(error = %e, "Deinitialize after failed connect");
                }
                state.reset();
                Err(err.into())
            }
        }
    }

    /// Safe the laser and release the session. Always succeeds.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        self.cancel_ping_pong(&mut state).await;

        if state.session.connected {
            info!("Disconnecting from MIRcat");
            if state.session.scan_in_progress {
                let r = self.link.stop_scan().await;
                state.swallow("stop scan", r);
            }
            if state.session.emission_on {
                let r = self.link.emission_off().await;
                state.swallow("emission off", r);
            }
            if state.session.armed {
                let r = self.link.disarm().await;
                state.swallow("disarm", r);
            }
            let r = self.link.deinitialize().await;
            state.swallow("deinitialize", r);
        }

        state.reset();
        self.conclude(&mut state, Ok(()))
    }

    // ===== Arm / disarm =====

    /// Arm after interlock, key switch and fault checks; optionally wait for TEC stability.
    #[instrument(skip(self))]
    pub async fn arm(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.arm_inner(&mut state).await;
        self.conclude(&mut state, result)
    }

    async fn arm_inner(&self, state: &mut ControllerState) -> LaserResult<()> {
        Self::ensure_connected(state)?;
        if state.session.armed {
            return Ok(());
        }

        if !self.link.is_interlocked().await? {
            return Err(LaserError::InterlockFault("interlock circuit is open".into()));
        }
        if !self.link.is_key_switch_on().await? {
            return Err(LaserError::InterlockFault("key switch is off".into()));
        }
        if self.link.is_system_fault().await? {
            return Err(LaserError::SystemFault("laser reports a system fault".into()));
        }

        if let Err(err) = self.link.arm().await {
            self.disarm_after_failure(state).await;
            return Err(err.into());
        }
        let policy = self.config.timing.arm;
        match self.wait(policy, || self.link.is_armed()).await {
            Ok(PollOutcome::Ready { attempts }) => debug!(attempts, "Arm confirmed"),
            Ok(PollOutcome::TimedOut { .. }) => {
                self.disarm_after_failure(state).await;
                return Err(LaserError::Hardware(format!(
                    "arm not confirmed within {:?}",
                    policy.budget()
                )));
            }
            Err(err) => {
                self.disarm_after_failure(state).await;
                return Err(err);
            }
        }

        if self.config.wait_for_temperature {
            let policy = self.config.timing.temperature;
            match self.wait(policy, || self.link.is_temperature_stable()).await {
                Ok(PollOutcome::Ready { .. }) => state.session.temperature_stable = true,
                Ok(PollOutcome::TimedOut { .. }) => {
                    self.disarm_after_failure(state).await;
                    return Err(LaserError::TemperatureUnstable(policy.budget()));
                }
                Err(err) => {
                    self.disarm_after_failure(state).await;
                    return Err(err);
                }
            }
        }

        state.session.armed = true;
        info!("Laser armed");
        Ok(())
    }

    async fn disarm_after_failure(&self, state: &mut ControllerState) {
        let r = self.link.disarm().await;
        state.swallow("disarm after failed arm", r);
        state.session.clear_arm();
        state.session.temperature_stable = false;
    }

    /// Stop scans, end emission and disarm. Flags are reset whatever the hardware says.
    #[instrument(skip(self))]
    pub async fn disarm(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        self.cancel_ping_pong(&mut state).await;

        if state.session.connected {
            if state.session.scan_in_progress {
                let r = self.link.stop_scan().await;
                state.swallow("stop scan", r);
            }
            if state.session.emission_on {
                let r = self.link.emission_off().await;
                state.swallow("emission off", r);
            }
            let r = self.link.disarm().await;
            state.swallow("disarm", r);

            let policy = self.config.timing.disarm;
            match self.wait(policy, || async { self.link.is_armed().await.map(|armed| !armed) }).await {
                Ok(PollOutcome::Ready { .. }) => {}
                Ok(PollOutcome::TimedOut { .. }) => {
                    warn!("Laser still reports armed after disarm");
                    state.swallowed = Some(LaserError::Hardware(format!(
                        "disarm not confirmed within {:?}",
                        policy.budget()
                    )));
                }
                Err(err) => state.swallowed = Some(err),
            }
        }

        state.session.clear_arm();
        state.session.temperature_stable = false;
        state.scan = None;
        info!("Laser disarmed");
        self.conclude(&mut state, Ok(()))
    }

    // ===== Tuning =====

    /// Tune to `wavenumber` (cm⁻¹) on the QCL that covers it.
    #[instrument(skip(self))]
    pub async fn tune(&self, wavenumber: f64) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.tune_inner(&mut state, wavenumber).await;
        self.conclude(&mut state, result)
    }

    async fn tune_inner(&self, state: &mut ControllerState, wavenumber: f64) -> LaserResult<()> {
        self.config
            .wavenumber_range()
            .check("wavenumber", wavenumber)?;
        Self::ensure_connected(state)?;

        let qcl = self.config.qcl_for(wavenumber);
        state.session.tuned = false;
        self.link.tune_to(wavenumber, qcl).await?;

        let policy = self.config.timing.tune;
        match self.wait(policy, || self.link.is_tuned()).await? {
            PollOutcome::Ready { attempts } => {
                state.session.tuned = true;
                state.session.current_wavenumber = Some(wavenumber);
                state.session.current_qcl = Some(qcl);
                info!(wavenumber, qcl, attempts, "Tuned");
                Ok(())
            }
            PollOutcome::TimedOut { .. } => Err(LaserError::TuningTimeout {
                wavenumber,
                waited: policy.budget(),
            }),
        }
    }

    // ===== Emission =====

    /// Turn emission on and wait for the hardware to confirm it.
    ///
    /// Needs an armed and tuned laser. Any failure after the command was issued
    /// is followed by a best-effort emission off.
    #[instrument(skip(self))]
    pub async fn emission_on(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.emission_on_inner(&mut state).await;
        self.conclude(&mut state, result)
    }

    async fn emission_on_inner(&self, state: &mut ControllerState) -> LaserResult<()> {
        // armed implies connected: every disconnect path resets the session
        if !state.session.armed {
            return Err(LaserError::NotArmed("turning emission on"));
        }
        if !state.session.tuned {
            return Err(LaserError::NotTuned("turning emission on"));
        }
        if state.session.emission_on {
            return Ok(());
        }

        let policy = self.config.timing.emission;
        let confirmed = match self.link.emission_on().await {
            Ok(()) => self.wait(policy, || self.link.is_emitting()).await,
            Err(err) => Err(err.into()),
        };
        match confirmed {
            Ok(PollOutcome::Ready { .. }) => {
                state.session.emission_on = true;
                info!("Emission on");
                Ok(())
            }
            Ok(PollOutcome::TimedOut { .. }) => {
                self.emission_off_after_failure(state).await;
                Err(LaserError::EmissionTimeout(policy.budget()))
            }
            Err(err) => {
                self.emission_off_after_failure(state).await;
                Err(err)
            }
        }
    }

    async fn emission_off_after_failure(&self, state: &mut ControllerState) {
        let r = self.link.emission_off().await;
        state.swallow("emission off after failed emission on", r);
    }

    /// End emission. The flag is reset whatever the hardware says.
    #[instrument(skip(self))]
    pub async fn emission_off(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        if state.session.connected {
            let r = self.link.emission_off().await;
            state.swallow("emission off", r);
        }
        state.session.emission_on = false;
        info!("Emission off");
        self.conclude(&mut state, Ok(()))
    }

    // ===== Mode and pulse parameters =====

    /// Select the operating mode. Only configured modes are accepted.
    #[instrument(skip(self))]
    pub async fn set_mode(&self, mode: LaserMode) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.set_mode_inner(&mut state, mode).await;
        self.conclude(&mut state, result)
    }

    async fn set_mode_inner(&self, state: &mut ControllerState, mode: LaserMode) -> LaserResult<()> {
        if !self.config.parameters.laser_modes.contains(&mode) {
            return Err(LaserError::invalid(format!(
                "laser mode '{}' not enabled; valid modes: {}",
                mode,
                self.config
                    .parameters
                    .laser_modes
                    .iter()
                    .map(LaserMode::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Self::ensure_connected(state)?;
        self.link.set_laser_mode(mode).await?;
        state.session.laser_mode = mode;
        if mode != LaserMode::Pulsed {
            state.session.pulse = None;
        }
        info!(%mode, "Laser mode set");
        Ok(())
    }

    /// Pulse rate (Hz) and width (ns); pulsed mode only.
    #[instrument(skip(self))]
    pub async fn set_pulse_parameters(&self, rate_hz: u32, width_ns: u32) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.set_pulse_inner(&mut state, rate_hz, width_ns).await;
        self.conclude(&mut state, result)
    }

    async fn set_pulse_inner(
        &self,
        state: &mut ControllerState,
        rate_hz: u32,
        width_ns: u32,
    ) -> LaserResult<()> {
        let p = &self.config.parameters;
        if state.session.laser_mode != LaserMode::Pulsed {
            return Err(LaserError::invalid("pulse parameters only valid in Pulsed mode"));
        }
        if !(p.pulse_rate_min..=p.pulse_rate_max).contains(&rate_hz) {
            return Err(LaserError::invalid(format!(
                "pulse rate {} Hz outside valid range {}-{}",
                rate_hz, p.pulse_rate_min, p.pulse_rate_max
            )));
        }
        if !(p.pulse_width_min..=p.pulse_width_max).contains(&width_ns) {
            return Err(LaserError::invalid(format!(
                "pulse width {} ns outside valid range {}-{}",
                width_ns, p.pulse_width_min, p.pulse_width_max
            )));
        }
        Self::ensure_connected(state)?;
        self.link.set_pulse_parameters(rate_hz, width_ns).await?;
        state.session.pulse = Some(PulseParameters { rate_hz, width_ns });
        Ok(())
    }

    // ===== Scans =====

    /// Start a continuous sweep.
    ///
    /// Bidirectional sweeps fall back to alternating one-shot sweeps driven by a
    /// background task when the firmware does not honor the flag.
    #[instrument(skip(self))]
    pub async fn start_sweep(&self, request: SweepRequest) -> LaserResult<()> {
        self.start_scan(ScanRequest::Sweep(request)).await
    }

    /// Start a step-and-dwell scan.
    #[instrument(skip(self))]
    pub async fn start_step(&self, request: StepRequest) -> LaserResult<()> {
        self.start_scan(ScanRequest::Step(request)).await
    }

    /// Start a multispectral scan.
    #[instrument(skip(self))]
    pub async fn start_multispectral(&self, request: MultispectralRequest) -> LaserResult<()> {
        self.start_scan(ScanRequest::Multispectral(request)).await
    }

    /// Start a manual step scan. See [`manual_step`](Self::manual_step).
    #[instrument(skip(self))]
    pub async fn start_manual_step(&self, request: ManualStepRequest) -> LaserResult<()> {
        self.start_scan(ScanRequest::ManualStep(request)).await
    }

    async fn start_scan(&self, request: ScanRequest) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.start_scan_inner(&mut state, request).await;
        self.conclude(&mut state, result)
    }

    async fn start_scan_inner(
        &self,
        state: &mut ControllerState,
        request: ScanRequest,
    ) -> LaserResult<()> {
        Self::ensure_connected(state)?;
        if !state.session.armed {
            return Err(LaserError::NotArmed("starting a scan"));
        }
        let range = self.config.wavenumber_range();
        match &request {
            ScanRequest::Sweep(r) => r.validate(&range)?,
            ScanRequest::Step(r) => r.validate(&range)?,
            ScanRequest::Multispectral(r) => r.validate(&range)?,
            ScanRequest::ManualStep(r) => r.validate(&range)?,
        }

        // supersede whatever was running
        self.cancel_ping_pong(state).await;
        if state.session.scan_in_progress {
            let r = self.link.stop_scan().await;
            state.swallow("stop previous scan", r);
            state.clear_scan();
        }

        let mut job = ScanJob::new(request.clone());
        match &request {
            ScanRequest::Sweep(r) => {
                let qcl = self.config.qcl_for(r.start_wavenumber);
                self.link.start_sweep(&r.to_params(qcl)).await?;
                if r.bidirectional && self.config.scan.ping_pong_fallback {
                    match self.engage_ping_pong(r, qcl).await {
                        Ok(Some(handle)) => {
                            state.ping_pong = Some(handle);
                            job.ping_pong = true;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            let r = self.link.stop_scan().await;
                            state.swallow("stop scan after fallback failure", r);
                            return Err(err);
                        }
                    }
                }
            }
            ScanRequest::Step(r) => {
                let qcl = self.config.qcl_for(r.start_wavenumber);
                self.link.start_step(&r.to_params(qcl)).await?;
            }
            ScanRequest::Multispectral(r) => {
                self.link.start_multispectral(&r.to_params()).await?;
            }
            ScanRequest::ManualStep(r) => {
                let qcl = self.config.qcl_for(r.start_wavenumber);
                self.link.start_manual_step(&r.to_params(qcl)).await?;
            }
        }

        info!(mode = %job.mode(), ping_pong = job.ping_pong, "Scan started");
        state.session.scan_in_progress = true;
        state.session.current_scan_mode = job.mode();
        state.scan = Some(job);
        Ok(())
    }

    /// Replace a native bidirectional sweep by the software fallback when the
    /// firmware does not report the bidirectional flag.
    async fn engage_ping_pong(
        &self,
        request: &SweepRequest,
        qcl: u8,
    ) -> LaserResult<Option<PingPongHandle>> {
        let progress = self.link.scan_status().await?;
        if progress.bidirectional {
            return Ok(None);
        }

        warn!("Firmware did not honor bidirectional sweep, switching to software ping-pong");
        self.link.stop_scan().await?;

        let scan = &self.config.scan;
        let plan = PingPongPlan {
            start_wavenumber: request.start_wavenumber,
            end_wavenumber: request.end_wavenumber,
            speed: request.speed,
            num_scans: request.num_scans,
            qcl,
            poll_interval: scan.segment_poll_interval(),
            segment_timeout: scan.segment_timeout(request.segment_seconds()),
        };
        Ok(Some(ping_pong::spawn(self.link.clone(), plan)))
    }

    /// Advance an active manual step scan by one step.
    #[instrument(skip(self))]
    pub async fn manual_step(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        let result = self.manual_step_inner(&mut state).await;
        self.conclude(&mut state, result)
    }

    async fn manual_step_inner(&self, state: &mut ControllerState) -> LaserResult<()> {
        Self::ensure_connected(state)?;
        if !state.session.armed {
            return Err(LaserError::NotArmed("stepping a manual scan"));
        }
        if !(state.session.scan_in_progress
            && state.session.current_scan_mode == ScanMode::ManualStep)
        {
            return Err(LaserError::invalid("no manual step scan is active"));
        }
        self.link.manual_step_next().await?;
        let progress = self.link.scan_status().await?;
        if let Some(job) = state.scan.as_mut() {
            job.update_from(&progress);
        }
        if !progress.in_progress {
            state.clear_scan();
        }
        Ok(())
    }

    /// Cancel the fallback task, request a hardware stop, clear scan state.
    #[instrument(skip(self))]
    pub async fn stop_scan(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        self.cancel_ping_pong(&mut state).await;
        if state.session.connected {
            let r = self.link.stop_scan().await;
            state.swallow("stop scan", r);
        }
        state.clear_scan();
        info!("Scan stopped");
        self.conclude(&mut state, Ok(()))
    }

    async fn cancel_ping_pong(&self, state: &mut ControllerState) {
        if let Some(handle) = state.ping_pong.take() {
            let exit = handle.shutdown(self.config.scan.join_timeout()).await;
            debug!(?exit, "Ping-pong task joined");
            if exit.is_none() {
                state.swallowed = Some(LaserError::Hardware(
                    "ping-pong task did not stop and was aborted".into(),
                ));
            }
        }
    }

    // ===== Errors and status =====

    /// Reset the error record.
    #[instrument(skip(self))]
    pub async fn clear_error(&self) -> LaserResult<()> {
        let mut state = self.state.lock().await;
        state.swallowed = None;
        self.conclude(&mut state, Ok(()))
    }

    /// Fresh hardware snapshot. A communication failure ends the session.
    #[instrument(skip(self))]
    pub async fn status(&self) -> LaserResult<StatusReport> {
        let mut state = self.state.lock().await;
        let result = self.refresh(&mut state).await;
        if let Err(err) = &result {
            state.error.record(err);
        }
        let report = state.report();
        self.publish(&state);
        result.map(|()| report)
    }

    async fn refresh(&self, state: &mut ControllerState) -> LaserResult<()> {
        if !state.session.connected {
            state.status = HardwareStatus::disconnected();
            return Ok(());
        }

        let status = match HardwareStatus::read(self.link.as_ref()).await {
            Ok(status) => status,
            Err(e) => {
                let err = LaserError::from(e);
                if err.code() == ErrorCode::CommunicationError {
                    warn!(error = %err, "Lost communication with laser, resetting session");
                    self.cancel_ping_pong(state).await;
                    state.reset();
                }
                return Err(err);
            }
        };

        // hardware may only take flags down here; raising them needs an operation
        let session = &mut state.session;
        if !status.armed {
            session.clear_arm();
        }
        if !status.tuned {
            session.tuned = false;
        }
        if !status.emission {
            session.emission_on = false;
        }
        session.temperature_stable = status.temperature;
        state.status = status;

        self.refresh_scan(state).await
    }

    async fn refresh_scan(&self, state: &mut ControllerState) -> LaserResult<()> {
        if state.ping_pong.as_ref().is_some_and(PingPongHandle::is_finished) {
            if let Some(handle) = state.ping_pong.take() {
                let exit = handle.reap().await;
                info!(?exit, "Ping-pong task finished");
                state.clear_scan();
                match exit {
                    Some(PingPongExit::SafetyTimeout { segment }) => {
                        return Err(LaserError::Hardware(format!(
                            "ping-pong segment {} exceeded its safety timeout",
                            segment
                        )));
                    }
                    Some(PingPongExit::Failed(e)) => return Err(e.into()),
                    _ => return Ok(()),
                }
            }
        }

        if !state.session.scan_in_progress {
            return Ok(());
        }
        let progress = self.link.scan_status().await?;
        let fallback = state
            .ping_pong
            .as_ref()
            .map(|handle| handle.progress().cycles_completed());
        if let Some(job) = state.scan.as_mut() {
            job.update_from(&progress);
            if let Some(cycles) = fallback {
                job.current_scan_number = u16::try_from(cycles + 1).unwrap_or(u16::MAX);
            }
        }
        if fallback.is_none() && !progress.in_progress {
            debug!("Native scan finished");
            state.clear_scan();
        }
        Ok(())
    }

    /// Poll a link predicate, converting driver errors.
    async fn wait<F, Fut>(&self, policy: PollPolicy, predicate: F) -> LaserResult<PollOutcome>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = DriverResult<bool>>,
    {
        Ok(poll_until(policy, predicate).await?)
    }
}

impl std::fmt::Debug for LaserController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaserController")
            .field("driver", &self.link.driver_type())
            .finish_non_exhaustive()
    }
}
