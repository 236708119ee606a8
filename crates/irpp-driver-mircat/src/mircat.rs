//! MIRcat SDK implementation of [`HardwareLink`].
//!
//! The SDK is blocking and not reentrant. Every call runs on the tokio
//! blocking pool while holding the link's call lock, so at most one SDK call
//! per laser is in flight even when the ping-pong task and a status request
//! overlap.

use crate::sdk::{MircatSdk, SdkFailure};
use crate::DRIVER_TYPE;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use irpp_core::capabilities::{HardwareLink, ScanProgress, Temperatures};
use irpp_core::driver::LinkFactory;
use irpp_core::error::{DriverError, DriverErrorKind, DriverResult};
use irpp_core::scan::{ManualStepParams, MultispectralParams, StepParams, SweepParams};
use irpp_core::session::LaserMode;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// `[daylight_mircat.sdk]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MircatConfig {
    /// Directory containing the SDK library.
    pub sdk_path: PathBuf,
    /// File name inside `sdk_path`. Defaults to the platform name.
    pub library_name: String,
    /// Whether this firmware honors the bidirectional sweep flag. When
    /// `false`, bidirectional sweeps report as unidirectional so the
    /// controller runs them in software.
    pub native_bidirectional: bool,
}

impl Default for MircatConfig {
    fn default() -> Self {
        Self {
            sdk_path: PathBuf::new(),
            library_name: default_library_name().to_string(),
            native_bidirectional: false,
        }
    }
}

fn default_library_name() -> &'static str {
    if cfg!(windows) {
        "MIRcatSDK.dll"
    } else if cfg!(target_os = "macos") {
        "libMIRcatSDK.dylib"
    } else {
        "libMIRcatSDK.so"
    }
}

impl MircatConfig {
    /// Parse a `[daylight_mircat.sdk]` table.
    pub fn from_toml(value: &toml::Value) -> Result<Self> {
        let cfg: MircatConfig = value.clone().try_into()?;
        if cfg.sdk_path.as_os_str().is_empty() {
            return Err(anyhow!("sdk_path is required for the MIRcat SDK driver"));
        }
        if cfg.library_name.trim().is_empty() {
            return Err(anyhow!("library_name cannot be empty"));
        }
        Ok(cfg)
    }

    /// Full path of the library to load.
    pub fn library_path(&self) -> PathBuf {
        self.sdk_path.join(&self.library_name)
    }
}

// =============================================================================
// MircatFactory
// =============================================================================

/// Factory for [`MircatLink`].
pub struct MircatFactory;

impl LinkFactory for MircatFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Daylight MIRcat (vendor SDK)"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        MircatConfig::from_toml(config).map(|_| ())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<Arc<dyn HardwareLink>>> {
        Box::pin(async move {
            let cfg = MircatConfig::from_toml(&config)?;
            let link = MircatLink::open(cfg).await?;
            Ok(Arc::new(link) as Arc<dyn HardwareLink>)
        })
    }
}

// =============================================================================
// MircatLink
// =============================================================================

struct Shared {
    sdk: MircatSdk,
    call_lock: Mutex<()>,
}

/// Link to a MIRcat laser through the vendor SDK.
pub struct MircatLink {
    shared: Arc<Shared>,
    native_bidirectional: bool,
    /// Chip selected by the most recent tune; pulse parameters apply to it.
    active_qcl: AtomicU8,
    /// Whether the last started sweep asked for bidirectional traversal.
    sweep_bidirectional: AtomicBool,
}

impl MircatLink {
    /// Load the SDK library. The laser session itself opens on `initialize`.
    pub async fn open(config: MircatConfig) -> DriverResult<Self> {
        let path = config.library_path();
        let sdk = tokio::task::spawn_blocking(move || MircatSdk::load(&path))
            .await
            .map_err(join_error)??;
        info!(path = %sdk.path().display(), "MIRcat SDK ready");
        Ok(Self {
            shared: Arc::new(Shared {
                sdk,
                call_lock: Mutex::new(()),
            }),
            native_bidirectional: config.native_bidirectional,
            active_qcl: AtomicU8::new(1),
            sweep_bidirectional: AtomicBool::new(false),
        })
    }

    /// Run one SDK call on the blocking pool under the call lock.
    async fn run<T, F>(&self, f: F) -> DriverResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&MircatSdk) -> Result<T, SdkFailure> + Send + 'static,
    {
        let shared = self.shared.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _guard = shared.call_lock.lock();
            f(&shared.sdk)
        })
        .await
        .map_err(join_error)?;
        result.map_err(|failure| {
            debug!(%failure, "MIRcat SDK call failed");
            DriverError::from(failure)
        })
    }
}

fn join_error(e: tokio::task::JoinError) -> DriverError {
    DriverError::new(
        DRIVER_TYPE,
        DriverErrorKind::Unknown,
        format!("SDK call did not complete: {}", e),
    )
}

fn mode_code(mode: LaserMode) -> u8 {
    match mode {
        LaserMode::Pulsed => 1,
        LaserMode::Cw => 2,
        LaserMode::CwModulation => 3,
    }
}

#[async_trait]
impl HardwareLink for MircatLink {
    fn driver_type(&self) -> &str {
        DRIVER_TYPE
    }

    async fn initialize(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.initialize()).await
    }

    async fn deinitialize(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.deinitialize()).await
    }

    async fn arm(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.arm()).await
    }

    async fn disarm(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.disarm()).await
    }

    async fn tune_to(&self, wavenumber: f64, qcl: u8) -> DriverResult<()> {
        self.run(move |sdk| sdk.tune(wavenumber as f32, qcl)).await?;
        self.active_qcl.store(qcl, Ordering::Release);
        Ok(())
    }

    async fn emission_on(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.emission_on()).await
    }

    async fn emission_off(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.emission_off()).await
    }

    async fn set_laser_mode(&self, mode: LaserMode) -> DriverResult<()> {
        let code = mode_code(mode);
        self.run(move |sdk| sdk.set_laser_mode(code)).await
    }

    async fn set_pulse_parameters(&self, rate_hz: u32, width_ns: u32) -> DriverResult<()> {
        let qcl = self.active_qcl.load(Ordering::Acquire);
        self.run(move |sdk| sdk.set_pulse_params(qcl, rate_hz as f32, width_ns as f32))
            .await
    }

    async fn is_armed(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_armed()).await
    }

    async fn is_tuned(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_tuned()).await
    }

    async fn is_emitting(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_emitting()).await
    }

    async fn is_interlocked(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_interlocked()).await
    }

    async fn is_key_switch_on(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_key_switch_on()).await
    }

    async fn is_temperature_stable(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_temperature_stable()).await
    }

    async fn is_system_fault(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_system_fault()).await
    }

    async fn is_pointing_compensated(&self) -> DriverResult<bool> {
        self.run(|sdk| sdk.is_pointing_compensated()).await
    }

    async fn temperatures(&self) -> DriverResult<Temperatures> {
        let (case_1, case_2, pcb) = self.run(|sdk| sdk.temperatures()).await?;
        Ok(Temperatures {
            case_temp_1: f64::from(case_1),
            case_temp_2: f64::from(case_2),
            pcb_temperature: f64::from(pcb),
        })
    }

    async fn start_sweep(&self, params: &SweepParams) -> DriverResult<()> {
        let p = *params;
        self.run(move |sdk| {
            sdk.start_sweep(
                p.start_wavenumber as f32,
                p.end_wavenumber as f32,
                p.speed as f32,
                p.num_scans,
                p.bidirectional,
                p.qcl,
            )
        })
        .await?;
        self.sweep_bidirectional
            .store(p.bidirectional, Ordering::Release);
        Ok(())
    }

    async fn start_step(&self, params: &StepParams) -> DriverResult<()> {
        let p = *params;
        self.run(move |sdk| {
            sdk.start_step(
                p.start_wavenumber as f32,
                p.end_wavenumber as f32,
                p.step_size as f32,
                p.dwell_ms,
                p.off_ms,
                p.num_scans,
                p.bidirectional,
                p.qcl,
            )
        })
        .await
    }

    async fn start_multispectral(&self, params: &MultispectralParams) -> DriverResult<()> {
        if params.targets.len() > usize::from(u8::MAX) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!(
                    "{} multispectral targets exceed the SDK limit of {}",
                    params.targets.len(),
                    u8::MAX
                ),
            ));
        }
        let elements: Vec<(f32, u32, u32)> = params
            .targets
            .iter()
            .map(|t| (t.wavenumber as f32, t.dwell_ms, t.off_ms))
            .collect();
        let num_scans = params.num_scans;
        self.run(move |sdk| sdk.start_multispectral(&elements, num_scans))
            .await
    }

    async fn start_manual_step(&self, params: &ManualStepParams) -> DriverResult<()> {
        let p = *params;
        self.run(move |sdk| {
            sdk.start_manual_step(
                p.start_wavenumber as f32,
                p.end_wavenumber as f32,
                p.step_size as f32,
                p.num_scans,
                p.bidirectional,
                p.qcl,
            )
        })
        .await
    }

    async fn manual_step_next(&self) -> DriverResult<()> {
        self.run(|sdk| sdk.next_manual_step()).await
    }

    async fn stop_scan(&self) -> DriverResult<()> {
        self.sweep_bidirectional.store(false, Ordering::Release);
        self.run(|sdk| sdk.stop_scan()).await
    }

    async fn scan_status(&self) -> DriverResult<ScanProgress> {
        let raw = self.run(|sdk| sdk.scan_status()).await?;
        let bidirectional = raw.in_progress
            && self.native_bidirectional
            && self.sweep_bidirectional.load(Ordering::Acquire);
        Ok(ScanProgress {
            in_progress: raw.in_progress,
            active: raw.active,
            bidirectional,
            current_scan_number: raw.scan_number,
            percent_complete: raw.percent,
            current_wavenumber: f64::from(raw.wavenumber),
        })
    }
}
