//! Controller lifecycle tests against the simulated QCL.
//!
//! All tests run on paused tokio time; polling waits and scan durations
//! advance instantly. Assertions on hardware traffic use the simulator's
//! command log and query counter.

use irpp_core::error::ErrorCode;
use irpp_core::polling::PollPolicy;
use irpp_core::scan::{ManualStepRequest, MultispectralRequest, MultispectralTarget, StepRequest};
use irpp_core::session::{LaserMode, ScanMode};
use irpp_driver_mock::{ErrorConfig, ErrorScenario, LinkCommand, MockQclConfig, SimulatedQcl};
use irpp_hardware::config::{LaserConfig, QclRange};
use irpp_hardware::LaserController;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Helpers
// =============================================================================

fn rig_with(mock: MockQclConfig, config: LaserConfig) -> (Arc<SimulatedQcl>, LaserController) {
    let qcl = Arc::new(SimulatedQcl::new(mock));
    let controller = LaserController::new(qcl.clone(), config);
    (qcl, controller)
}

fn rig() -> (Arc<SimulatedQcl>, LaserController) {
    rig_with(MockQclConfig::default(), LaserConfig::default())
}

async fn connected() -> (Arc<SimulatedQcl>, LaserController) {
    let (qcl, controller) = rig();
    controller.connect().await.unwrap();
    (qcl, controller)
}

async fn armed_and_tuned() -> (Arc<SimulatedQcl>, LaserController) {
    let (qcl, controller) = connected().await;
    controller.arm().await.unwrap();
    controller.tune(1800.0).await.unwrap();
    (qcl, controller)
}

fn step_request(num_scans: i32) -> StepRequest {
    StepRequest {
        start_wavenumber: 1800.0,
        end_wavenumber: 1810.0,
        step_size: 1.0,
        dwell_ms: 100,
        off_ms: 0,
        num_scans,
        bidirectional: false,
    }
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent() {
    let (qcl, controller) = connected().await;
    controller.connect().await.unwrap();

    let inits = qcl
        .commands()
        .into_iter()
        .filter(|c| *c == LinkCommand::Initialize)
        .count();
    assert_eq!(inits, 1);
    assert!(controller.snapshot().await.session.connected);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_leaves_session_closed() {
    let (_qcl, controller) = rig_with(
        MockQclConfig {
            device_present: false,
            ..Default::default()
        },
        LaserConfig::default(),
    );

    let err = controller.connect().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SdkError);

    let report = controller.snapshot().await;
    assert!(!report.session.connected);
    assert_eq!(report.error.last_error_code, Some(ErrorCode::SdkError));
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_all_flags() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.emission_on().await.unwrap();
    controller.start_step(step_request(0)).await.unwrap();

    let before = controller.snapshot().await.session;
    assert!(before.armed && before.tuned && before.emission_on && before.scan_in_progress);

    qcl.clear_log();
    controller.disconnect().await.unwrap();

    let session = controller.snapshot().await.session;
    assert!(!session.connected);
    assert!(!session.armed);
    assert!(!session.emission_on);
    assert!(!session.tuned);
    assert!(!session.scan_in_progress);
    assert_eq!(session.current_scan_mode, ScanMode::None);
    assert_eq!(
        qcl.commands(),
        vec![
            LinkCommand::StopScan,
            LinkCommand::EmissionOff,
            LinkCommand::Disarm,
            LinkCommand::Deinitialize,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_succeeds_when_link_is_dead() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.emission_on().await.unwrap();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss));

    controller.disconnect().await.unwrap();

    let report = controller.snapshot().await;
    assert!(!report.session.connected);
    assert!(!report.session.armed);
    assert!(!report.session.emission_on);
    assert!(!report.session.tuned);
    assert_eq!(
        report.error.last_error_code,
        Some(ErrorCode::CommunicationError)
    );
}

#[tokio::test(start_paused = true)]
async fn status_communication_loss_resets_session() {
    let (qcl, controller) = armed_and_tuned().await;
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss));

    let err = controller.status().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CommunicationError);

    let report = controller.snapshot().await;
    assert!(!report.session.connected);
    assert!(!report.session.armed);
    assert!(report.status.system_fault);
    assert_eq!(
        report.error.last_error_code,
        Some(ErrorCode::CommunicationError)
    );
}

#[tokio::test(start_paused = true)]
async fn status_when_disconnected_issues_no_hardware_calls() {
    let (qcl, controller) = rig();
    let report = controller.status().await.unwrap();
    assert!(!report.session.connected);
    assert!(!report.status.connected);
    assert!(qcl.commands().is_empty());
    assert_eq!(qcl.query_count(), 0);
}

// =============================================================================
// Arm / disarm
// =============================================================================

#[tokio::test(start_paused = true)]
async fn arm_waits_for_temperature() {
    let (_qcl, controller) = connected().await;
    let started = tokio::time::Instant::now();
    controller.arm().await.unwrap();

    let session = controller.snapshot().await.session;
    assert!(session.armed);
    assert!(session.temperature_stable);
    // default simulator settles TECs 1.5 s after the arm command
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn arm_with_open_interlock_sends_no_arm_command() {
    let (qcl, controller) = connected().await;
    qcl.set_interlock(false);
    qcl.clear_log();

    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InterlockFault);
    assert!(!qcl.commands().contains(&LinkCommand::Arm));
    assert!(!controller.snapshot().await.session.armed);
}

#[tokio::test(start_paused = true)]
async fn arm_with_key_switch_off_is_interlock_fault() {
    let (qcl, controller) = connected().await;
    qcl.set_key_switch(false);
    qcl.clear_log();

    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InterlockFault);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn arm_with_system_fault_is_refused() {
    let (qcl, controller) = connected().await;
    qcl.set_system_fault(true);
    qcl.clear_log();

    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SystemFault);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_arm_command_is_followed_by_disarm() {
    let (qcl, controller) = connected().await;
    qcl.clear_log();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::SdkFailure {
        operation: "arm",
        code: 2,
    }));

    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SdkError);
    assert_eq!(qcl.commands(), vec![LinkCommand::Arm, LinkCommand::Disarm]);
    assert!(!controller.snapshot().await.session.armed);
}

#[tokio::test(start_paused = true)]
async fn arm_requires_connection() {
    let (qcl, controller) = rig();
    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unstable_temperature_disarms() {
    let mut config = LaserConfig::default();
    config.timing.temperature = PollPolicy::new(100, 5);
    let (qcl, controller) = rig_with(
        MockQclConfig {
            temperature_settle_ms: 60_000,
            ..Default::default()
        },
        config,
    );
    controller.connect().await.unwrap();

    let err = controller.arm().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TemperatureUnstable);
    assert_eq!(qcl.commands().last(), Some(&LinkCommand::Disarm));

    let session = controller.snapshot().await.session;
    assert!(!session.armed);
    assert!(!session.temperature_stable);
}

#[tokio::test(start_paused = true)]
async fn arm_skips_temperature_wait_when_disabled() {
    let config = LaserConfig {
        wait_for_temperature: false,
        ..Default::default()
    };
    let (_qcl, controller) = rig_with(
        MockQclConfig {
            temperature_settle_ms: 60_000,
            ..Default::default()
        },
        config,
    );
    controller.connect().await.unwrap();
    controller.arm().await.unwrap();
    assert!(controller.snapshot().await.session.armed);
}

#[tokio::test(start_paused = true)]
async fn disarm_when_disconnected_is_a_no_op() {
    let (qcl, controller) = rig();
    controller.disarm().await.unwrap();
    assert!(qcl.commands().is_empty());
    assert!(!controller.snapshot().await.session.armed);
}

#[tokio::test(start_paused = true)]
async fn disarm_ends_emission_and_keeps_tuning() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.emission_on().await.unwrap();
    qcl.clear_log();

    controller.disarm().await.unwrap();

    assert_eq!(
        qcl.commands(),
        vec![LinkCommand::EmissionOff, LinkCommand::Disarm]
    );
    let session = controller.snapshot().await.session;
    assert!(!session.armed);
    assert!(!session.emission_on);
    assert!(session.tuned);
}

// =============================================================================
// Tuning
// =============================================================================

#[tokio::test(start_paused = true)]
async fn tune_out_of_range_issues_no_hardware_call() {
    let (qcl, controller) = armed_and_tuned().await;
    qcl.clear_log();

    for wavenumber in [1500.0, 1638.8, 2077.28, 3000.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = controller.tune(wavenumber).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter, "{wavenumber}");
    }
    assert!(qcl.commands().is_empty());
    assert_eq!(qcl.query_count(), 0);
    assert_eq!(
        controller.snapshot().await.session.current_wavenumber,
        Some(1800.0)
    );
}

#[tokio::test(start_paused = true)]
async fn tune_out_of_range_when_disconnected_is_invalid_parameter() {
    let (qcl, controller) = rig();
    let err = controller.tune(4000.0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tune_in_range_requires_connection() {
    let (_qcl, controller) = rig();
    let err = controller.tune(1800.0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
}

#[tokio::test(start_paused = true)]
async fn tune_selects_qcl_chip() {
    let config = LaserConfig {
        qcls: vec![
            QclRange {
                qcl: 1,
                min: 1638.81,
                max: 1850.0,
            },
            QclRange {
                qcl: 2,
                min: 1850.0,
                max: 2077.27,
            },
        ],
        ..Default::default()
    };
    let (qcl, controller) = rig_with(MockQclConfig::default(), config);
    controller.connect().await.unwrap();
    controller.tune(1900.0).await.unwrap();

    assert!(qcl.commands().contains(&LinkCommand::TuneTo {
        wavenumber: 1900.0,
        qcl: 2
    }));
    let session = controller.snapshot().await.session;
    assert!(session.tuned);
    assert_eq!(session.current_wavenumber, Some(1900.0));
    assert_eq!(session.current_qcl, Some(2));
}

#[tokio::test(start_paused = true)]
async fn tune_timeout_checks_exactly_max_attempts() {
    let mut config = LaserConfig::default();
    config.timing.tune = PollPolicy::new(100, 7);
    let (qcl, controller) = rig_with(
        MockQclConfig {
            tune_delay_ms: 60_000,
            ..Default::default()
        },
        config,
    );
    controller.connect().await.unwrap();
    qcl.clear_log();

    let started = tokio::time::Instant::now();
    let err = controller.tune(1800.0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TuningTimeout);
    assert_eq!(qcl.query_count(), 7);
    assert_eq!(started.elapsed(), Duration::from_millis(600));
    assert!(!controller.snapshot().await.session.tuned);
}

// =============================================================================
// Emission
// =============================================================================

#[tokio::test(start_paused = true)]
async fn emission_requires_arm_then_tune() {
    let (qcl, controller) = connected().await;
    qcl.clear_log();

    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotArmed);

    controller.tune(1800.0).await.unwrap();
    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotArmed);
    assert!(!qcl.commands().contains(&LinkCommand::EmissionOn));

    let (qcl, controller) = connected().await;
    controller.arm().await.unwrap();
    qcl.clear_log();
    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotTuned);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn emission_on_confirms_and_off_always_resets() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.emission_on().await.unwrap();
    assert!(controller.snapshot().await.session.emission_on);

    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::SdkFailure {
        operation: "emission_off",
        code: 7,
    }));
    controller.emission_off().await.unwrap();

    let report = controller.snapshot().await;
    assert!(!report.session.emission_on);
    assert_eq!(report.error.last_error_code, Some(ErrorCode::SdkError));
}

#[tokio::test(start_paused = true)]
async fn emission_timeout_turns_emission_back_off() {
    let (qcl, controller) = rig_with(
        MockQclConfig {
            emission_delay_ms: 60_000,
            ..Default::default()
        },
        LaserConfig::default(),
    );
    controller.connect().await.unwrap();
    controller.arm().await.unwrap();
    controller.tune(1800.0).await.unwrap();

    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::EmissionTimeout);
    assert_eq!(qcl.commands().last(), Some(&LinkCommand::EmissionOff));
    assert!(!controller.snapshot().await.session.emission_on);
}

#[tokio::test(start_paused = true)]
async fn emission_when_disconnected_is_not_armed() {
    let (qcl, controller) = rig();

    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotArmed);
    assert!(qcl.commands().is_empty());
    assert_eq!(qcl.query_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn emission_confirmation_failure_turns_emission_back_off() {
    let (qcl, controller) = armed_and_tuned().await;
    qcl.clear_log();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::SdkFailure {
        operation: "is_emitting",
        code: 3,
    }));

    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SdkError);
    assert_eq!(
        qcl.commands(),
        vec![LinkCommand::EmissionOn, LinkCommand::EmissionOff]
    );

    let report = controller.snapshot().await;
    assert!(!report.session.emission_on);
    assert!(report.session.armed);
    assert_eq!(report.error.last_error_code, Some(ErrorCode::SdkError));
}

#[tokio::test(start_paused = true)]
async fn emission_command_failure_turns_emission_back_off() {
    let (qcl, controller) = armed_and_tuned().await;
    qcl.clear_log();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::SdkFailure {
        operation: "emission_on",
        code: 5,
    }));

    let err = controller.emission_on().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SdkError);
    assert_eq!(qcl.commands().last(), Some(&LinkCommand::EmissionOff));
    assert!(!controller.snapshot().await.session.emission_on);
}

// =============================================================================
// Mode and pulse parameters
// =============================================================================

#[tokio::test(start_paused = true)]
async fn set_mode_rejects_disabled_mode() {
    let mut config = LaserConfig::default();
    config.parameters.laser_modes = vec![LaserMode::Pulsed];
    let (qcl, controller) = rig_with(MockQclConfig::default(), config);
    controller.connect().await.unwrap();
    qcl.clear_log();

    let err = controller.set_mode(LaserMode::Cw).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pulse_parameters_require_pulsed_mode_and_valid_ranges() {
    let (qcl, controller) = connected().await;

    controller.set_pulse_parameters(100_000, 500).await.unwrap();
    assert!(qcl.commands().contains(&LinkCommand::SetPulseParameters {
        rate_hz: 100_000,
        width_ns: 500
    }));

    let err = controller.set_pulse_parameters(5, 500).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
    let err = controller.set_pulse_parameters(100_000, 5000).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);

    controller.set_mode(LaserMode::Cw).await.unwrap();
    let session = controller.snapshot().await.session;
    assert_eq!(session.laser_mode, LaserMode::Cw);
    assert!(session.pulse.is_none());

    let err = controller.set_pulse_parameters(100_000, 500).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
}

// =============================================================================
// Scans
// =============================================================================

#[tokio::test(start_paused = true)]
async fn scan_requires_arm() {
    let (qcl, controller) = connected().await;
    qcl.clear_log();

    let err = controller.start_step(step_request(1)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotArmed);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_scan_parameters_are_rejected_locally() {
    let (qcl, controller) = armed_and_tuned().await;
    qcl.clear_log();

    let mut request = step_request(1);
    request.end_wavenumber = 2500.0;
    let err = controller.start_step(request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);

    let err = controller
        .start_multispectral(MultispectralRequest {
            targets: Vec::new(),
            num_scans: 1,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
    assert!(qcl.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_positive_repeat_count_runs_indefinitely() {
    let (qcl, controller) = armed_and_tuned().await;

    for num_scans in [0, -1, -100] {
        controller.start_step(step_request(num_scans)).await.unwrap();
        let started = qcl.commands().into_iter().rev().find_map(|c| match c {
            LinkCommand::StartStep(params) => Some(params),
            _ => None,
        });
        assert_eq!(started.map(|p| p.num_scans), Some(u16::MAX));
        controller.stop_scan().await.unwrap();
    }

    controller
        .start_multispectral(MultispectralRequest {
            targets: vec![MultispectralTarget {
                wavenumber: 1900.0,
                dwell_ms: 50,
                off_ms: 0,
            }],
            num_scans: 0,
        })
        .await
        .unwrap();
    assert!(matches!(
        qcl.commands().last(),
        Some(LinkCommand::StartMultispectral(p)) if p.num_scans == u16::MAX
    ));
}

#[tokio::test(start_paused = true)]
async fn finished_native_scan_is_cleared_by_status() {
    let (_qcl, controller) = armed_and_tuned().await;
    controller.start_step(step_request(1)).await.unwrap();

    let report = controller.status().await.unwrap();
    assert!(report.session.scan_in_progress);
    assert_eq!(report.session.current_scan_mode, ScanMode::Step);

    // 11 steps of 100 ms
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let report = controller.status().await.unwrap();
    assert!(!report.session.scan_in_progress);
    assert_eq!(report.session.current_scan_mode, ScanMode::None);
    assert!(report.scan.is_none());
}

#[tokio::test(start_paused = true)]
async fn new_scan_supersedes_running_scan() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.start_step(step_request(0)).await.unwrap();
    qcl.clear_log();

    controller
        .start_multispectral(MultispectralRequest {
            targets: vec![MultispectralTarget {
                wavenumber: 1900.0,
                dwell_ms: 50,
                off_ms: 0,
            }],
            num_scans: 1,
        })
        .await
        .unwrap();

    assert!(matches!(
        qcl.commands().as_slice(),
        [LinkCommand::StopScan, LinkCommand::StartMultispectral(_)]
    ));
    assert_eq!(
        controller.snapshot().await.session.current_scan_mode,
        ScanMode::Multispectral
    );
}

#[tokio::test(start_paused = true)]
async fn stop_scan_clears_state_even_when_hardware_fails() {
    let (qcl, controller) = armed_and_tuned().await;
    controller.start_step(step_request(0)).await.unwrap();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::SdkFailure {
        operation: "stop_scan",
        code: 12,
    }));

    controller.stop_scan().await.unwrap();

    let report = controller.snapshot().await;
    assert!(!report.session.scan_in_progress);
    assert_eq!(report.session.current_scan_mode, ScanMode::None);
    assert!(report.scan.is_none());
    assert_eq!(report.error.last_error_code, Some(ErrorCode::SdkError));
}

#[tokio::test(start_paused = true)]
async fn manual_step_scan_advances_until_done() {
    let (qcl, controller) = armed_and_tuned().await;

    let err = controller.manual_step().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameter);

    controller
        .start_manual_step(ManualStepRequest {
            start_wavenumber: 1800.0,
            end_wavenumber: 1802.0,
            step_size: 1.0,
            num_scans: 1,
            bidirectional: false,
        })
        .await
        .unwrap();

    for _ in 0..2 {
        controller.manual_step().await.unwrap();
        assert!(controller.snapshot().await.session.scan_in_progress);
    }
    controller.manual_step().await.unwrap();

    let session = controller.snapshot().await.session;
    assert!(!session.scan_in_progress);
    assert_eq!(session.current_scan_mode, ScanMode::None);
    let steps = qcl
        .commands()
        .into_iter()
        .filter(|c| *c == LinkCommand::ManualStepNext)
        .count();
    assert_eq!(steps, 3);
}

// =============================================================================
// Error record policy
// =============================================================================

#[tokio::test(start_paused = true)]
async fn error_record_follows_operation_outcome() {
    let (_qcl, controller) = connected().await;

    controller.emission_on().await.unwrap_err();
    let report = controller.snapshot().await;
    assert_eq!(report.error.last_error_code, Some(ErrorCode::NotArmed));
    assert!(report.error.last_error.is_some());

    // status never clears
    let report = controller.status().await.unwrap();
    assert_eq!(report.error.last_error_code, Some(ErrorCode::NotArmed));

    // next clean success does
    controller.arm().await.unwrap();
    assert!(!controller.snapshot().await.error.is_set());

    controller.tune(9999.0).await.unwrap_err();
    controller.clear_error().await.unwrap();
    assert!(!controller.snapshot().await.error.is_set());
}

#[tokio::test(start_paused = true)]
async fn every_operation_publishes_a_report() {
    let (_qcl, controller) = rig();
    let mut reports = controller.subscribe();

    controller.connect().await.unwrap();
    let report = reports.recv().await.unwrap();
    assert!(report.session.connected);

    controller.emission_on().await.unwrap_err();
    let report = reports.recv().await.unwrap();
    assert_eq!(report.error.last_error_code, Some(ErrorCode::NotArmed));
}

#[tokio::test(start_paused = true)]
async fn report_serializes_flat() {
    let (_qcl, controller) = armed_and_tuned().await;
    let report = controller.status().await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["connected"], true);
    assert_eq!(json["armed"], true);
    assert_eq!(json["current_wavenumber"], 1800.0);
    assert_eq!(json["laser_mode"], "Pulsed");
    assert_eq!(json["status"]["interlocks"], true);
    assert!(json["last_error"].is_null());
}
