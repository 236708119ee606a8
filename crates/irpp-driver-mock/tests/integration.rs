//! Integration tests for the simulated QCL through the `HardwareLink` trait object.

use irpp_core::capabilities::HardwareLink;
use irpp_core::driver::LinkFactory;
use irpp_core::scan::{MultispectralParams, MultispectralTarget, StepParams};
use irpp_core::status::HardwareStatus;
use irpp_driver_mock::*;
use std::sync::Arc;
use std::time::Duration;

async fn armed_link() -> Arc<dyn HardwareLink> {
    let config: toml::Value = toml::from_str(
        r#"
        arm_delay_ms = 0
        tune_delay_ms = 0
        emission_delay_ms = 0
        temperature_settle_ms = 0
        "#,
    )
    .unwrap();
    let link = MockQclFactory.build(config).await.unwrap();
    link.initialize().await.unwrap();
    link.arm().await.unwrap();
    link
}

#[tokio::test(start_paused = true)]
async fn test_factory_builds_uninitialized_link() {
    let link = MockQclFactory
        .build(toml::Value::Table(Default::default()))
        .await
        .unwrap();
    assert_eq!(link.driver_type(), "mock");
    assert!(link.is_armed().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot_reads_all_getters() {
    let qcl = SimulatedQcl::new(MockQclConfig::default());
    qcl.initialize().await.unwrap();

    let status = HardwareStatus::read(&qcl).await.unwrap();
    assert!(status.connected);
    assert!(status.interlocks);
    assert!(status.key_switch);
    assert!(!status.system_fault);
    assert!(!status.armed);
    assert!(status.pcb_temperature > 0.0);
    // nine getters, nothing cached
    assert_eq!(qcl.query_count(), 9);

    HardwareStatus::read(&qcl).await.unwrap();
    assert_eq!(qcl.query_count(), 18);
}

#[tokio::test(start_paused = true)]
async fn test_step_scan_duration() {
    let link = armed_link().await;
    // 11 steps of 100 ms dwell + 50 ms off, twice
    link.start_step(&StepParams {
        start_wavenumber: 1700.0,
        end_wavenumber: 1710.0,
        step_size: 1.0,
        dwell_ms: 100,
        off_ms: 50,
        num_scans: 2,
        bidirectional: false,
        qcl: 1,
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(3299)).await;
    assert!(link.scan_status().await.unwrap().in_progress);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!link.scan_status().await.unwrap().in_progress);
}

#[tokio::test(start_paused = true)]
async fn test_second_scan_rejected_while_running() {
    let link = armed_link().await;
    let params = MultispectralParams {
        targets: vec![
            MultispectralTarget {
                wavenumber: 1700.0,
                dwell_ms: 500,
                off_ms: 0,
            },
            MultispectralTarget {
                wavenumber: 1900.0,
                dwell_ms: 500,
                off_ms: 0,
            },
        ],
        num_scans: 1,
    };
    link.start_multispectral(&params).await.unwrap();
    assert!(link.start_multispectral(&params).await.is_err());

    link.stop_scan().await.unwrap();
    link.start_multispectral(&params).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_communication_loss_affects_every_call() {
    let qcl = SimulatedQcl::new(MockQclConfig::default());
    qcl.initialize().await.unwrap();
    qcl.set_error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss));

    assert!(HardwareStatus::read(&qcl).await.is_err());
    assert!(qcl.disarm().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_missing_device_fails_initialize() {
    let qcl = SimulatedQcl::new(MockQclConfig {
        device_present: false,
        ..Default::default()
    });
    let err = qcl.initialize().await.unwrap_err();
    assert_eq!(err.kind, irpp_core::DriverErrorKind::Initialization);
}
