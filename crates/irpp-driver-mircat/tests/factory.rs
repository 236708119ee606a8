//! Factory behavior on machines without the vendor SDK installed.

use irpp_core::driver::LinkFactory;
use irpp_driver_mircat::MircatFactory;

#[test]
fn validate_requires_sdk_path() {
    let factory = MircatFactory;
    assert_eq!(factory.driver_type(), "mircat_sdk");

    let empty = toml::Value::Table(toml::map::Map::new());
    assert!(factory.validate(&empty).is_err());

    let table: toml::Value = toml::from_str("sdk_path = '/opt/mircat'").unwrap();
    assert!(factory.validate(&table).is_ok());
}

#[test]
fn validate_rejects_wrong_types() {
    let table: toml::Value =
        toml::from_str("sdk_path = '/opt/mircat'\nnative_bidirectional = 'yes'").unwrap();
    assert!(MircatFactory.validate(&table).is_err());
}

#[tokio::test]
async fn build_reports_missing_library() {
    let dir = tempfile::tempdir().unwrap();
    let table: toml::Value = toml::from_str(&format!(
        "sdk_path = '{}'",
        dir.path().display().to_string().replace('\\', "/")
    ))
    .unwrap();

    let err = MircatFactory.build(table).await.err().unwrap();
    let message = format!("{:#}", err);
    assert!(message.contains("failed to load MIRcat SDK"), "{message}");
}
