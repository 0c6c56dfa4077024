//! Integration tests for error handling in zkweave-runtime

use zkweave_runtime::ZkWeaveError;

#[test]
fn test_invalid_config_error_message() {
    let error = ZkWeaveError::invalid_config("knownTokenInterfaces[0] is empty");

    let error_msg = error.to_string();
    assert!(error_msg.contains("Invalid configuration"));
    assert!(error_msg.contains("knownTokenInterfaces[0]"));
}

#[test]
fn test_serialization_error_message() {
    let error = ZkWeaveError::serialization_error("invalid JSON format");

    let error_msg = error.to_string();
    assert!(error_msg.contains("Serialization error"));
    assert!(error_msg.contains("invalid JSON format"));
}

#[test]
fn test_other_error_message() {
    let error = ZkWeaveError::other("unexpected error occurred");
    assert_eq!(error.to_string(), "unexpected error occurred");
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json missing");
    let error: ZkWeaveError = io_error.into();

    let error_msg = error.to_string();
    assert!(error_msg.contains("I/O error"));
    assert!(error_msg.contains("config.json missing"));
}

#[test]
fn test_serde_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
    let error: ZkWeaveError = json_error.into();

    assert!(matches!(error, ZkWeaveError::SerializationError(_)));
}
