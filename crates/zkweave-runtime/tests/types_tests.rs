//! Tests for the shared boundary types

use std::io::Write;
use zkweave_runtime::{BoilerplateKind, CompilerConfig, StateClassification, ZkWeaveError};

// ============================================================================
// BOILERPLATE KIND TESTS
// ============================================================================

#[test]
fn test_boilerplate_kind_serializes_to_bp_type() {
    let json = serde_json::to_string(&BoilerplateKind::NewCommitment).unwrap();
    assert_eq!(json, "\"newCommitment\"");

    let json = serde_json::to_string(&BoilerplateKind::ProofOfKeyOwnership).unwrap();
    assert_eq!(json, "\"PoKoSK\"");
}

#[test]
fn test_boilerplate_kind_round_trips_every_variant() {
    let kinds = [
        BoilerplateKind::ProofOfKeyOwnership,
        BoilerplateKind::Nullification,
        BoilerplateKind::OldCommitmentPreimage,
        BoilerplateKind::OldCommitmentExistence,
        BoilerplateKind::NewCommitment,
        BoilerplateKind::Mapping,
        BoilerplateKind::Encryption,
        BoilerplateKind::Incrementation,
        BoilerplateKind::Decrementation,
    ];

    for kind in kinds {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
        let back: BoilerplateKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}

#[test]
fn test_partitioned_write_kinds() {
    assert!(BoilerplateKind::Incrementation.is_partitioned_write());
    assert!(BoilerplateKind::Decrementation.is_partitioned_write());
    assert!(!BoilerplateKind::NewCommitment.is_partitioned_write());
}

#[test]
fn test_classification_display() {
    assert_eq!(StateClassification::Whole.to_string(), "whole");
    assert_eq!(StateClassification::Partitioned.to_string(), "partitioned");
}

// ============================================================================
// CONFIG TESTS
// ============================================================================

#[test]
fn test_default_config_knows_common_tokens() {
    let config = CompilerConfig::default();
    assert!(config.is_known_token_interface("IERC20"));
    assert!(config.is_known_token_interface("ERC721"));
    assert!(!config.is_known_token_interface("Escrow"));
    assert!(config.custom_params().is_empty());
}

#[test]
fn test_config_missing_fields_use_defaults() {
    let config = CompilerConfig::from_json_str("{}").unwrap();
    assert_eq!(config, CompilerConfig::default());
}

#[test]
fn test_config_custom_params() {
    let config = CompilerConfig::from_json_str(
        r#"{ "knownTokenInterfaces": [], "customParams": [["curve", "bn254"]] }"#,
    )
    .unwrap();

    assert!(!config.is_known_token_interface("IERC20"));
    assert_eq!(config.custom_params(), &[("curve".to_string(), "bn254".to_string())]);
}

#[test]
fn test_config_rejects_empty_interface_name() {
    let result = CompilerConfig::from_json_str(r#"{ "knownTokenInterfaces": ["IERC20", ""] }"#);

    let error = result.unwrap_err();
    assert!(matches!(error, ZkWeaveError::InvalidConfig(_)));
    assert!(error.to_string().contains("knownTokenInterfaces[1]"));
}

#[test]
fn test_config_rejects_malformed_json() {
    let result = CompilerConfig::from_json_str("{ knownTokenInterfaces: ");
    assert!(matches!(result, Err(ZkWeaveError::SerializationError(_))));
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "knownTokenInterfaces": ["Vault"] }}"#).unwrap();

    let config = CompilerConfig::from_file(file.path()).unwrap();
    assert!(config.is_known_token_interface("Vault"));
}

#[test]
fn test_config_from_missing_file() {
    let result = CompilerConfig::from_file("/nonexistent/zkweave.json");
    assert!(matches!(result, Err(ZkWeaveError::IoError(_))));
}
