//! Tests for error handling and error messages

use zkweave_compiler::{Ast, CompilerError};
use zkweave_runtime::ZkWeaveError;

// ============================================================================
// ERROR MESSAGE TESTS
// ============================================================================

#[test]
fn test_structural_error_message() {
    let error = CompilerError::structural("ast.nodes[0]", "container !== parent[key]");
    assert_eq!(
        error.to_string(),
        "Structural integrity error at ast.nodes[0]: container !== parent[key]"
    );
}

#[test]
fn test_secrecy_leak_message_names_the_location() {
    let error = CompilerError::secrecy_leak(
        "ast.nodes[0].nodes[2].body.statements[0].expression.arguments[0]",
        "Cannot pass a secret state (a) to an external function call",
    );
    let message = error.to_string();
    assert!(message.starts_with("Secrecy leak at ast.nodes[0]"), "{}", message);
    assert!(message.contains("secret state (a)"), "{}", message);
}

#[test]
fn test_contradiction_message_names_the_variable() {
    let error = CompilerError::contradiction("balance", "already classified whole");
    assert_eq!(
        error.to_string(),
        "Cannot classify state variable 'balance': already classified whole"
    );
}

#[test]
fn test_unresolved_reference_message() {
    let error = CompilerError::UnresolvedReference { location: "ast.nodes[3]".to_string(), id: 42 };
    assert!(error.to_string().contains("no declaration found for id 42"));
}

// ============================================================================
// CONVERSION TESTS
// ============================================================================

#[test]
fn test_invalid_tree_json_is_a_serialization_error() {
    let result = Ast::from_json_str(r#"{"nodes": "not a list"}"#);
    assert!(matches!(result, Err(CompilerError::Serialization(_))));
}

#[test]
fn test_runtime_errors_pass_through() {
    let error: CompilerError = ZkWeaveError::invalid_config("knownTokenInterfaces[0] is empty").into();
    assert!(matches!(error, CompilerError::RuntimeError(_)));
    assert!(error.to_string().contains("knownTokenInterfaces[0] is empty"));
}

#[test]
fn test_dangling_child_is_a_structural_error() {
    let json = r#"{
        "nodes": [
            { "nodeType": "Block", "statements": [7] }
        ],
        "root": 0
    }"#;
    let result = Ast::from_json_str(json);
    assert!(matches!(result, Err(CompilerError::StructuralIntegrity { .. })));
}
