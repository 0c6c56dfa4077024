//! zkWeave Compiler
//!
//! Semantic analysis core for contracts with `secret` state. Takes the
//! parser's annotated tree, builds a Path/Scope model over it, runs the
//! check pipeline that decides how each secret variable is committed
//! (whole or partitioned), and derives the abstract circuit program whose
//! internal calls carry every cryptographic input their callees need.

pub mod ast;
pub mod checks;
pub mod circuit;
pub mod compile;
pub mod error;
pub mod internal_call;
pub mod scope;
pub mod traverse;

pub use ast::{Annotations, Ast, AstBuilder, DeclId, Node, NodeId, NodeKind, NodeType};
pub use checks::run_checks;
pub use circuit::{
    BoilerplateParam, BoilerplateStatement, CircuitBlock, CircuitExpression, CircuitFile, CircuitFunction,
    CircuitParam, CircuitProgram, CircuitStatement, InternalFunctionCall, StateName,
};
pub use compile::{analyse, compile, summarise, CompiledOutput, FunctionSummary};
pub use error::{CompilerError, Result};
pub use internal_call::{reconcile_internal_calls, rename_state_name, rename_state_names, reorder_parameters};
pub use scope::{Binding, BindingKind, FunctionIndicator, KeyIndicator, Scope, ScopeId, StateVarIndicator};
pub use traverse::{traverse, Context, NodePath, PathId, Stage, Visitor, WalkState};

// Re-export runtime types for convenience
pub use zkweave_runtime::{BoilerplateKind, CompilerConfig, StateClassification};
