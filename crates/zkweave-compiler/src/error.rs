//! Compiler error types

use thiserror::Error;

use crate::ast::DeclId;

#[derive(Debug, Error)]
pub enum CompilerError {
    /// A Path's container/key/node triple is inconsistent, or the tree itself
    /// is malformed. Always indicates a bug in an earlier stage.
    #[error("Structural integrity error at {location}: {reason}")]
    StructuralIntegrity { location: String, reason: String },

    #[error("Unsupported construct at {location}: {construct}")]
    UnsupportedConstruct { location: String, construct: String },

    #[error("Secrecy leak at {location}: {reason}")]
    SecrecyLeak { location: String, reason: String },

    #[error("Conflicting decorators at {location}: {reason}")]
    DecoratorConflict { location: String, reason: String },

    #[error("Cannot classify state variable '{name}': {reason}")]
    ClassificationContradiction { name: String, reason: String },

    #[error("Unresolved reference at {location}: no declaration found for id {id}")]
    UnresolvedReference { location: String, id: DeclId },

    #[error("Pipeline ordering error: {0}")]
    Ordering(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    RuntimeError(#[from] zkweave_runtime::ZkWeaveError),

    #[error("{0}")]
    Other(String),
}

impl CompilerError {
    pub fn structural(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StructuralIntegrity { location: location.into(), reason: reason.into() }
    }

    pub fn unsupported(location: impl Into<String>, construct: impl Into<String>) -> Self {
        Self::UnsupportedConstruct { location: location.into(), construct: construct.into() }
    }

    pub fn secrecy_leak(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SecrecyLeak { location: location.into(), reason: reason.into() }
    }

    pub fn decorator_conflict(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DecoratorConflict { location: location.into(), reason: reason.into() }
    }

    pub fn contradiction(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClassificationContradiction { name: name.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
