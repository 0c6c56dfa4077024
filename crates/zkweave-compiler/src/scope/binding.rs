use crate::ast::{DeclId, NodeId, NodeKind};
use crate::error::{CompilerError, Result};
use crate::traverse::PathId;
use serde::Serialize;
use std::collections::BTreeMap;
use zkweave_runtime::StateClassification;

use super::{ScopeId, StateVarIndicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    Contract,
    Function,
    StateVariable,
    Parameter,
    ReturnParameter,
    LocalVariable,
}

/// Everything known about one declared symbol: where it is declared, every
/// path that references it, and, for state variables, how each function
/// uses it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub kind: BindingKind,
    pub id: DeclId,
    pub name: String,
    #[serde(skip)]
    pub node: NodeId,
    #[serde(skip)]
    pub path: PathId,
    #[serde(skip)]
    pub scope: ScopeId,
    pub is_secret: bool,
    pub is_known: bool,
    pub is_unknown: bool,
    pub is_reinitialisable: bool,
    pub is_mapping: bool,
    #[serde(skip)]
    pub referencing_paths: Vec<PathId>,
    #[serde(skip)]
    pub modifying_paths: Vec<PathId>,
    pub is_referenced: bool,
    pub is_modified: bool,
    pub is_incremented: bool,
    pub is_decremented: bool,
    pub is_accessed: bool,
    pub is_nullified: bool,
    classification: Option<StateClassification>,
    /// Per-function usage, keyed by the function's scope.
    #[serde(skip)]
    pub indicators: BTreeMap<ScopeId, StateVarIndicator>,
}

impl Binding {
    pub(crate) fn new(
        kind: BindingKind,
        id: DeclId,
        name: &str,
        node: NodeId,
        path: PathId,
        scope: ScopeId,
    ) -> Self {
        Self {
            kind,
            id,
            name: name.to_string(),
            node,
            path,
            scope,
            is_secret: false,
            is_known: false,
            is_unknown: false,
            is_reinitialisable: false,
            is_mapping: false,
            referencing_paths: Vec::new(),
            modifying_paths: Vec::new(),
            is_referenced: false,
            is_modified: false,
            is_incremented: false,
            is_decremented: false,
            is_accessed: false,
            is_nullified: false,
            classification: None,
            indicators: BTreeMap::new(),
        }
    }

    /// Copies the decorators carried by a `VariableDeclaration`.
    pub(crate) fn with_decorators(mut self, kind: &NodeKind, is_mapping: bool) -> Self {
        if let NodeKind::VariableDeclaration {
            is_secret, is_known, is_unknown, is_reinitialisable, ..
        } = kind
        {
            self.is_secret = *is_secret;
            self.is_known = *is_known;
            self.is_unknown = *is_unknown;
            self.is_reinitialisable = *is_reinitialisable;
        }
        self.is_mapping = is_mapping;
        self
    }

    pub fn is_state_variable(&self) -> bool {
        self.kind == BindingKind::StateVariable
    }

    pub fn is_secret_state(&self) -> bool {
        self.is_state_variable() && self.is_secret
    }

    pub fn add_reference(&mut self, path: PathId, modifying: bool) {
        self.referencing_paths.push(path);
        self.is_referenced = true;
        if modifying {
            self.modifying_paths.push(path);
            self.is_modified = true;
        }
    }

    pub fn classification(&self) -> Option<StateClassification> {
        self.classification
    }

    pub fn is_whole(&self) -> bool {
        self.classification == Some(StateClassification::Whole)
    }

    pub fn is_partitioned(&self) -> bool {
        self.classification == Some(StateClassification::Partitioned)
    }

    /// Decides the variable's representation. The decision is final: setting
    /// a different classification afterwards is a contradiction.
    pub fn set_classification(&mut self, classification: StateClassification) -> Result<()> {
        match self.classification {
            Some(existing) if existing != classification => Err(CompilerError::contradiction(
                &self.name,
                format!("already classified {}, cannot also be {}", existing, classification),
            )),
            _ => {
                self.classification = Some(classification);
                Ok(())
            }
        }
    }

    pub fn indicator(&self, function_scope: ScopeId) -> Option<&StateVarIndicator> {
        self.indicators.get(&function_scope)
    }

    pub(crate) fn indicator_mut(&mut self, function_scope: ScopeId) -> &mut StateVarIndicator {
        let (id, is_secret, is_mapping) = (self.id, self.is_secret, self.is_mapping);
        let name = &self.name;
        self.indicators.entry(function_scope).or_insert_with(|| {
            StateVarIndicator::new(id, name, function_scope, is_secret, is_mapping)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_binding() -> Binding {
        let mut binding =
            Binding::new(BindingKind::StateVariable, 7, "balance", NodeId(3), PathId(4), ScopeId(1));
        binding.is_secret = true;
        binding
    }

    #[test]
    fn test_classification_is_write_once() {
        let mut binding = secret_binding();
        binding.set_classification(StateClassification::Partitioned).unwrap();
        binding.set_classification(StateClassification::Partitioned).unwrap();

        let err = binding.set_classification(StateClassification::Whole).unwrap_err();
        assert!(matches!(err, CompilerError::ClassificationContradiction { .. }));
        assert!(err.to_string().contains("balance"));
        assert!(binding.is_partitioned());
    }

    #[test]
    fn test_indicator_created_on_demand() {
        let mut binding = secret_binding();
        assert!(binding.indicator(ScopeId(5)).is_none());

        binding.indicator_mut(ScopeId(5)).add_reference(PathId(9), true);
        let indicator = binding.indicator(ScopeId(5)).unwrap();
        assert!(indicator.is_secret);
        assert!(indicator.is_modified);
        assert_eq!(indicator.name, "balance");
    }
}
