//! Scopes, bindings and indicators
//!
//! A scope is opened at each source unit, contract and function path and owns
//! the bindings for the declarations made directly inside it. Scopes are
//! filled in as paths are constructed: declarations add bindings, identifiers
//! append themselves to the binding they reference, and references to state
//! variables from inside a function update that function's indicators.

pub mod binding;
pub mod indicator;

pub use binding::{Binding, BindingKind};
pub use indicator::{FunctionIndicator, KeyIndicator, StateVarIndicator, WriteKind};

use crate::ast::{is_builtin_declaration, DeclId, NodeId, NodeKind, NodeType};
use crate::error::Result;
use crate::traverse::{Context, PathId};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
    Global,
    Contract,
    Function,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub path: PathId,
    pub node: NodeId,
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub bindings: BTreeMap<DeclId, Binding>,
    /// Present on function scopes.
    pub function_indicator: Option<FunctionIndicator>,
}

impl Scope {
    pub fn get_binding(&self, id: DeclId) -> Option<&Binding> {
        self.bindings.get(&id)
    }

    pub fn is_function(&self) -> bool {
        self.kind == ScopeKind::Function
    }
}

impl Context {
    pub(crate) fn create_scope(&mut self, path: PathId, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let node = self.path(path).node;
        let kind = match (self.ast.node_type(node), parent) {
            (NodeType::ContractDefinition, Some(_)) => ScopeKind::Contract,
            (NodeType::FunctionDefinition, Some(_)) => ScopeKind::Function,
            _ => ScopeKind::Global,
        };
        let name = self.ast.kind(node).name().map(str::to_string);
        let function_indicator = match (kind, &name) {
            (ScopeKind::Function, Some(name)) => Some(FunctionIndicator::new(name)),
            _ => None,
        };
        tracing::trace!(scope = id.0, ?kind, name = name.as_deref().unwrap_or(""), "opened scope");
        self.scopes.push(Scope {
            id,
            kind,
            path,
            node,
            name,
            parent,
            bindings: BTreeMap::new(),
            function_indicator,
        });
        id
    }

    /// Records what a newly constructed path contributes to `scope`.
    pub(crate) fn update_scope(&mut self, scope: ScopeId, path: PathId) -> Result<()> {
        let node = self.path(path).node;
        match self.ast.kind(node) {
            NodeKind::ContractDefinition { id, name, .. } => {
                let binding = Binding::new(BindingKind::Contract, *id, name, node, path, scope);
                self.add_binding(scope, binding);
            }
            NodeKind::FunctionDefinition { id, name, .. } => {
                let binding = Binding::new(BindingKind::Function, *id, name, node, path, scope);
                self.add_binding(scope, binding);
            }
            NodeKind::VariableDeclaration { id, name, state_variable, .. } => {
                let binding_kind = if *state_variable {
                    BindingKind::StateVariable
                } else if self.is_function_return_parameter_declaration(path) {
                    BindingKind::ReturnParameter
                } else if self.is_function_parameter_declaration(path) {
                    BindingKind::Parameter
                } else {
                    BindingKind::LocalVariable
                };
                let is_mapping = self.is_mapping_declaration(node);
                let binding = Binding::new(binding_kind, *id, name, node, path, scope)
                    .with_decorators(self.ast.kind(node), is_mapping);
                self.add_binding(scope, binding);
            }
            NodeKind::Identifier { .. } => self.record_reference(scope, path)?,
            _ => {}
        }
        Ok(())
    }

    fn add_binding(&mut self, scope: ScopeId, binding: Binding) {
        tracing::trace!(id = binding.id, name = %binding.name, kind = ?binding.kind, "new binding");
        self.scopes[scope.index()].bindings.insert(binding.id, binding);
    }

    fn record_reference(&mut self, scope: ScopeId, path: PathId) -> Result<()> {
        let node = self.path(path).node;
        let NodeKind::Identifier { name, referenced_declaration, is_known, is_unknown, .. } =
            self.ast.kind(node)
        else {
            return Ok(());
        };
        let (is_known, is_unknown) = (*is_known, *is_unknown);
        let Some(id) = *referenced_declaration else {
            return Ok(());
        };
        if is_builtin_declaration(id) {
            return Ok(());
        }
        let Some(owner) = self.find_binding_scope(scope, id) else {
            tracing::trace!(id, name = %name, "reference has no binding");
            return Ok(());
        };

        let modifying = self.is_modification(path);
        let mapping_key = if self.path(path).key == "baseExpression" {
            self.path(path).parent.and_then(|access| self.mapping_key_name(access))
        } else {
            None
        };
        let function_scope = self.get_function_scope(scope);

        let Some(binding) = self.scopes[owner.index()].bindings.get_mut(&id) else {
            return Ok(());
        };
        binding.add_reference(path, modifying);
        let is_secret = binding.is_secret;
        let is_state = binding.is_state_variable();

        if let (true, Some(function_scope)) = (is_state, function_scope) {
            let indicator = binding.indicator_mut(function_scope);
            indicator.add_reference(path, modifying);
            indicator.is_known |= is_known;
            indicator.is_unknown |= is_unknown;
            if let Some(key) = &mapping_key {
                indicator.add_mapping_key(key, path, modifying);
            }
            if let Some(function) = self.scopes[function_scope.index()].function_indicator.as_mut() {
                function.record_state_variable(id, is_secret);
            }
        }

        self.ast.annotations_mut(node).is_secret = is_secret;
        Ok(())
    }

    /// The scope owning the binding for `id`, searching outwards from `scope`.
    pub fn find_binding_scope(&self, scope: ScopeId, id: DeclId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            let scope = self.scope(s);
            if scope.bindings.contains_key(&id) {
                return Some(s);
            }
            current = scope.parent;
        }
        None
    }

    /// Looks `id` up from `scope` outwards.
    pub fn get_binding(&self, scope: ScopeId, id: DeclId) -> Option<&Binding> {
        let owner = self.find_binding_scope(scope, id)?;
        self.scope(owner).bindings.get(&id)
    }

    /// Looks `id` up in every scope; declaration ids are globally unique.
    pub fn binding_by_id(&self, id: DeclId) -> Option<&Binding> {
        self.scopes.iter().find_map(|scope| scope.bindings.get(&id))
    }

    pub(crate) fn binding_by_id_mut(&mut self, id: DeclId) -> Option<&mut Binding> {
        self.scopes.iter_mut().find_map(|scope| scope.bindings.get_mut(&id))
    }

    /// The nearest enclosing function scope, including `scope` itself.
    pub fn get_function_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if self.scope(s).is_function() {
                return Some(s);
            }
            current = self.scope(s).parent;
        }
        None
    }

    /// The function scope opened by the `FunctionDefinition` at `path`.
    pub fn function_scope_of(&self, path: PathId) -> Option<ScopeId> {
        let scope = self.path(path).scope;
        (self.scope(scope).path == path && self.scope(scope).is_function()).then_some(scope)
    }

    pub fn function_scopes(&self) -> impl Iterator<Item = &Scope> + '_ {
        self.scopes.iter().filter(|scope| scope.is_function())
    }

    /// Ids of every secret state variable, in declaration order.
    pub fn secret_state_ids(&self) -> Vec<DeclId> {
        let mut bindings: Vec<&Binding> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.bindings.values())
            .filter(|binding| binding.is_secret_state())
            .collect();
        bindings.sort_by_key(|binding| binding.path);
        bindings.into_iter().map(|binding| binding.id).collect()
    }

    /// The indicator for state variable `id` inside `function_scope`.
    pub fn indicator(&self, function_scope: ScopeId, id: DeclId) -> Option<&StateVarIndicator> {
        self.binding_by_id(id)?.indicator(function_scope)
    }

    pub(crate) fn indicator_mut(
        &mut self,
        function_scope: ScopeId,
        id: DeclId,
    ) -> Option<&mut StateVarIndicator> {
        self.binding_by_id_mut(id)?.indicators.get_mut(&function_scope)
    }

    pub fn function_indicator(&self, function_scope: ScopeId) -> Option<&FunctionIndicator> {
        self.scope(function_scope).function_indicator.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use zkweave_runtime::CompilerConfig;

    #[test]
    fn test_declarations_bind_in_enclosing_scope() {
        let mut b = AstBuilder::new();
        let state = b.secret_state(1, "a");
        let param = b.variable(10, "amount", false);
        let lhs = b.identifier("a", Some(1));
        let rhs = b.identifier("amount", Some(10));
        let assign = b.assignment(lhs, "+=", rhs);
        let stmt = b.statement(assign);
        let function = b.function(2, "add", vec![param], vec![stmt]);
        let contract = b.contract(3, "Wallet", vec![state, function]);
        let unit = b.source_unit(vec![contract]);
        let mut cx = Context::new(b.finish(unit).unwrap(), CompilerConfig::default());
        cx.build_paths().unwrap();

        let contract_scope = cx.path(cx.get_path(contract).unwrap()).scope;
        let function_path = cx.get_path(function).unwrap();
        let function_scope = cx.function_scope_of(function_path).unwrap();

        assert_eq!(cx.scope(contract_scope).kind, ScopeKind::Contract);
        assert!(cx.scope(contract_scope).get_binding(1).is_some());
        assert!(cx.scope(contract_scope).get_binding(2).is_some());
        assert_eq!(
            cx.scope(function_scope).get_binding(10).map(|b| b.kind),
            Some(BindingKind::Parameter)
        );

        let binding = cx.get_binding(function_scope, 1).unwrap();
        assert!(binding.is_secret_state());
        assert_eq!(binding.modifying_paths.len(), 1);
        let indicator = binding.indicator(function_scope).unwrap();
        assert!(indicator.is_modified);

        let function_indicator = cx.function_indicator(function_scope).unwrap();
        assert!(function_indicator.interacts_with_secret);
        assert_eq!(function_indicator.state_variables, vec![1]);
        assert!(cx.ast().annotations(lhs).is_secret);
        assert!(!cx.ast().annotations(rhs).is_secret);
    }

    #[test]
    fn test_builtin_reference_has_no_binding() {
        let mut b = AstBuilder::new();
        let msg = b.identifier("msg", Some(-15));
        let stmt = b.statement(msg);
        let function = b.function(2, "f", vec![], vec![stmt]);
        let contract = b.contract(3, "C", vec![function]);
        let unit = b.source_unit(vec![contract]);
        let mut cx = Context::new(b.finish(unit).unwrap(), CompilerConfig::default());
        cx.build_paths().unwrap();
        assert!(cx.binding_by_id(-15).is_none());
    }
}
