//! Reference resolution and classification queries
//!
//! All queries here are read-only over the tree and the binding tables, and
//! may be called speculatively while a pass is running. The collection
//! queries at the bottom are the exception: they may construct paths for
//! parts of the tree not reached yet.

use super::{traverse_nodes_fast, traverse_paths_fast, Context, PathId, WalkState};
use crate::ast::{is_builtin_declaration, DeclId, NodeId, NodeKind, NodeType};
use crate::error::{CompilerError, Result};
use crate::scope::{Binding, BindingKind};
use std::collections::BTreeMap;

const STATEMENT_TYPES: &[NodeType] = &[
    NodeType::VariableDeclarationStatement,
    NodeType::ExpressionStatement,
    NodeType::IfStatement,
    NodeType::ForStatement,
    NodeType::WhileStatement,
    NodeType::DoWhileStatement,
    NodeType::InlineAssembly,
    NodeType::Return,
    NodeType::Block,
];

impl Context {
    // REFERENCES

    /// The declaration a referencing node points at. Index and member
    /// accesses resolve through their base expression.
    pub fn get_referenced_declaration_id(&self, node: NodeId) -> Option<DeclId> {
        match self.ast.kind(node) {
            NodeKind::Identifier { referenced_declaration, .. }
            | NodeKind::UserDefinedTypeName { referenced_declaration, .. } => *referenced_declaration,
            NodeKind::IndexAccess { base_expression, .. } => {
                self.get_referenced_declaration_id(*base_expression)
            }
            NodeKind::MemberAccess { expression, .. } => self.get_referenced_declaration_id(*expression),
            _ => None,
        }
    }

    pub fn get_referenced_binding(&self, path: PathId) -> Option<&Binding> {
        let id = self.get_referenced_declaration_id(self.path(path).node)?;
        self.get_binding(self.path(path).scope, id)
    }

    /// The declaring node of whatever `path` references.
    pub fn get_referenced_node(&self, path: PathId) -> Option<NodeId> {
        self.get_referenced_binding(path).map(|binding| binding.node)
    }

    /// Like [`Context::get_referenced_binding`], but a reference to a user
    /// declaration with no binding is an error. Built-in and exported symbols
    /// resolve to `None`.
    pub fn resolve_binding(&self, path: PathId) -> Result<Option<&Binding>> {
        let Some(id) = self.get_referenced_declaration_id(self.path(path).node) else {
            return Ok(None);
        };
        if is_builtin_declaration(id) {
            return Ok(None);
        }
        match self.get_binding(self.path(path).scope, id) {
            Some(binding) => Ok(Some(binding)),
            None if self.is_exported_symbol(path) => Ok(None),
            None => Err(CompilerError::UnresolvedReference { location: self.get_location(path), id }),
        }
    }

    // MAGIC IDENTIFIERS

    pub fn is_msg(&self, node: NodeId) -> bool {
        matches!(self.ast.kind(node), NodeKind::Identifier { name, .. } if name == "msg")
    }

    pub fn is_msg_sender(&self, node: NodeId) -> bool {
        matches!(
            self.ast.kind(node),
            NodeKind::MemberAccess { member_name, expression, .. }
                if member_name == "sender" && self.is_msg(*expression)
        )
    }

    pub fn is_this(&self, node: NodeId) -> bool {
        matches!(self.ast.kind(node), NodeKind::Identifier { name, .. } if name == "this")
    }

    /// A `require(..)` call, or a statement wrapping one.
    pub fn is_require_statement(&self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            NodeKind::ExpressionStatement { expression } => self.is_require_statement(*expression),
            NodeKind::FunctionCall { expression, .. } => matches!(
                self.ast.kind(*expression),
                NodeKind::Identifier { name, .. } if name == "require"
            ),
            _ => false,
        }
    }

    // MAPPINGS

    pub fn is_mapping_declaration(&self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            NodeKind::VariableDeclaration { type_name: Some(type_name), .. } => {
                self.ast.node_type(*type_name) == NodeType::Mapping
            }
            NodeKind::VariableDeclaration { type_string, .. } => type_string.starts_with("mapping("),
            _ => false,
        }
    }

    /// An identifier whose binding is a mapping declaration.
    pub fn is_mapping_identifier(&self, path: PathId) -> bool {
        self.path(path).node_type == NodeType::Identifier
            && self.get_referenced_binding(path).is_some_and(|binding| binding.is_mapping)
    }

    /// An index access into a mapping.
    pub fn is_mapping(&self, path: PathId) -> bool {
        let node = self.path(path).node;
        let NodeKind::IndexAccess { base_expression, .. } = self.ast.kind(node) else {
            return false;
        };
        self.get_path(*base_expression).is_some_and(|base| self.is_mapping_identifier(base))
            || self
                .get_referenced_declaration_id(node)
                .and_then(|id| self.binding_by_id(id))
                .is_some_and(|binding| binding.is_mapping)
    }

    /// The name recorded for a mapping key: `msg.sender` for the caller,
    /// otherwise the index identifier's name or literal value.
    pub fn mapping_key_name(&self, index_access: NodeId) -> Option<String> {
        let NodeKind::IndexAccess { index_expression, .. } = self.ast.kind(index_access) else {
            return None;
        };
        if self.is_msg_sender(*index_expression) {
            return Some("msg.sender".to_string());
        }
        match self.ast.kind(*index_expression) {
            NodeKind::Identifier { name, .. } => Some(name.clone()),
            NodeKind::Literal { value, .. } => Some(value.clone()),
            NodeKind::MemberAccess { member_name, expression, .. } => {
                let base = self.ast.kind(*expression).name()?;
                Some(format!("{}.{}", base, member_name))
            }
            _ => None,
        }
    }

    // EXTERNAL CONTRACTS

    /// The contract name from a `contract X` or `type(contract X)` type string.
    fn contract_type_name(type_string: &str) -> Option<&str> {
        type_string
            .strip_prefix("contract ")
            .or_else(|| type_string.strip_prefix("type(contract ")?.strip_suffix(')'))
    }

    fn enclosing_contract_name(&self, path: PathId) -> Option<&str> {
        let contract = self.get_contract_definition(path)?;
        self.node(contract).kind.name()
    }

    /// A declaration whose type is some contract other than the one it lives in.
    pub fn is_external_contract_instance_declaration(&self, path: PathId) -> bool {
        let NodeKind::VariableDeclaration { type_string, .. } = &self.node(path).kind else {
            return false;
        };
        match Self::contract_type_name(type_string) {
            Some(contract) => self.enclosing_contract_name(path) != Some(contract),
            None => false,
        }
    }

    /// The name of the external contract type that the expression at `path`
    /// evaluates to, either a contract-typed variable or a `X(addr)` cast.
    pub fn external_contract_type(&self, path: PathId) -> Option<String> {
        self.external_contract_type_of(self.path(path).node, path)
    }

    /// As [`Context::external_contract_type`] for a node that may not have a
    /// path yet; `within` locates the enclosing contract.
    fn external_contract_type_of(&self, node: NodeId, within: PathId) -> Option<String> {
        let type_string = match self.ast.kind(node) {
            NodeKind::Identifier { type_string, .. } | NodeKind::MemberAccess { type_string, .. } => {
                type_string
            }
            NodeKind::FunctionCall { expression, .. } => match self.ast.kind(*expression) {
                NodeKind::Identifier { type_string, .. } => type_string,
                _ => return None,
            },
            _ => return None,
        };
        let contract = Self::contract_type_name(type_string)?;
        if self.enclosing_contract_name(within) == Some(contract) {
            return None;
        }
        Some(contract.to_string())
    }

    pub fn is_external_contract_instance(&self, path: PathId) -> bool {
        self.external_contract_type(path).is_some()
    }

    /// A call of the form `instance.f(..)` where `instance` is an external
    /// contract. Returns the external contract's type name.
    pub fn external_call_target(&self, path: PathId) -> Option<String> {
        let NodeKind::FunctionCall { expression, .. } = &self.node(path).kind else {
            return None;
        };
        let NodeKind::MemberAccess { expression: target, .. } = self.ast.kind(*expression) else {
            return None;
        };
        self.external_contract_type_of(*target, path)
    }

    pub fn is_external_function_call(&self, path: PathId) -> bool {
        self.external_call_target(path).is_some()
    }

    // DECLARATION KINDS

    fn parameter_list_key(&self, path: PathId) -> Option<&'static str> {
        let p = self.path(path);
        if p.node_type != NodeType::VariableDeclaration {
            return None;
        }
        let list = self.path(p.parent_path?);
        if list.node_type != NodeType::ParameterList {
            return None;
        }
        let function = self.path(list.parent_path?);
        (function.node_type == NodeType::FunctionDefinition).then_some(list.key)
    }

    pub fn is_function_parameter_declaration(&self, path: PathId) -> bool {
        self.parameter_list_key(path) == Some("parameters")
    }

    pub fn is_function_return_parameter_declaration(&self, path: PathId) -> bool {
        self.parameter_list_key(path) == Some("returnParameters")
    }

    pub fn is_function_parameter(&self, path: PathId) -> bool {
        self.get_referenced_binding(path).is_some_and(|b| b.kind == BindingKind::Parameter)
    }

    pub fn is_function_return_parameter(&self, path: PathId) -> bool {
        self.get_referenced_binding(path).is_some_and(|b| b.kind == BindingKind::ReturnParameter)
    }

    /// A non-state declaration inside a function.
    pub fn is_local_stack_variable_declaration(&self, path: PathId) -> bool {
        matches!(
            self.node(path).kind,
            NodeKind::VariableDeclaration { state_variable: false, .. }
        ) && self.get_ancestor_of_type(path, NodeType::FunctionDefinition).is_some()
    }

    /// A reference to a parameter or local variable.
    pub fn is_local_stack_variable(&self, path: PathId) -> bool {
        self.get_referenced_binding(path).is_some_and(|b| {
            matches!(
                b.kind,
                BindingKind::Parameter | BindingKind::ReturnParameter | BindingKind::LocalVariable
            )
        })
    }

    // EXPORTED SYMBOLS

    pub fn get_referenced_exported_symbol_name(&self, path: PathId) -> Option<String> {
        let id = self.get_referenced_declaration_id(self.path(path).node)?;
        let unit = self.get_source_unit(path)?;
        let NodeKind::SourceUnit { exported_symbols, .. } = &self.node(unit).kind else {
            return None;
        };
        exported_symbols
            .iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(name, _)| name.clone())
    }

    pub fn is_exported_symbol(&self, path: PathId) -> bool {
        self.get_referenced_exported_symbol_name(path).is_some()
    }

    // STRUCTURE

    pub fn get_source_unit(&self, path: PathId) -> Option<PathId> {
        self.get_ancestor_of_type(path, NodeType::SourceUnit)
    }

    pub fn get_contract_definition(&self, path: PathId) -> Option<PathId> {
        self.get_ancestor_of_type(path, NodeType::ContractDefinition)
    }

    /// Names of the functions declared in the contract enclosing `path`.
    pub fn get_function_names(&self, path: PathId) -> Vec<String> {
        let Some(contract) = self.get_contract_definition(path) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut state = WalkState::default();
        traverse_nodes_fast(
            &self.ast,
            self.path(contract).node,
            &mut |ast, node, state| {
                if let NodeKind::FunctionDefinition { name, .. } = ast.kind(node) {
                    names.push(name.clone());
                    state.skip_sub_nodes = true;
                }
            },
            &mut state,
        );
        names
    }

    fn function_parts(&self, function: NodeId) -> Option<(NodeId, NodeId, Option<NodeId>)> {
        match self.ast.kind(function) {
            NodeKind::FunctionDefinition { parameters, return_parameters, body, .. } => {
                Some((*parameters, *return_parameters, *body))
            }
            _ => None,
        }
    }

    fn list_items(&self, node: NodeId) -> Vec<NodeId> {
        match self.ast.kind(node) {
            NodeKind::ParameterList { parameters } => parameters.clone(),
            NodeKind::Block { statements } => statements.clone(),
            _ => Vec::new(),
        }
    }

    pub fn get_function_parameters(&self, function: NodeId) -> Vec<NodeId> {
        self.function_parts(function).map(|(p, _, _)| self.list_items(p)).unwrap_or_default()
    }

    pub fn get_function_return_parameters(&self, function: NodeId) -> Vec<NodeId> {
        self.function_parts(function).map(|(_, r, _)| self.list_items(r)).unwrap_or_default()
    }

    pub fn get_function_body_statements(&self, function: NodeId) -> Vec<NodeId> {
        self.function_parts(function)
            .and_then(|(_, _, body)| body)
            .map(|body| self.list_items(body))
            .unwrap_or_default()
    }

    pub fn is_statement(&self, path: PathId) -> bool {
        STATEMENT_TYPES.contains(&self.path(path).node_type)
    }

    /// A statement directly inside a function's body block.
    pub fn is_function_body_statement(&self, path: PathId) -> bool {
        let Some(block) = self.path(path).parent_path else {
            return false;
        };
        self.is_statement(path)
            && self.path(block).key == "body"
            && self.path(block).parent_path.is_some_and(|function| {
                self.path(function).node_type == NodeType::FunctionDefinition
            })
    }

    pub fn is_in_function_body_statement(&self, path: PathId) -> bool {
        self.find_ancestor(path, |cx, p| cx.is_function_body_statement(p)).is_some()
    }

    /// Whether the value at `path` is written: it sits (possibly under index
    /// or member accesses) on the left of an assignment, or is the operand of
    /// `++`, `--` or `delete`.
    pub fn is_modification(&self, path: PathId) -> bool {
        let mut current = path;
        loop {
            let p = self.path(current);
            let Some(parent) = p.parent_path else {
                return false;
            };
            match (&self.node(parent).kind, p.key) {
                (NodeKind::IndexAccess { .. }, "baseExpression")
                | (NodeKind::MemberAccess { .. }, "expression") => current = parent,
                (NodeKind::Assignment { .. }, "leftHandSide") => return true,
                (NodeKind::UnaryOperation { operator, .. }, "subExpression") => {
                    return matches!(operator.as_str(), "++" | "--" | "delete")
                }
                _ => return false,
            }
        }
    }

    // COLLECTIONS

    fn referenced_ids_below(&self, path: PathId) -> Vec<DeclId> {
        let mut ids = Vec::new();
        let mut state = WalkState::default();
        traverse_nodes_fast(
            &self.ast,
            self.path(path).node,
            &mut |ast, node, _| {
                if let NodeKind::Identifier { referenced_declaration: Some(id), .. } = ast.kind(node) {
                    if !is_builtin_declaration(*id) && !ids.contains(id) {
                        ids.push(*id);
                    }
                }
            },
            &mut state,
        );
        ids
    }

    fn collect_references(
        &mut self,
        path: PathId,
        beneath: NodeType,
        modifying_only: bool,
    ) -> Result<BTreeMap<DeclId, Vec<PathId>>> {
        let ids = self.referenced_ids_below(path);
        let mut found: BTreeMap<DeclId, Vec<PathId>> = BTreeMap::new();
        let Some(bound) = self.get_ancestor_of_type(path, beneath) else {
            return Ok(found);
        };
        let mut state = WalkState::default();
        traverse_paths_fast(
            self,
            bound,
            &mut |cx, p, _| {
                if let NodeKind::Identifier { referenced_declaration: Some(id), .. } = &cx.node(p).kind
                {
                    if ids.contains(id) && (!modifying_only || cx.is_modification(p)) {
                        found.entry(*id).or_default().push(p);
                    }
                }
            },
            &mut state,
        )?;
        Ok(found)
    }

    /// Every identifier under the nearest `beneath` ancestor that references
    /// one of the declarations referenced at or below `path`, grouped by
    /// declaration.
    pub fn get_all_nodes_which_reference_the_same(
        &mut self,
        path: PathId,
        beneath: NodeType,
    ) -> Result<BTreeMap<DeclId, Vec<PathId>>> {
        self.collect_references(path, beneath, false)
    }

    /// Like [`Context::get_all_nodes_which_reference_the_same`], keeping only
    /// the references that are written to.
    pub fn get_all_nodes_which_modify_the_same(
        &mut self,
        path: PathId,
        beneath: NodeType,
    ) -> Result<BTreeMap<DeclId, Vec<PathId>>> {
        self.collect_references(path, beneath, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use zkweave_runtime::CompilerConfig;

    fn msg_sender(b: &mut AstBuilder) -> NodeId {
        let msg = b.identifier("msg", Some(-15));
        b.add(NodeKind::MemberAccess {
            member_name: "sender".to_string(),
            expression: msg,
            type_string: "address".to_string(),
        })
    }

    #[test]
    fn test_msg_sender_and_require() {
        let mut b = AstBuilder::new();
        let sender = msg_sender(&mut b);
        let require = b.identifier("require", Some(-18));
        let call = b.add(NodeKind::FunctionCall { expression: require, arguments: vec![sender] });
        let stmt = b.statement(call);
        let ast = b.finish(stmt).unwrap();
        let cx = Context::new(ast, CompilerConfig::default());

        assert!(cx.is_msg_sender(sender));
        assert!(cx.is_require_statement(stmt));
        assert!(!cx.is_require_statement(sender));
    }

    #[test]
    fn test_modification_through_index_access() {
        let mut b = AstBuilder::new();
        let balances = b.identifier("balances", Some(1));
        let sender = msg_sender(&mut b);
        let access =
            b.add(NodeKind::IndexAccess { base_expression: balances, index_expression: sender });
        let one = b.literal("1");
        let assign = b.assignment(access, "+=", one);
        let stmt = b.statement(assign);
        let mut cx = Context::new(b.finish(stmt).unwrap(), CompilerConfig::default());
        cx.build_paths().unwrap();

        assert!(cx.is_modification(cx.get_path(balances).unwrap()));
        assert!(!cx.is_modification(cx.get_path(sender).unwrap()));
        assert!(!cx.is_modification(cx.get_path(one).unwrap()));
        assert_eq!(cx.mapping_key_name(access).as_deref(), Some("msg.sender"));
        assert_eq!(cx.get_referenced_declaration_id(access), Some(1));
    }
}
