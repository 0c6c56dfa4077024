//! Abstract circuit artifact
//!
//! After the checks, each function that interacts with secret state gets one
//! [`CircuitFile`]: its parameter list (own parameters plus the boilerplate
//! inputs every secret state variable needs), and a body split into
//! pre-statements, statements and post-statements. The circuit text emitter
//! consumes this tree; nothing here renders circuit syntax.

use crate::ast::{DeclId, NodeId, NodeKind};
use crate::checks::incremented::classify_write;
use crate::error::{CompilerError, Result};
use crate::scope::{BindingKind, KeyIndicator, ScopeId, StateVarIndicator, WriteKind};
use crate::traverse::{Context, PathId, Stage};
use serde::Serialize;
use std::fmt;
use zkweave_runtime::BoilerplateKind;

/// One cryptographic input a secret state variable needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoilerplateParam {
    pub name: String,
    pub bp_type: BoilerplateKind,
    pub is_accessed: bool,
    pub is_nullified: bool,
    pub is_whole: bool,
    pub is_partitioned: bool,
    pub initialisation_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commitment_value: Option<String>,
}

impl BoilerplateParam {
    /// Read but not consumed.
    pub fn is_accessed_only(&self) -> bool {
        self.is_accessed && !self.is_nullified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "nodeType", rename_all_fields = "camelCase")]
pub enum CircuitParam {
    VariableDeclaration { name: String, type_name: String, is_private: bool },
    Boilerplate(BoilerplateParam),
}

impl CircuitParam {
    pub fn name(&self) -> &str {
        match self {
            Self::VariableDeclaration { name, .. } => name,
            Self::Boilerplate(param) => &param.name,
        }
    }

    pub fn bp_type(&self) -> Option<BoilerplateKind> {
        match self {
            Self::VariableDeclaration { .. } => None,
            Self::Boilerplate(param) => Some(param.bp_type),
        }
    }

    pub fn as_boilerplate(&self) -> Option<&BoilerplateParam> {
        match self {
            Self::Boilerplate(param) => Some(param),
            Self::VariableDeclaration { .. } => None,
        }
    }
}

/// How an argument names a state variable at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateName {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
}

impl StateName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), member_name: None }
    }

    pub fn member(name: impl Into<String>, member_name: impl Into<String>) -> Self {
        Self { name: name.into(), member_name: Some(member_name.into()) }
    }

    /// `name.member` for member accesses, `name` otherwise.
    pub fn qualified(&self) -> String {
        match &self.member_name {
            Some(member) => format!("{}.{}", self.name, member),
            None => self.name.clone(),
        }
    }
}

/// A call from one compiled function to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalFunctionCall {
    pub name: String,
    pub internal_function_interacts_with_secret: bool,
    /// The callee's parameter names.
    pub old_state_name: Vec<String>,
    /// The caller's argument names, positionally matching `old_state_name`.
    pub new_state_name: Vec<StateName>,
    #[serde(rename = "CircuitArguments")]
    pub circuit_arguments: Vec<String>,
    #[serde(rename = "CircuitReturn")]
    pub circuit_return: Vec<CircuitParam>,
    /// Whether the callee is imported as a sub-circuit. When false its
    /// statements are spliced into the caller instead.
    pub circuit_import: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "nodeType", rename_all_fields = "camelCase")]
pub enum CircuitExpression {
    Identifier { name: String },
    Literal { value: String },
    MsgSender,
    BinaryOperation { operator: String, left_expression: Box<Self>, right_expression: Box<Self> },
    UnaryOperation { operator: String, prefix: bool, sub_expression: Box<Self> },
    Assignment { operator: String, left_hand_side: Box<Self>, right_hand_side: Box<Self> },
    IndexAccess { base_expression: Box<Self>, index_expression: Box<Self> },
    MemberAccess { expression: Box<Self>, member_name: String },
    FunctionCall { name: String, arguments: Vec<Self> },
    InternalFunctionCall(InternalFunctionCall),
}

impl CircuitExpression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    /// Replaces identifiers through `(old, new)` pairs, expanding to a member
    /// access when `new` names a member. Every identifier is looked up once,
    /// so the pairs apply simultaneously and a swap stays a swap.
    pub fn rename(&mut self, pairs: &[(String, StateName)]) {
        match self {
            Self::Identifier { name } => {
                let Some((_, new)) = pairs.iter().find(|(old, _)| old.as_str() == name.as_str()) else {
                    return;
                };
                *self = match &new.member_name {
                    Some(member) => Self::MemberAccess {
                        expression: Box::new(Self::identifier(new.name.clone())),
                        member_name: member.clone(),
                    },
                    None => Self::identifier(new.name.clone()),
                };
            }
            Self::BinaryOperation { left_expression: a, right_expression: b, .. }
            | Self::Assignment { left_hand_side: a, right_hand_side: b, .. }
            | Self::IndexAccess { base_expression: a, index_expression: b } => {
                a.rename(pairs);
                b.rename(pairs);
            }
            Self::UnaryOperation { sub_expression: a, .. } | Self::MemberAccess { expression: a, .. } => {
                a.rename(pairs)
            }
            Self::FunctionCall { arguments, .. } => {
                arguments.iter_mut().for_each(|argument| argument.rename(pairs))
            }
            Self::Literal { .. } | Self::MsgSender | Self::InternalFunctionCall(_) => {}
        }
    }
}

impl fmt::Display for CircuitExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier { name } => f.write_str(name),
            Self::Literal { value } => f.write_str(value),
            Self::MsgSender => f.write_str("msgSender"),
            Self::BinaryOperation { operator, left_expression, right_expression } => {
                write!(f, "{} {} {}", left_expression, operator, right_expression)
            }
            Self::UnaryOperation { operator, prefix: true, sub_expression } => {
                write!(f, "{}{}", operator, sub_expression)
            }
            Self::UnaryOperation { operator, prefix: false, sub_expression } => {
                write!(f, "{}{}", sub_expression, operator)
            }
            Self::Assignment { operator, left_hand_side, right_hand_side } => {
                write!(f, "{} {} {}", left_hand_side, operator, right_hand_side)
            }
            // Mapping entries are separate states named `<mapping>_<key>`.
            Self::IndexAccess { base_expression, index_expression } => {
                write!(f, "{}_{}", base_expression, index_expression)
            }
            Self::MemberAccess { expression, member_name } => write!(f, "{}.{}", expression, member_name),
            Self::FunctionCall { name, arguments } => {
                let arguments: Vec<String> = arguments.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", name, arguments.join(", "))
            }
            Self::InternalFunctionCall(call) => {
                write!(f, "{}({})", call.name, call.circuit_arguments.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoilerplateStatement {
    pub name: String,
    pub bp_type: BoilerplateKind,
    pub is_whole: bool,
    pub is_partitioned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commitment_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "nodeType", rename_all_fields = "camelCase")]
pub enum CircuitStatement {
    ExpressionStatement { expression: CircuitExpression, is_var_dec: bool },
    BoilerplateStatement(BoilerplateStatement),
    IfStatement { condition: CircuitExpression, true_body: Vec<Self>, false_body: Vec<Self> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBlock {
    pub pre_statements: Vec<CircuitStatement>,
    pub statements: Vec<CircuitStatement>,
    pub post_statements: Vec<CircuitStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitFunction {
    pub name: String,
    pub parameters: Vec<CircuitParam>,
    pub return_parameters: Vec<CircuitParam>,
    pub body: CircuitBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitFile {
    pub file_name: String,
    pub function: CircuitFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitProgram {
    pub files: Vec<CircuitFile>,
}

impl CircuitProgram {
    pub fn file(&self, name: &str) -> Option<&CircuitFile> {
        self.files.iter().find(|file| file.file_name == name)
    }

    pub fn file_mut(&mut self, name: &str) -> Option<&mut CircuitFile> {
        self.files.iter_mut().find(|file| file.file_name == name)
    }

    /// Builds one file per function that interacts with secret state, either
    /// directly or through the functions it calls.
    pub fn build(cx: &Context) -> Result<Self> {
        if cx.stage() < Stage::Checked {
            return Err(CompilerError::Ordering(
                "circuit files can only be built from a checked tree".to_string(),
            ));
        }
        let functions: Vec<ScopeId> = cx.function_scopes().map(|scope| scope.id).collect();
        let mut included: Vec<ScopeId> = functions
            .iter()
            .copied()
            .filter(|scope| cx.function_indicator(*scope).is_some_and(|f| f.interacts_with_secret))
            .collect();
        loop {
            let before = included.len();
            for scope in &functions {
                if !included.contains(scope)
                    && internal_callees(cx, *scope).iter().any(|callee| included.contains(callee))
                {
                    included.push(*scope);
                }
            }
            if included.len() == before {
                break;
            }
        }

        let mut program = CircuitProgram::default();
        for scope in functions.into_iter().filter(|scope| included.contains(scope)) {
            let function = FunctionBuilder::new(cx, scope).build()?;
            tracing::debug!(function = %function.name, parameters = function.parameters.len(), "built circuit");
            program.files.push(CircuitFile { file_name: function.name.clone(), function });
        }
        Ok(program)
    }
}

/// `msg.sender` keys name their states `<mapping>_msgSender`.
fn sanitise_key(key: &str) -> String {
    if key == "msg.sender" {
        "msgSender".to_string()
    } else {
        key.to_string()
    }
}

/// The function scope of an internal call at `call`, if `call` is one.
fn internal_callee(cx: &Context, caller: ScopeId, call: NodeId) -> Option<ScopeId> {
    let NodeKind::FunctionCall { expression, .. } = cx.ast().kind(call) else {
        return None;
    };
    let NodeKind::Identifier { referenced_declaration: Some(id), .. } = cx.ast().kind(*expression) else {
        return None;
    };
    let binding = cx.binding_by_id(*id)?;
    if binding.kind != BindingKind::Function || Some(binding.scope) != cx.scope(caller).parent {
        return None;
    }
    cx.function_scope_of(binding.path)
}

fn internal_callees(cx: &Context, caller: ScopeId) -> Vec<ScopeId> {
    let mut callees = Vec::new();
    let mut state = crate::traverse::WalkState::default();
    crate::traverse::traverse_nodes_fast(
        cx.ast(),
        cx.scope(caller).node,
        &mut |_, node, _| {
            if let Some(callee) = internal_callee(cx, caller, node) {
                callees.push(callee);
            }
        },
        &mut state,
    );
    callees
}

/// A secret state as the circuit sees it: a plain variable, or one entry of
/// a mapping.
struct StateRef<'a> {
    name: String,
    mapping_key: Option<String>,
    indicator: &'a StateVarIndicator,
    entry: Option<&'a KeyIndicator>,
}

impl StateRef<'_> {
    fn is_accessed(&self) -> bool {
        self.entry.map_or(self.indicator.is_accessed, |entry| entry.is_accessed)
    }

    fn is_nullified(&self) -> bool {
        self.entry.map_or(self.indicator.is_nullified, |entry| entry.is_nullified)
    }

    fn is_modified(&self) -> bool {
        self.entry.map_or(self.indicator.is_modified, |entry| entry.is_modified)
    }

    /// Writes to this state; for mapping entries only those under its key.
    fn writes(&self) -> &[(PathId, WriteKind)] {
        match self.entry {
            Some(entry) => &entry.writes,
            None => &self.indicator.writes,
        }
    }
}

struct FunctionBuilder<'a> {
    cx: &'a Context,
    scope: ScopeId,
    node: NodeId,
}

impl<'a> FunctionBuilder<'a> {
    fn new(cx: &'a Context, scope: ScopeId) -> Self {
        Self { cx, scope, node: cx.scope(scope).node }
    }

    fn build(&self) -> Result<CircuitFunction> {
        let name = self.cx.scope(self.scope).name.clone().unwrap_or_default();
        let states = self.states()?;

        let mut parameters: Vec<CircuitParam> = self
            .cx
            .get_function_parameters(self.node)
            .into_iter()
            .filter_map(|node| self.declaration_param(node))
            .collect();
        for state in &states {
            parameters.extend(self.boilerplate_params(state).into_iter().map(CircuitParam::Boilerplate));
        }
        let return_parameters = self
            .cx
            .get_function_return_parameters(self.node)
            .into_iter()
            .filter_map(|node| self.declaration_param(node))
            .collect();

        let mut body = CircuitBlock::default();
        for state in &states {
            let indicator = state.indicator;
            if indicator.is_whole && (state.is_accessed() || state.is_nullified()) {
                body.pre_statements.push(self.boilerplate_statement(
                    state,
                    BoilerplateKind::OldCommitmentPreimage,
                    None,
                ));
            }
            let delta = self.delta(state);
            if let (true, Some((kind, value))) = (indicator.is_partitioned, &delta) {
                body.pre_statements.push(self.boilerplate_statement(state, *kind, Some(value.clone())));
            }
            if state.is_modified() {
                let value = if indicator.is_partitioned { delta.map(|(_, value)| value) } else { None };
                body.post_statements.push(self.boilerplate_statement(
                    state,
                    BoilerplateKind::NewCommitment,
                    value,
                ));
            }
        }
        for statement in self.cx.get_function_body_statements(self.node) {
            body.statements.extend(self.statements(statement));
        }

        Ok(CircuitFunction { name, parameters, return_parameters, body })
    }

    fn states(&self) -> Result<Vec<StateRef<'a>>> {
        let cx = self.cx;
        let Some(function) = cx.function_indicator(self.scope) else {
            return Ok(Vec::new());
        };
        let mut states = Vec::new();
        for id in &function.state_variables {
            let Some(binding) = cx.binding_by_id(*id).filter(|b| b.is_secret_state()) else {
                continue;
            };
            let indicator = binding.indicator(self.scope).ok_or_else(|| {
                CompilerError::Other(format!("'{}' has no indicator in this function", binding.name))
            })?;
            if !indicator.is_whole && !indicator.is_partitioned {
                return Err(CompilerError::Ordering(format!(
                    "'{}' has not been classified whole or partitioned",
                    binding.name
                )));
            }
            if indicator.is_mapping && !indicator.mapping_keys.is_empty() {
                for entry in &indicator.mapping_keys {
                    let key = sanitise_key(&entry.key);
                    states.push(StateRef {
                        name: format!("{}_{}", binding.name, key),
                        mapping_key: Some(key),
                        indicator,
                        entry: Some(entry),
                    });
                }
            } else {
                states.push(StateRef {
                    name: binding.name.clone(),
                    mapping_key: None,
                    indicator,
                    entry: None,
                });
            }
        }
        Ok(states)
    }

    fn declaration_param(&self, node: NodeId) -> Option<CircuitParam> {
        match self.cx.ast().kind(node) {
            NodeKind::VariableDeclaration { name, type_string, is_secret, .. } => {
                Some(CircuitParam::VariableDeclaration {
                    name: name.clone(),
                    type_name: type_string.clone(),
                    is_private: *is_secret,
                })
            }
            _ => None,
        }
    }

    /// The folded delta of every partial write to `state`, with the
    /// direction of the first one.
    fn delta(&self, state: &StateRef<'a>) -> Option<(BoilerplateKind, String)> {
        let mut folded: Option<(WriteKind, String)> = None;
        for (path, kind) in state.writes() {
            let kind = *kind;
            if kind == WriteKind::Overwrite {
                continue;
            }
            let text = self.delta_text(self.cx.path(*path).node);
            folded = Some(match folded {
                None => (kind, text),
                Some((first, acc)) if first == kind => (first, format!("{} + ({})", acc, text)),
                Some((first, acc)) => (first, format!("{} - ({})", acc, text)),
            });
        }
        folded.map(|(kind, text)| {
            let bp_type = if kind == WriteKind::Decrement {
                BoilerplateKind::Decrementation
            } else {
                BoilerplateKind::Incrementation
            };
            (bp_type, text)
        })
    }

    fn delta_text(&self, write: NodeId) -> String {
        let Some(site) = classify_write(self.cx, write) else {
            return String::new();
        };
        if site.delta.is_empty() {
            return "1".to_string();
        }
        let terms: Vec<String> =
            site.delta.iter().map(|term| self.expression(*term).to_string()).collect();
        terms.join(" + ")
    }

    fn boilerplate_params(&self, state: &StateRef<'a>) -> Vec<BoilerplateParam> {
        let indicator = state.indicator;
        let whole = indicator.is_whole;
        let nullified = state.is_nullified();
        let accessed = state.is_accessed();
        let modified = state.is_modified();
        let param = |bp_type, new_commitment_value: Option<String>| BoilerplateParam {
            name: state.name.clone(),
            bp_type,
            is_accessed: accessed,
            is_nullified: nullified,
            is_whole: whole,
            is_partitioned: !whole,
            initialisation_required: whole && nullified,
            mapping_key_name: state.mapping_key.clone(),
            new_commitment_value,
        };

        let mut params = Vec::new();
        if state.mapping_key.is_some() {
            params.push(param(BoilerplateKind::Mapping, None));
        }
        let spends_old = if whole { accessed || nullified } else { nullified };
        if whole && !nullified && accessed {
            params.push(param(BoilerplateKind::ProofOfKeyOwnership, None));
        }
        if spends_old {
            params.push(param(BoilerplateKind::Nullification, None));
            params.push(param(BoilerplateKind::OldCommitmentPreimage, None));
            params.push(param(BoilerplateKind::OldCommitmentExistence, None));
        }
        if modified {
            let value = if whole { None } else { self.delta(state).map(|(_, value)| value) };
            params.push(param(BoilerplateKind::NewCommitment, value));
            if indicator.encryption_required {
                params.push(param(BoilerplateKind::Encryption, None));
            }
        }
        params
    }

    fn boilerplate_statement(
        &self,
        state: &StateRef<'a>,
        bp_type: BoilerplateKind,
        new_commitment_value: Option<String>,
    ) -> CircuitStatement {
        CircuitStatement::BoilerplateStatement(BoilerplateStatement {
            name: state.name.clone(),
            bp_type,
            is_whole: state.indicator.is_whole,
            is_partitioned: state.indicator.is_partitioned,
            new_commitment_value,
        })
    }

    fn statements(&self, node: NodeId) -> Vec<CircuitStatement> {
        let cx = self.cx;
        match cx.ast().kind(node) {
            NodeKind::Block { statements } => {
                statements.iter().flat_map(|statement| self.statements(*statement)).collect()
            }
            NodeKind::ExpressionStatement { expression } => {
                let expression = *expression;
                if cx.get_path(expression).is_some_and(|path| cx.is_external_function_call(path)) {
                    return Vec::new();
                }
                let annotations = cx.ast().annotations(expression);
                if let (Some(bp_type), true) = (annotations.bp_type, annotations.is_partitioned) {
                    if let Some(site) = classify_write(cx, expression) {
                        return vec![CircuitStatement::BoilerplateStatement(BoilerplateStatement {
                            name: self.expression(site.target_node).to_string(),
                            bp_type,
                            is_whole: false,
                            is_partitioned: true,
                            new_commitment_value: Some(self.delta_text(expression)),
                        })];
                    }
                }
                vec![CircuitStatement::ExpressionStatement {
                    expression: self.expression(expression),
                    is_var_dec: false,
                }]
            }
            NodeKind::VariableDeclarationStatement { declarations, initial_value } => {
                let Some(name) = declarations.first().and_then(|d| cx.ast().kind(*d).name()) else {
                    return Vec::new();
                };
                let target = CircuitExpression::identifier(name);
                let expression = match initial_value {
                    Some(value) => CircuitExpression::Assignment {
                        operator: "=".to_string(),
                        left_hand_side: Box::new(target),
                        right_hand_side: Box::new(self.expression(*value)),
                    },
                    None => target,
                };
                vec![CircuitStatement::ExpressionStatement { expression, is_var_dec: true }]
            }
            NodeKind::IfStatement { condition, true_body, false_body } => {
                vec![CircuitStatement::IfStatement {
                    condition: self.expression(*condition),
                    true_body: self.statements(*true_body),
                    false_body: false_body.map(|body| self.statements(body)).unwrap_or_default(),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn expression(&self, node: NodeId) -> CircuitExpression {
        let cx = self.cx;
        let boxed = |node: NodeId| Box::new(self.expression(node));
        match cx.ast().kind(node) {
            NodeKind::Identifier { name, .. } => CircuitExpression::identifier(name.clone()),
            NodeKind::Literal { value, .. } => CircuitExpression::Literal { value: value.clone() },
            _ if cx.is_msg_sender(node) => CircuitExpression::MsgSender,
            NodeKind::MemberAccess { member_name, expression, .. } => CircuitExpression::MemberAccess {
                expression: boxed(*expression),
                member_name: member_name.clone(),
            },
            NodeKind::IndexAccess { base_expression, index_expression } => {
                CircuitExpression::IndexAccess {
                    base_expression: boxed(*base_expression),
                    index_expression: boxed(*index_expression),
                }
            }
            NodeKind::BinaryOperation { operator, left_expression, right_expression } => {
                CircuitExpression::BinaryOperation {
                    operator: operator.clone(),
                    left_expression: boxed(*left_expression),
                    right_expression: boxed(*right_expression),
                }
            }
            NodeKind::UnaryOperation { operator, prefix, sub_expression } => {
                CircuitExpression::UnaryOperation {
                    operator: operator.clone(),
                    prefix: *prefix,
                    sub_expression: boxed(*sub_expression),
                }
            }
            NodeKind::Assignment { operator, left_hand_side, right_hand_side, .. } => {
                CircuitExpression::Assignment {
                    operator: operator.clone(),
                    left_hand_side: boxed(*left_hand_side),
                    right_hand_side: boxed(*right_hand_side),
                }
            }
            NodeKind::Conditional { condition, true_expression, false_expression } => {
                CircuitExpression::FunctionCall {
                    name: "conditional".to_string(),
                    arguments: [condition, true_expression, false_expression]
                        .into_iter()
                        .map(|n| self.expression(*n))
                        .collect(),
                }
            }
            NodeKind::FunctionCall { expression, arguments } => {
                match internal_callee(cx, self.scope, node) {
                    Some(callee) => {
                        CircuitExpression::InternalFunctionCall(self.internal_call(callee, arguments))
                    }
                    None => CircuitExpression::FunctionCall {
                        name: self.expression(*expression).to_string(),
                        arguments: arguments.iter().map(|a| self.expression(*a)).collect(),
                    },
                }
            }
            other => CircuitExpression::identifier(other.node_type().to_string()),
        }
    }

    fn internal_call(&self, callee: ScopeId, arguments: &[NodeId]) -> InternalFunctionCall {
        let cx = self.cx;
        let callee_scope = cx.scope(callee);
        let old_state_name = cx
            .get_function_parameters(callee_scope.node)
            .into_iter()
            .filter_map(|p| cx.ast().kind(p).name().map(str::to_string))
            .collect();
        let new_state_name = arguments
            .iter()
            .map(|argument| match cx.ast().kind(*argument) {
                _ if cx.is_msg_sender(*argument) => StateName::new("msgSender"),
                NodeKind::MemberAccess { member_name, expression, .. } => {
                    StateName::member(self.expression(*expression).to_string(), member_name.clone())
                }
                _ => StateName::new(self.expression(*argument).to_string()),
            })
            .collect();

        InternalFunctionCall {
            name: callee_scope.name.clone().unwrap_or_default(),
            internal_function_interacts_with_secret: cx
                .function_indicator(callee)
                .is_some_and(|f| f.interacts_with_secret),
            old_state_name,
            new_state_name,
            circuit_arguments: Vec::new(),
            circuit_return: Vec::new(),
            circuit_import: !self.shares_partitioned_write(callee),
        }
    }

    /// Whether this function and `callee` both write one partitioned state.
    fn shares_partitioned_write(&self, callee: ScopeId) -> bool {
        let cx = self.cx;
        let written = |scope: ScopeId, id: DeclId| {
            cx.indicator(scope, id).is_some_and(|i| i.is_partitioned && i.is_modified)
        };
        cx.secret_state_ids().into_iter().any(|id| written(self.scope, id) && written(callee, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_access_displays_as_mapping_state_name() {
        let expression = CircuitExpression::IndexAccess {
            base_expression: Box::new(CircuitExpression::identifier("balances")),
            index_expression: Box::new(CircuitExpression::MsgSender),
        };
        assert_eq!(expression.to_string(), "balances_msgSender");
    }

    #[test]
    fn test_rename_to_member_access() {
        let mut expression = CircuitExpression::Assignment {
            operator: "=".to_string(),
            left_hand_side: Box::new(CircuitExpression::identifier("a")),
            right_hand_side: Box::new(CircuitExpression::BinaryOperation {
                operator: "+".to_string(),
                left_expression: Box::new(CircuitExpression::identifier("a")),
                right_expression: Box::new(CircuitExpression::identifier("ab")),
            }),
        };
        expression.rename(&[("a".to_string(), StateName::member("s", "x"))]);
        assert_eq!(expression.to_string(), "s.x = s.x + ab");
    }

    #[test]
    fn test_rename_swapped_identifiers() {
        let mut expression = CircuitExpression::BinaryOperation {
            operator: "-".to_string(),
            left_expression: Box::new(CircuitExpression::identifier("y")),
            right_expression: Box::new(CircuitExpression::identifier("z")),
        };
        expression.rename(&[
            ("y".to_string(), StateName::new("z")),
            ("z".to_string(), StateName::new("y")),
        ]);
        assert_eq!(expression.to_string(), "z - y");
    }

    #[test]
    fn test_param_serialises_with_node_type() {
        let param = CircuitParam::Boilerplate(BoilerplateParam {
            name: "a".to_string(),
            bp_type: BoilerplateKind::Nullification,
            is_accessed: true,
            is_nullified: false,
            is_whole: true,
            is_partitioned: false,
            initialisation_required: false,
            mapping_key_name: None,
            new_commitment_value: None,
        });
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json["nodeType"], "Boilerplate");
        assert_eq!(json["bpType"], "nullification");
        assert_eq!(json["isAccessed"], true);
        assert!(json.get("mappingKeyName").is_none());
    }
}
