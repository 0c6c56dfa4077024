//! Arena representation of the annotated contract tree
//!
//! The external parser produces a tree of nodes which is stored here as a flat
//! arena indexed by [`NodeId`]. Children are referenced by id from the
//! node-type-specific fields of [`NodeKind`], so nodes never hold a link to
//! their parent; parent/container/key information lives in the Path side-table
//! built during traversal (see [`crate::traverse`]).

use crate::error::{CompilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zkweave_runtime::BoilerplateKind;

/// Index of a node in its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parser-assigned declaration id, globally unique within one compilation.
pub type DeclId = i64;

/// Ids the parser assigns to built-in and magic identifiers (`msg`, `this`,
/// `require`) fall outside the range of user declarations.
pub fn is_builtin_declaration(id: DeclId) -> bool {
    id < 0 || id > 4_294_967_200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all_fields = "camelCase")]
pub enum NodeKind {
    SourceUnit {
        nodes: Vec<NodeId>,
        #[serde(default)]
        exported_symbols: BTreeMap<String, Vec<DeclId>>,
    },
    PragmaDirective {
        literals: Vec<String>,
    },
    ContractDefinition {
        id: DeclId,
        name: String,
        #[serde(default)]
        base_contracts: Vec<NodeId>,
        nodes: Vec<NodeId>,
    },
    InheritanceSpecifier {
        base_name: NodeId,
    },
    FunctionDefinition {
        id: DeclId,
        name: String,
        #[serde(default)]
        visibility: String,
        parameters: NodeId,
        return_parameters: NodeId,
        body: Option<NodeId>,
    },
    ParameterList {
        parameters: Vec<NodeId>,
    },
    Block {
        statements: Vec<NodeId>,
    },
    VariableDeclaration {
        id: DeclId,
        name: String,
        #[serde(default)]
        type_string: String,
        type_name: Option<NodeId>,
        #[serde(default)]
        state_variable: bool,
        #[serde(default)]
        constant: bool,
        #[serde(default)]
        is_secret: bool,
        #[serde(default)]
        is_known: bool,
        #[serde(default)]
        is_unknown: bool,
        #[serde(default)]
        is_reinitialisable: bool,
    },
    VariableDeclarationStatement {
        declarations: Vec<NodeId>,
        initial_value: Option<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    IfStatement {
        condition: NodeId,
        true_body: NodeId,
        false_body: Option<NodeId>,
    },
    ForStatement {
        initialization_expression: Option<NodeId>,
        condition: Option<NodeId>,
        loop_expression: Option<NodeId>,
        body: NodeId,
    },
    WhileStatement {
        condition: NodeId,
        body: NodeId,
    },
    DoWhileStatement {
        condition: NodeId,
        body: NodeId,
    },
    InlineAssembly {},
    Return {
        expression: Option<NodeId>,
    },
    Assignment {
        operator: String,
        left_hand_side: NodeId,
        right_hand_side: NodeId,
        #[serde(default)]
        encrypt: bool,
    },
    BinaryOperation {
        operator: String,
        left_expression: NodeId,
        right_expression: NodeId,
    },
    UnaryOperation {
        operator: String,
        prefix: bool,
        sub_expression: NodeId,
    },
    Conditional {
        condition: NodeId,
        true_expression: NodeId,
        false_expression: NodeId,
    },
    Identifier {
        name: String,
        referenced_declaration: Option<DeclId>,
        #[serde(default)]
        type_string: String,
        #[serde(default)]
        is_known: bool,
        #[serde(default)]
        is_unknown: bool,
    },
    Literal {
        value: String,
        #[serde(default)]
        kind: String,
    },
    FunctionCall {
        expression: NodeId,
        arguments: Vec<NodeId>,
    },
    MemberAccess {
        member_name: String,
        expression: NodeId,
        #[serde(default)]
        type_string: String,
    },
    IndexAccess {
        base_expression: NodeId,
        index_expression: NodeId,
    },
    ElementaryTypeName {
        name: String,
    },
    UserDefinedTypeName {
        name: String,
        referenced_declaration: Option<DeclId>,
    },
    Mapping {
        key_type: NodeId,
        value_type: NodeId,
    },
}

/// Discriminant of [`NodeKind`], used for dispatch and ancestry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    SourceUnit,
    PragmaDirective,
    ContractDefinition,
    InheritanceSpecifier,
    FunctionDefinition,
    ParameterList,
    Block,
    VariableDeclaration,
    VariableDeclarationStatement,
    ExpressionStatement,
    IfStatement,
    ForStatement,
    WhileStatement,
    DoWhileStatement,
    InlineAssembly,
    Return,
    Assignment,
    BinaryOperation,
    UnaryOperation,
    Conditional,
    Identifier,
    Literal,
    FunctionCall,
    MemberAccess,
    IndexAccess,
    ElementaryTypeName,
    UserDefinedTypeName,
    Mapping,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A child-holding field of a node: either a single node or an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Node(NodeId),
    List(&'a [NodeId]),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::SourceUnit { .. } => NodeType::SourceUnit,
            Self::PragmaDirective { .. } => NodeType::PragmaDirective,
            Self::ContractDefinition { .. } => NodeType::ContractDefinition,
            Self::InheritanceSpecifier { .. } => NodeType::InheritanceSpecifier,
            Self::FunctionDefinition { .. } => NodeType::FunctionDefinition,
            Self::ParameterList { .. } => NodeType::ParameterList,
            Self::Block { .. } => NodeType::Block,
            Self::VariableDeclaration { .. } => NodeType::VariableDeclaration,
            Self::VariableDeclarationStatement { .. } => NodeType::VariableDeclarationStatement,
            Self::ExpressionStatement { .. } => NodeType::ExpressionStatement,
            Self::IfStatement { .. } => NodeType::IfStatement,
            Self::ForStatement { .. } => NodeType::ForStatement,
            Self::WhileStatement { .. } => NodeType::WhileStatement,
            Self::DoWhileStatement { .. } => NodeType::DoWhileStatement,
            Self::InlineAssembly { .. } => NodeType::InlineAssembly,
            Self::Return { .. } => NodeType::Return,
            Self::Assignment { .. } => NodeType::Assignment,
            Self::BinaryOperation { .. } => NodeType::BinaryOperation,
            Self::UnaryOperation { .. } => NodeType::UnaryOperation,
            Self::Conditional { .. } => NodeType::Conditional,
            Self::Identifier { .. } => NodeType::Identifier,
            Self::Literal { .. } => NodeType::Literal,
            Self::FunctionCall { .. } => NodeType::FunctionCall,
            Self::MemberAccess { .. } => NodeType::MemberAccess,
            Self::IndexAccess { .. } => NodeType::IndexAccess,
            Self::ElementaryTypeName { .. } => NodeType::ElementaryTypeName,
            Self::UserDefinedTypeName { .. } => NodeType::UserDefinedTypeName,
            Self::Mapping { .. } => NodeType::Mapping,
        }
    }

    /// The child-holding fields of this node, in traversal order.
    ///
    /// The order is fixed per node type, e.g. a `VariableDeclarationStatement`'s
    /// declarations are visited before its initial value, and an `IndexAccess`'s
    /// index before its base.
    pub fn visitable_keys(&self) -> &'static [&'static str] {
        match self {
            Self::SourceUnit { .. } => &["nodes"],
            Self::ContractDefinition { .. } => &["baseContracts", "nodes"],
            Self::InheritanceSpecifier { .. } => &["baseName"],
            Self::FunctionDefinition { .. } => &["parameters", "returnParameters", "body"],
            Self::ParameterList { .. } => &["parameters"],
            Self::Block { .. } => &["statements"],
            Self::VariableDeclaration { .. } => &["typeName"],
            Self::VariableDeclarationStatement { .. } => &["declarations", "initialValue"],
            Self::ExpressionStatement { .. } => &["expression"],
            Self::IfStatement { .. } => &["condition", "trueBody", "falseBody"],
            Self::ForStatement { .. } => {
                &["initializationExpression", "condition", "loopExpression", "body"]
            }
            Self::WhileStatement { .. } | Self::DoWhileStatement { .. } => &["condition", "body"],
            Self::Return { .. } => &["expression"],
            Self::Assignment { .. } => &["leftHandSide", "rightHandSide"],
            Self::BinaryOperation { .. } => &["leftExpression", "rightExpression"],
            Self::UnaryOperation { .. } => &["subExpression"],
            Self::Conditional { .. } => &["condition", "trueExpression", "falseExpression"],
            Self::FunctionCall { .. } => &["expression", "arguments"],
            Self::MemberAccess { .. } => &["expression"],
            Self::IndexAccess { .. } => &["indexExpression", "baseExpression"],
            Self::Mapping { .. } => &["keyType", "valueType"],
            Self::PragmaDirective { .. }
            | Self::InlineAssembly { .. }
            | Self::Identifier { .. }
            | Self::Literal { .. }
            | Self::ElementaryTypeName { .. }
            | Self::UserDefinedTypeName { .. } => &[],
        }
    }

    /// Looks up a child-holding field by its key. Absent optional children
    /// return `None`.
    pub fn field(&self, key: &str) -> Option<Field<'_>> {
        let node = |id: &NodeId| Some(Field::Node(*id));
        let opt = |id: &Option<NodeId>| id.map(Field::Node);
        match (self, key) {
            (Self::SourceUnit { nodes, .. }, "nodes") => Some(Field::List(nodes)),
            (Self::ContractDefinition { nodes, .. }, "nodes") => Some(Field::List(nodes)),
            (Self::ContractDefinition { base_contracts, .. }, "baseContracts") => {
                Some(Field::List(base_contracts))
            }
            (Self::InheritanceSpecifier { base_name }, "baseName") => node(base_name),
            (Self::FunctionDefinition { parameters, .. }, "parameters") => node(parameters),
            (Self::FunctionDefinition { return_parameters, .. }, "returnParameters") => {
                node(return_parameters)
            }
            (Self::FunctionDefinition { body, .. }, "body") => opt(body),
            (Self::ParameterList { parameters }, "parameters") => Some(Field::List(parameters)),
            (Self::Block { statements }, "statements") => Some(Field::List(statements)),
            (Self::VariableDeclaration { type_name, .. }, "typeName") => opt(type_name),
            (Self::VariableDeclarationStatement { declarations, .. }, "declarations") => {
                Some(Field::List(declarations))
            }
            (Self::VariableDeclarationStatement { initial_value, .. }, "initialValue") => {
                opt(initial_value)
            }
            (Self::ExpressionStatement { expression }, "expression") => node(expression),
            (Self::IfStatement { condition, .. }, "condition") => node(condition),
            (Self::IfStatement { true_body, .. }, "trueBody") => node(true_body),
            (Self::IfStatement { false_body, .. }, "falseBody") => opt(false_body),
            (Self::ForStatement { initialization_expression, .. }, "initializationExpression") => {
                opt(initialization_expression)
            }
            (Self::ForStatement { condition, .. }, "condition") => opt(condition),
            (Self::ForStatement { loop_expression, .. }, "loopExpression") => opt(loop_expression),
            (Self::ForStatement { body, .. }, "body") => node(body),
            (Self::WhileStatement { condition, .. }, "condition") => node(condition),
            (Self::WhileStatement { body, .. }, "body") => node(body),
            (Self::DoWhileStatement { condition, .. }, "condition") => node(condition),
            (Self::DoWhileStatement { body, .. }, "body") => node(body),
            (Self::Return { expression }, "expression") => opt(expression),
            (Self::Assignment { left_hand_side, .. }, "leftHandSide") => node(left_hand_side),
            (Self::Assignment { right_hand_side, .. }, "rightHandSide") => node(right_hand_side),
            (Self::BinaryOperation { left_expression, .. }, "leftExpression") => {
                node(left_expression)
            }
            (Self::BinaryOperation { right_expression, .. }, "rightExpression") => {
                node(right_expression)
            }
            (Self::UnaryOperation { sub_expression, .. }, "subExpression") => node(sub_expression),
            (Self::Conditional { condition, .. }, "condition") => node(condition),
            (Self::Conditional { true_expression, .. }, "trueExpression") => node(true_expression),
            (Self::Conditional { false_expression, .. }, "falseExpression") => {
                node(false_expression)
            }
            (Self::FunctionCall { expression, .. }, "expression") => node(expression),
            (Self::FunctionCall { arguments, .. }, "arguments") => Some(Field::List(arguments)),
            (Self::MemberAccess { expression, .. }, "expression") => node(expression),
            (Self::IndexAccess { base_expression, .. }, "baseExpression") => node(base_expression),
            (Self::IndexAccess { index_expression, .. }, "indexExpression") => {
                node(index_expression)
            }
            (Self::Mapping { key_type, .. }, "keyType") => node(key_type),
            (Self::Mapping { value_type, .. }, "valueType") => node(value_type),
            _ => None,
        }
    }

    /// Every child id in traversal order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for key in self.visitable_keys() {
            match self.field(key) {
                Some(Field::Node(id)) => out.push(id),
                Some(Field::List(ids)) => out.extend_from_slice(ids),
                None => {}
            }
        }
        out
    }

    /// The declared name, for declarations and identifiers.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::ContractDefinition { name, .. }
            | Self::FunctionDefinition { name, .. }
            | Self::VariableDeclaration { name, .. }
            | Self::Identifier { name, .. }
            | Self::ElementaryTypeName { name }
            | Self::UserDefinedTypeName { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The id of a declaration node.
    pub fn declaration_id(&self) -> Option<DeclId> {
        match self {
            Self::ContractDefinition { id, .. }
            | Self::FunctionDefinition { id, .. }
            | Self::VariableDeclaration { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The `referencedDeclaration` carried directly on this node.
    pub fn referenced_declaration(&self) -> Option<DeclId> {
        match self {
            Self::Identifier { referenced_declaration, .. }
            | Self::UserDefinedTypeName { referenced_declaration, .. } => *referenced_declaration,
            _ => None,
        }
    }
}

/// Facts the core derives and writes back onto nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Annotations {
    pub is_secret: bool,
    pub is_incremented: bool,
    pub is_decremented: bool,
    pub is_accessed: bool,
    pub is_whole: bool,
    pub is_partitioned: bool,
    pub is_nullified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_type: Option<BoilerplateKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub annotations: Annotations,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, annotations: Annotations::default() }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    /// Builds an arena, checking that every child id points inside it and that
    /// no node is reachable from two parents.
    pub fn new(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        let ast = Self { nodes, root };
        ast.validate()?;
        Ok(ast)
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let ast: Self = serde_json::from_str(input)?;
        ast.validate()?;
        Ok(ast)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.nodes[id.index()].node_type()
    }

    pub fn annotations(&self, id: NodeId) -> &Annotations {
        &self.nodes[id.index()].annotations
    }

    pub fn annotations_mut(&mut self, id: NodeId) -> &mut Annotations {
        &mut self.nodes[id.index()].annotations
    }

    /// Ids of every node in the arena, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    fn validate(&self) -> Result<()> {
        if self.root.index() >= self.nodes.len() {
            return Err(CompilerError::structural(
                "ast",
                format!("root id {} outside arena of {} nodes", self.root.0, self.nodes.len()),
            ));
        }
        let mut seen_parent = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            for child in node.kind.children() {
                if child.index() >= self.nodes.len() {
                    return Err(CompilerError::structural(
                        format!("ast.nodes[{}]", index),
                        format!("child id {} outside arena", child.0),
                    ));
                }
                if child == self.root || std::mem::replace(&mut seen_parent[child.index()], true) {
                    return Err(CompilerError::structural(
                        format!("ast.nodes[{}]", index),
                        format!("node {} is contained in more than one position", child.0),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Programmatic construction of an [`Ast`]: children are added before parents.
///
/// # Examples
///
/// ```
/// use zkweave_compiler::ast::{AstBuilder, NodeKind};
///
/// let mut b = AstBuilder::new();
/// let x = b.identifier("x", Some(3));
/// let one = b.literal("1");
/// let sum = b.binary(x, "+", one);
/// let root = b.add(NodeKind::ExpressionStatement { expression: sum });
/// let ast = b.finish(root).unwrap();
/// assert_eq!(ast.len(), 4);
/// ```
#[derive(Debug, Default)]
pub struct AstBuilder {
    nodes: Vec<Node>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn identifier(&mut self, name: &str, referenced_declaration: Option<DeclId>) -> NodeId {
        self.add(NodeKind::Identifier {
            name: name.to_string(),
            referenced_declaration,
            type_string: String::new(),
            is_known: false,
            is_unknown: false,
        })
    }

    pub fn literal(&mut self, value: &str) -> NodeId {
        self.add(NodeKind::Literal { value: value.to_string(), kind: "number".to_string() })
    }

    pub fn binary(&mut self, left: NodeId, operator: &str, right: NodeId) -> NodeId {
        self.add(NodeKind::BinaryOperation {
            operator: operator.to_string(),
            left_expression: left,
            right_expression: right,
        })
    }

    pub fn assignment(&mut self, lhs: NodeId, operator: &str, rhs: NodeId) -> NodeId {
        self.add(NodeKind::Assignment {
            operator: operator.to_string(),
            left_hand_side: lhs,
            right_hand_side: rhs,
            encrypt: false,
        })
    }

    /// An `ExpressionStatement` wrapping `expression`.
    pub fn statement(&mut self, expression: NodeId) -> NodeId {
        self.add(NodeKind::ExpressionStatement { expression })
    }

    pub fn parameter_list(&mut self, parameters: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::ParameterList { parameters })
    }

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Block { statements })
    }

    /// A plain `uint256` declaration; adjust the returned node for decorators.
    pub fn variable(&mut self, id: DeclId, name: &str, state_variable: bool) -> NodeId {
        self.add(NodeKind::VariableDeclaration {
            id,
            name: name.to_string(),
            type_string: "uint256".to_string(),
            type_name: None,
            state_variable,
            constant: false,
            is_secret: false,
            is_known: false,
            is_unknown: false,
            is_reinitialisable: false,
        })
    }

    /// A `secret` state variable declaration.
    pub fn secret_state(&mut self, id: DeclId, name: &str) -> NodeId {
        let node = self.variable(id, name, true);
        if let NodeKind::VariableDeclaration { is_secret, .. } = &mut self.nodes[node.index()].kind {
            *is_secret = true;
        }
        node
    }

    pub fn function(
        &mut self,
        id: DeclId,
        name: &str,
        parameters: Vec<NodeId>,
        statements: Vec<NodeId>,
    ) -> NodeId {
        let parameters = self.parameter_list(parameters);
        let return_parameters = self.parameter_list(Vec::new());
        let body = self.block(statements);
        self.add(NodeKind::FunctionDefinition {
            id,
            name: name.to_string(),
            visibility: "public".to_string(),
            parameters,
            return_parameters,
            body: Some(body),
        })
    }

    pub fn contract(&mut self, id: DeclId, name: &str, nodes: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::ContractDefinition {
            id,
            name: name.to_string(),
            base_contracts: Vec::new(),
            nodes,
        })
    }

    pub fn source_unit(&mut self, nodes: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::SourceUnit { nodes, exported_symbols: BTreeMap::new() })
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn finish(self, root: NodeId) -> Result<Ast> {
        Ast::new(self.nodes, root)
    }
}
