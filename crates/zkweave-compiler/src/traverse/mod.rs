//! Path/Scope engine
//!
//! Every node reached during a walk gets exactly one [`NodePath`] recording
//! its parent, container key and list index, plus the scope it belongs to.
//! Paths live in a side-table owned by [`Context`] and are cached per node, so
//! re-deriving the path for a node always returns the same [`PathId`].
//!
//! Three walks are offered:
//! - [`traverse`] dispatches to a [`Visitor`] on entry and exit of each node,
//! - [`traverse_paths_fast`] calls a closure per path without dispatch,
//! - [`traverse_nodes_fast`] walks the raw arena without building paths.

pub mod path;
pub mod queries;
pub mod visitor;

pub use path::{Container, NodePath, PathId, PathSpec};
pub use visitor::Visitor;

use crate::ast::{Ast, Node, NodeId, NodeType};
use crate::error::{CompilerError, Result};
use crate::scope::{Scope, ScopeId};
use rustc_hash::FxHashMap;
use zkweave_runtime::CompilerConfig;

/// Where the shared tree is in the compilation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Parsed,
    Checked,
    Reconciled,
}

/// Control flags threaded through a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkState {
    /// Abandon the rest of the walk.
    pub stop_traversal: bool,
    /// Do not descend into the current node's children. Reset once honoured.
    pub skip_sub_nodes: bool,
}

/// The tree plus everything derived from it: the Path side-table and cache,
/// and the scope arena with its binding tables.
#[derive(Debug)]
pub struct Context {
    pub(crate) ast: Ast,
    pub(crate) paths: Vec<NodePath>,
    pub(crate) path_cache: FxHashMap<NodeId, PathId>,
    pub(crate) scopes: Vec<Scope>,
    config: CompilerConfig,
    stage: Stage,
}

impl Context {
    pub fn new(ast: Ast, config: CompilerConfig) -> Self {
        Self {
            ast,
            paths: Vec::new(),
            path_cache: FxHashMap::default(),
            scopes: Vec::new(),
            config,
            stage: Stage::Parsed,
        }
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn ast_mut(&mut self) -> &mut Ast {
        &mut self.ast
    }

    pub fn into_ast(self) -> Ast {
        self.ast
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to `next`, which must directly follow the current stage.
    pub(crate) fn advance_stage(&mut self, expected: Stage, next: Stage) -> Result<()> {
        if self.stage != expected {
            return Err(CompilerError::Ordering(format!(
                "expected the tree to be at stage {:?} before moving to {:?}, found {:?}",
                expected, next, self.stage
            )));
        }
        self.stage = next;
        Ok(())
    }

    pub fn path(&self, id: PathId) -> &NodePath {
        &self.paths[id.index()]
    }

    pub fn node(&self, path: PathId) -> &Node {
        self.ast.node(self.path(path).node)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// The cached path for `node`, if one has been constructed.
    pub fn get_path(&self, node: NodeId) -> Option<PathId> {
        self.path_cache.get(&node).copied()
    }

    /// Like [`Context::get_path`], but a missing path is a structural error.
    pub fn expect_path(&self, node: NodeId) -> Result<PathId> {
        self.get_path(node).ok_or_else(|| {
            CompilerError::structural(
                format!("node {}", node.0),
                "node has no path; it has not been reached by a traversal",
            )
        })
    }

    /// Paths for every child of `path`, in the node type's traversal order.
    pub fn child_paths(&mut self, path: PathId) -> Result<Vec<PathId>> {
        let node = self.path(path).node;
        let kind = self.ast.kind(node).clone();
        let mut children = Vec::new();
        for &key in kind.visitable_keys() {
            match kind.field(key) {
                Some(crate::ast::Field::Node(child)) => {
                    children.push(self.construct_child(path, key, None, child)?);
                }
                Some(crate::ast::Field::List(items)) => {
                    for (index, child) in items.iter().enumerate() {
                        children.push(self.construct_child(path, key, Some(index), *child)?);
                    }
                }
                None => {}
            }
        }
        Ok(children)
    }

    /// Constructs paths for the whole tree without dispatching to a visitor.
    pub fn build_paths(&mut self) -> Result<PathId> {
        let root = self.root_path()?;
        let mut state = WalkState::default();
        traverse_paths_fast(self, root, &mut |_, _, _| {}, &mut state)?;
        Ok(root)
    }
}

/// Walks the tree below `path`, calling the visitor's enter hook for each node
/// before its children and the exit hook after.
///
/// The first error raised by a hook aborts the walk and is returned as is.
pub fn traverse<V: Visitor + ?Sized>(
    cx: &mut Context,
    path: PathId,
    visitor: &mut V,
    state: &mut WalkState,
) -> Result<()> {
    if state.stop_traversal {
        return Ok(());
    }
    let node_type = cx.path(path).node_type;
    visitor::dispatch_enter(visitor, node_type, cx, path, state)?;
    if state.stop_traversal {
        return Ok(());
    }

    if state.skip_sub_nodes {
        state.skip_sub_nodes = false;
    } else {
        for child in cx.child_paths(path)? {
            traverse(cx, child, visitor, state)?;
            if state.stop_traversal {
                return Ok(());
            }
        }
    }

    visitor::dispatch_exit(visitor, node_type, cx, path, state)
}

/// Pre-order walk calling `enter` with every path below (and including) `path`.
pub fn traverse_paths_fast<F>(
    cx: &mut Context,
    path: PathId,
    enter: &mut F,
    state: &mut WalkState,
) -> Result<()>
where
    F: FnMut(&Context, PathId, &mut WalkState),
{
    if state.stop_traversal {
        return Ok(());
    }
    enter(cx, path, state);
    if state.skip_sub_nodes {
        state.skip_sub_nodes = false;
        return Ok(());
    }
    for child in cx.child_paths(path)? {
        traverse_paths_fast(cx, child, enter, state)?;
        if state.stop_traversal {
            break;
        }
    }
    Ok(())
}

/// Pre-order walk over raw nodes. No paths are built, so this is safe to use
/// on any subtree, including ones not yet reached by a traversal.
pub fn traverse_nodes_fast<F>(ast: &Ast, node: NodeId, enter: &mut F, state: &mut WalkState)
where
    F: FnMut(&Ast, NodeId, &mut WalkState),
{
    if state.stop_traversal {
        return;
    }
    enter(ast, node, state);
    if state.skip_sub_nodes {
        state.skip_sub_nodes = false;
        return;
    }
    for child in ast.kind(node).children() {
        traverse_nodes_fast(ast, child, enter, state);
        if state.stop_traversal {
            break;
        }
    }
}

/// Node types whose paths open a new scope.
pub fn is_scopable(node_type: NodeType) -> bool {
    matches!(
        node_type,
        NodeType::SourceUnit | NodeType::ContractDefinition | NodeType::FunctionDefinition
    )
}
