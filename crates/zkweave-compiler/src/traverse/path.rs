//! Node paths: the parent links that nodes themselves never carry
//!
//! A path records where a node sits: its parent node, the key of the parent
//! field holding it, and its index when that field is a list. For a node at
//! `parent[key]` the container is `parent[key]`; it is the node itself when
//! the field holds a single node, and the list when it holds many, in which
//! case `container[index]` is the node.

use super::{is_scopable, Context};
use crate::ast::{Field, NodeId, NodeType};
use crate::error::{CompilerError, Result};
use crate::scope::ScopeId;
use serde::Serialize;

/// Key used for the root path, whose notional parent holds the whole tree.
pub const ROOT_KEY: &str = "ast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PathId(pub(crate) u32);

impl PathId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    pub node: NodeId,
    pub node_type: NodeType,
    pub parent: Option<NodeId>,
    /// Name of the parent field holding the node (its container name).
    pub key: &'static str,
    /// Position in the container, present exactly when the container is a list.
    pub index: Option<usize>,
    pub parent_path: Option<PathId>,
    pub scope: ScopeId,
}

impl NodePath {
    pub fn in_list(&self) -> bool {
        self.index.is_some()
    }

    pub fn container_name(&self) -> &'static str {
        self.key
    }

    fn location_segment(&self) -> String {
        match self.index {
            Some(index) => format!("{}[{}]", self.key, index),
            None => self.key.to_string(),
        }
    }
}

/// The container a caller claims holds a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Node(NodeId),
    List(Vec<NodeId>),
}

/// Arguments for constructing a path explicitly.
#[derive(Debug, Clone)]
pub struct PathSpec {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub key: &'static str,
    pub container: Container,
    pub index: Option<usize>,
    pub parent_path: Option<PathId>,
}

impl Context {
    /// The path of the tree's root node, constructed on first use.
    pub fn root_path(&mut self) -> Result<PathId> {
        let root = self.ast.root();
        self.construct_path(PathSpec {
            node: root,
            parent: None,
            key: ROOT_KEY,
            container: Container::Node(root),
            index: None,
            parent_path: None,
        })
    }

    /// Constructs (or returns the cached) path for a node.
    ///
    /// The `PathSpec` is checked against the tree first: `parent[key]` must be the
    /// claimed container, and the container must hold the node at `index`
    /// (lists) or be the node itself. Any mismatch is a structural error.
    pub fn construct_path(&mut self, spec: PathSpec) -> Result<PathId> {
        self.validate_spec(&spec)?;
        if let Some(existing) = self.get_path(spec.node) {
            return Ok(existing);
        }
        self.insert_path(spec.node, spec.parent, spec.key, spec.index, spec.parent_path)
    }

    /// Path for the child of `parent_path` found at `key`/`index`; the
    /// container is read from the tree so the triple is consistent by
    /// construction.
    pub(crate) fn construct_child(
        &mut self,
        parent_path: PathId,
        key: &'static str,
        index: Option<usize>,
        node: NodeId,
    ) -> Result<PathId> {
        if let Some(existing) = self.get_path(node) {
            return Ok(existing);
        }
        let parent = self.path(parent_path).node;
        self.insert_path(node, Some(parent), key, index, Some(parent_path))
    }

    fn validate_spec(&self, spec: &PathSpec) -> Result<()> {
        let location = match spec.parent_path {
            Some(pp) => format!("{}.{}", self.get_location(pp), spec.key),
            None => spec.key.to_string(),
        };
        let fail = |reason: &str| Err(CompilerError::structural(location.clone(), reason));

        if spec.node.index() >= self.ast.len() {
            return fail("node is not part of the tree");
        }

        let Some(parent) = spec.parent else {
            if spec.node != self.ast.root() || spec.parent_path.is_some() {
                return fail("can't create a path without a parent");
            }
            if spec.container != Container::Node(spec.node) {
                return fail("container !== node for the root");
            }
            return Ok(());
        };

        match spec.parent_path {
            Some(pp) if self.path(pp).node == parent => {}
            Some(_) => return fail("parent path does not wrap the parent node"),
            None => return fail("can't create a path for a non-root node without a parent path"),
        }

        let Some(field) = self.ast.kind(parent).field(spec.key) else {
            return fail("parent has no child field with this key");
        };
        let matches_field = match (&spec.container, field) {
            (Container::Node(claimed), Field::Node(actual)) => *claimed == actual,
            (Container::List(claimed), Field::List(actual)) => claimed.as_slice() == actual,
            _ => false,
        };
        if !matches_field {
            return fail("container !== parent[key]");
        }

        match &spec.container {
            Container::List(items) => {
                let Some(index) = spec.index else {
                    return fail("index must exist for a container of type list");
                };
                if items.get(index) != Some(&spec.node) {
                    return fail("parent[key][index] !== node for a container of type list");
                }
            }
            Container::Node(claimed) => {
                if spec.index.is_some() {
                    tracing::warn!(%location, "index shouldn't exist for a non-list container");
                }
                if *claimed != spec.node {
                    return fail("container !== node for a non-list container");
                }
            }
        }
        Ok(())
    }

    fn insert_path(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        key: &'static str,
        index: Option<usize>,
        parent_path: Option<PathId>,
    ) -> Result<PathId> {
        let node_type = self.ast.node_type(node);
        let parent_scope = parent_path.map(|pp| self.path(pp).scope);
        let id = PathId(self.paths.len() as u32);
        let in_list = parent
            .map(|p| matches!(self.ast.kind(p).field(key), Some(Field::List(_))))
            .unwrap_or(false);

        // The root's own scope is attached below, once the path exists.
        self.paths.push(NodePath {
            node,
            node_type,
            parent,
            key,
            index: if in_list { index } else { None },
            parent_path,
            scope: parent_scope.unwrap_or(ScopeId(0)),
        });
        self.path_cache.insert(node, id);
        tracing::trace!(path = id.0, %node_type, key, "constructed path");

        match parent_scope {
            Some(scope) => {
                self.update_scope(scope, id)?;
                if is_scopable(node_type) {
                    let own = self.create_scope(id, Some(scope));
                    self.paths[id.index()].scope = own;
                    self.hoist_declarations(id)?;
                }
            }
            None => {
                let own = self.create_scope(id, None);
                self.paths[id.index()].scope = own;
                self.hoist_declarations(id)?;
            }
        }
        Ok(id)
    }

    /// Contract and source-unit members are bound as soon as their container's
    /// scope exists, so references to functions declared further down resolve.
    fn hoist_declarations(&mut self, path: PathId) -> Result<()> {
        if matches!(
            self.path(path).node_type,
            NodeType::SourceUnit | NodeType::ContractDefinition
        ) {
            self.child_paths(path)?;
        }
        Ok(())
    }

    /// A human-readable location such as `ast.nodes[2].nodes[0].body.statements[1]`.
    pub fn get_location(&self, path: PathId) -> String {
        let mut parts: Vec<String> =
            self.get_ancestry(path).iter().map(|p| self.path(*p).location_segment()).collect();
        parts.reverse();
        parts.join(".")
    }

    // ANCESTRY

    /// The first path, starting at `path` itself and moving up, for which
    /// `predicate` holds.
    pub fn find_ancestor(
        &self,
        path: PathId,
        mut predicate: impl FnMut(&Context, PathId) -> bool,
    ) -> Option<PathId> {
        let mut current = Some(path);
        while let Some(p) = current {
            if predicate(self, p) {
                return Some(p);
            }
            current = self.path(p).parent_path;
        }
        None
    }

    /// Same as [`Context::find_ancestor`], but starting at the parent.
    pub fn find_ancestor_from_parent(
        &self,
        path: PathId,
        predicate: impl FnMut(&Context, PathId) -> bool,
    ) -> Option<PathId> {
        let parent = self.path(path).parent_path?;
        self.find_ancestor(parent, predicate)
    }

    /// Runs `query` on each ancestor (including `path`) and returns the first
    /// non-`None` answer.
    pub fn query_ancestors<T>(
        &self,
        path: PathId,
        mut query: impl FnMut(&Context, PathId) -> Option<T>,
    ) -> Option<T> {
        let mut current = Some(path);
        while let Some(p) = current {
            if let Some(found) = query(self, p) {
                return Some(found);
            }
            current = self.path(p).parent_path;
        }
        None
    }

    /// `path` followed by each of its ancestors up to the root.
    pub fn get_ancestry(&self, path: PathId) -> Vec<PathId> {
        let mut out = Vec::new();
        let mut current = Some(path);
        while let Some(p) = current {
            out.push(p);
            current = self.path(p).parent_path;
        }
        out
    }

    pub fn is_descendant(&self, path: PathId, maybe_ancestor: PathId) -> bool {
        self.find_ancestor_from_parent(path, |_, p| p == maybe_ancestor).is_some()
    }

    pub fn is_ancestor(&self, path: PathId, maybe_descendant: PathId) -> bool {
        self.is_descendant(maybe_descendant, path)
    }

    /// The nearest path of the given node type, including `path` itself.
    pub fn get_ancestor_of_type(&self, path: PathId, node_type: NodeType) -> Option<PathId> {
        self.find_ancestor(path, |cx, p| cx.path(p).node_type == node_type)
    }

    /// The nearest path held in a parent field named `container_name`,
    /// including `path` itself.
    pub fn get_ancestor_contained_within(
        &self,
        path: PathId,
        container_name: &str,
    ) -> Option<PathId> {
        self.find_ancestor(path, |cx, p| cx.path(p).key == container_name)
    }

    /// Whether `path` or any ancestor has one of the given node types.
    pub fn is_in_type(&self, path: PathId, node_types: &[NodeType]) -> bool {
        self.find_ancestor(path, |cx, p| node_types.contains(&cx.path(p).node_type)).is_some()
    }

    // SIBLINGS

    fn list_container(&self, path: PathId) -> Option<&[NodeId]> {
        let p = self.path(path);
        p.index?;
        match self.ast.kind(p.parent?).field(p.key) {
            Some(Field::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn get_sibling_node(&self, path: PathId, index: usize) -> Option<NodeId> {
        self.list_container(path)?.get(index).copied()
    }

    /// All nodes in the container, including `path`'s own node.
    pub fn get_sibling_nodes(&self, path: PathId) -> Option<Vec<NodeId>> {
        self.list_container(path).map(<[NodeId]>::to_vec)
    }

    pub fn get_first_sibling_node(&self, path: PathId) -> Option<NodeId> {
        self.list_container(path)?.first().copied()
    }

    pub fn get_last_sibling_node(&self, path: PathId) -> Option<NodeId> {
        self.list_container(path)?.last().copied()
    }

    pub fn get_prev_sibling_node(&self, path: PathId) -> Option<NodeId> {
        let index = self.path(path).index?;
        self.get_sibling_node(path, index.checked_sub(1)?)
    }

    pub fn get_next_sibling_node(&self, path: PathId) -> Option<NodeId> {
        let index = self.path(path).index?;
        self.get_sibling_node(path, index + 1)
    }

    pub fn get_all_next_sibling_nodes(&self, path: PathId) -> Option<Vec<NodeId>> {
        let index = self.path(path).index?;
        Some(self.list_container(path)?[index + 1..].to_vec())
    }

    /// Earlier siblings, nearest first.
    pub fn get_all_prev_sibling_nodes(&self, path: PathId) -> Option<Vec<NodeId>> {
        let index = self.path(path).index?;
        Some(self.list_container(path)?[..index].iter().rev().copied().collect())
    }
}
