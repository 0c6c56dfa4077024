//! Write classification
//!
//! A write only adds to (or only subtracts from) the prior value when it is
//! `x += e`, `x -= e`, `x++`, `x--`, or `x = x ± e1 ± e2 ...` with every sign
//! the same, `x` appearing exactly once on the right and never inside the
//! delta. Every other write to `x` is a general overwrite.

use crate::ast::{DeclId, NodeId, NodeKind, NodeType};
use crate::error::Result;
use crate::scope::WriteKind;
use crate::traverse::{traverse_nodes_fast, Context, PathId, Visitor, WalkState};

/// One classified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSite {
    pub target: DeclId,
    /// The written expression (left-hand side or operand).
    pub target_node: NodeId,
    pub kind: WriteKind,
    /// The added or subtracted terms. Empty for `++`/`--`, which move by one.
    pub delta: Vec<NodeId>,
}

/// Classifies the assignment or unary operation `node` as a write. Returns
/// `None` when `node` writes nothing with a declaration behind it.
pub fn classify_write(cx: &Context, node: NodeId) -> Option<WriteSite> {
    match cx.ast().kind(node) {
        NodeKind::Assignment { operator, left_hand_side, right_hand_side, .. } => {
            let lhs = *left_hand_side;
            let rhs = *right_hand_side;
            let target = cx.get_referenced_declaration_id(lhs)?;
            let site = |kind, delta| Some(WriteSite { target, target_node: lhs, kind, delta });
            match operator.as_str() {
                "+=" | "-=" if references(cx, rhs, target) => site(WriteKind::Overwrite, Vec::new()),
                "+=" => site(WriteKind::Increment, vec![rhs]),
                "-=" => site(WriteKind::Decrement, vec![rhs]),
                "=" => {
                    let (kind, delta) = classify_self_update(cx, lhs, rhs, target);
                    site(kind, delta)
                }
                _ => site(WriteKind::Overwrite, Vec::new()),
            }
        }
        NodeKind::UnaryOperation { operator, sub_expression, .. } => {
            let kind = match operator.as_str() {
                "++" => WriteKind::Increment,
                "--" => WriteKind::Decrement,
                "delete" => WriteKind::Overwrite,
                _ => return None,
            };
            let target = cx.get_referenced_declaration_id(*sub_expression)?;
            Some(WriteSite { target, target_node: *sub_expression, kind, delta: Vec::new() })
        }
        _ => None,
    }
}

fn classify_self_update(
    cx: &Context,
    lhs: NodeId,
    rhs: NodeId,
    target: DeclId,
) -> (WriteKind, Vec<NodeId>) {
    let mut terms = Vec::new();
    flatten_sum(cx, rhs, true, &mut terms);

    let (own, others): (Vec<_>, Vec<_>) =
        terms.into_iter().partition(|(term, _)| same_target(cx, *term, lhs));
    let overwrite = (WriteKind::Overwrite, Vec::new());

    if own.len() != 1 || !own[0].1 || others.is_empty() {
        return overwrite;
    }
    if others.iter().any(|(term, _)| references(cx, *term, target)) {
        return overwrite;
    }
    let delta = others.iter().map(|(term, _)| *term).collect();
    if others.iter().all(|(_, positive)| *positive) {
        (WriteKind::Increment, delta)
    } else if others.iter().all(|(_, positive)| !*positive) {
        (WriteKind::Decrement, delta)
    } else {
        overwrite
    }
}

/// Splits a chain of `+`/`-` into its terms with their signs.
fn flatten_sum(cx: &Context, node: NodeId, positive: bool, out: &mut Vec<(NodeId, bool)>) {
    match cx.ast().kind(node) {
        NodeKind::BinaryOperation { operator, left_expression, right_expression } if operator == "+" => {
            flatten_sum(cx, *left_expression, positive, out);
            flatten_sum(cx, *right_expression, positive, out);
        }
        NodeKind::BinaryOperation { operator, left_expression, right_expression } if operator == "-" => {
            flatten_sum(cx, *left_expression, positive, out);
            flatten_sum(cx, *right_expression, !positive, out);
        }
        _ => out.push((node, positive)),
    }
}

/// Whether two expressions denote the same storage location.
fn same_target(cx: &Context, a: NodeId, b: NodeId) -> bool {
    let ast = cx.ast();
    match (ast.kind(a), ast.kind(b)) {
        (
            NodeKind::Identifier { referenced_declaration: Some(x), .. },
            NodeKind::Identifier { referenced_declaration: Some(y), .. },
        ) => x == y,
        (NodeKind::IndexAccess { base_expression: x, .. }, NodeKind::IndexAccess { base_expression: y, .. }) => {
            same_target(cx, *x, *y)
                && cx.mapping_key_name(a).is_some()
                && cx.mapping_key_name(a) == cx.mapping_key_name(b)
        }
        (
            NodeKind::MemberAccess { member_name: m, expression: x, .. },
            NodeKind::MemberAccess { member_name: n, expression: y, .. },
        ) => m == n && same_target(cx, *x, *y),
        _ => false,
    }
}

fn references(cx: &Context, node: NodeId, target: DeclId) -> bool {
    let mut found = false;
    let mut state = WalkState::default();
    traverse_nodes_fast(
        cx.ast(),
        node,
        &mut |ast, id, state| {
            if ast.kind(id).referenced_declaration() == Some(target) {
                found = true;
                state.stop_traversal = true;
            }
        },
        &mut state,
    );
    found
}

/// Marks incrementations and decrementations of state variables.
pub struct Incrementations;

impl Incrementations {
    fn mark(cx: &mut Context, path: PathId) -> Result<()> {
        let Some(site) = classify_write(cx, cx.path(path).node) else {
            return Ok(());
        };
        if !cx.binding_by_id(site.target).is_some_and(|b| b.is_state_variable()) {
            return Ok(());
        }
        let Some(function_scope) = cx.get_function_scope(cx.path(path).scope) else {
            return Ok(());
        };
        if cx.indicator(function_scope, site.target).and_then(|i| i.write_kind(path)).is_some() {
            return Ok(());
        }

        // Classify every write in the function that shares a declaration with
        // this one, so the indicator sees the whole function at once.
        let modified = cx.get_all_nodes_which_modify_the_same(path, NodeType::FunctionDefinition)?;
        for reference in modified.into_values().flatten() {
            let write = cx.find_ancestor(reference, |cx, p| {
                matches!(cx.path(p).node_type, NodeType::Assignment | NodeType::UnaryOperation)
            });
            if let Some(write) = write {
                Self::record(cx, write, function_scope);
            }
        }
        Self::record(cx, path, function_scope);
        Ok(())
    }

    fn record(cx: &mut Context, path: PathId, function_scope: crate::scope::ScopeId) {
        let node = cx.path(path).node;
        let Some(site) = classify_write(cx, node) else {
            return;
        };
        let encrypt = matches!(cx.ast().kind(node), NodeKind::Assignment { encrypt: true, .. });
        let key = cx.mapping_key_name(site.target_node);
        let Some(indicator) = cx.indicator_mut(function_scope, site.target) else {
            return;
        };
        if indicator.write_kind(path).is_some() {
            return;
        }
        indicator.record_write(path, site.kind);
        indicator.encryption_required |= encrypt;
        if let Some(entry) = key.as_deref().and_then(|key| indicator.mapping_key_mut(key)) {
            entry.record_write(path, site.kind);
        }
        tracing::trace!(name = %indicator.name, kind = ?site.kind, "classified write");

        for id in [node, site.target_node] {
            let annotations = cx.ast_mut().annotations_mut(id);
            annotations.is_incremented = site.kind == WriteKind::Increment;
            annotations.is_decremented = site.kind == WriteKind::Decrement;
        }
    }
}

impl Visitor for Incrementations {
    fn enter_assignment(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        Self::mark(cx, path)
    }

    fn enter_unary_operation(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        Self::mark(cx, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use zkweave_runtime::CompilerConfig;

    fn classify(build: impl FnOnce(&mut AstBuilder) -> NodeId) -> Option<WriteSite> {
        let mut b = AstBuilder::new();
        let write = build(&mut b);
        let cx = Context::new(b.finish(write).unwrap(), CompilerConfig::default());
        classify_write(&cx, write)
    }

    #[test]
    fn test_plus_equals_is_increment() {
        let site = classify(|b| {
            let x = b.identifier("x", Some(1));
            let e = b.identifier("e", Some(2));
            b.assignment(x, "+=", e)
        })
        .unwrap();
        assert_eq!(site.kind, WriteKind::Increment);
        assert_eq!(site.target, 1);
        assert_eq!(site.delta.len(), 1);
    }

    #[test]
    fn test_chained_addition_with_self_on_the_right() {
        let site = classify(|b| {
            let x = b.identifier("x", Some(1));
            let a = b.identifier("a", Some(2));
            let x_again = b.identifier("x", Some(1));
            let c = b.literal("3");
            let first = b.binary(a, "+", x_again);
            let rhs = b.binary(first, "+", c);
            b.assignment(x, "=", rhs)
        })
        .unwrap();
        assert_eq!(site.kind, WriteKind::Increment);
        assert_eq!(site.delta.len(), 2);
    }

    #[test]
    fn test_self_minus_is_decrement() {
        let site = classify(|b| {
            let x = b.identifier("x", Some(1));
            let x_again = b.identifier("x", Some(1));
            let e = b.identifier("e", Some(2));
            let rhs = b.binary(x_again, "-", e);
            b.assignment(x, "=", rhs)
        })
        .unwrap();
        assert_eq!(site.kind, WriteKind::Decrement);
    }

    #[test]
    fn test_mixed_signs_and_repeats_are_overwrites() {
        let mixed = classify(|b| {
            let x = b.identifier("x", Some(1));
            let x_again = b.identifier("x", Some(1));
            let a = b.identifier("a", Some(2));
            let c = b.identifier("c", Some(3));
            let first = b.binary(x_again, "+", a);
            let rhs = b.binary(first, "-", c);
            b.assignment(x, "=", rhs)
        })
        .unwrap();
        assert_eq!(mixed.kind, WriteKind::Overwrite);

        let doubled = classify(|b| {
            let x = b.identifier("x", Some(1));
            let x_again = b.identifier("x", Some(1));
            b.assignment(x, "+=", x_again)
        })
        .unwrap();
        assert_eq!(doubled.kind, WriteKind::Overwrite);

        let negated = classify(|b| {
            let x = b.identifier("x", Some(1));
            let e = b.identifier("e", Some(2));
            let x_again = b.identifier("x", Some(1));
            let rhs = b.binary(e, "-", x_again);
            b.assignment(x, "=", rhs)
        })
        .unwrap();
        assert_eq!(negated.kind, WriteKind::Overwrite);
    }

    #[test]
    fn test_unrelated_assignment_is_overwrite() {
        let site = classify(|b| {
            let x = b.identifier("x", Some(1));
            let y = b.identifier("y", Some(2));
            b.assignment(x, "=", y)
        })
        .unwrap();
        assert_eq!(site.kind, WriteKind::Overwrite);
    }

    #[test]
    fn test_negation_is_not_a_write() {
        let site = classify(|b| {
            let x = b.identifier("x", Some(1));
            b.add(NodeKind::UnaryOperation { operator: "-".to_string(), prefix: true, sub_expression: x })
        });
        assert!(site.is_none());
    }
}
