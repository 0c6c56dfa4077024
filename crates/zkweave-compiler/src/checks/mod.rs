//! The check pipeline
//!
//! Six passes run in a fixed order over the same tree and scope model. Each
//! pass either rejects the tree or leaves annotations the next pass relies
//! on, so the order below cannot change:
//!
//! 1. [`unsupported`]: constructs the compiler does not model
//! 2. [`external_call`]: secret values passed to external contracts
//! 3. [`decorator`]: conflicting `secret`/`known`/`unknown`/`encrypt` decorators
//! 4. [`incremented`]: per-function write classification
//! 5. [`accessed`]: reads that need a membership proof
//! 6. [`whole`]: one whole/partitioned decision per secret state variable

pub mod accessed;
pub mod decorator;
pub mod external_call;
pub mod incremented;
pub mod unsupported;
pub mod whole;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Result;
use crate::traverse::{traverse, traverse_nodes_fast, Context, Stage, Visitor, WalkState};

/// Runs every check in order. The first failing pass aborts the pipeline.
pub fn run_checks(cx: &mut Context) -> Result<()> {
    cx.advance_stage(Stage::Parsed, Stage::Checked)?;
    let root = cx.root_path()?;

    run_pass(cx, root, &mut unsupported::UnsupportedConstructs)?;
    tracing::debug!("no unsupported constructs");

    run_pass(cx, root, &mut external_call::ExternalCalls)?;
    tracing::debug!("no secret arguments to external calls");

    run_pass(cx, root, &mut decorator::Decorators)?;
    tracing::debug!("decorators consistent");

    run_pass(cx, root, &mut incremented::Incrementations)?;
    tracing::debug!("incrementations marked");

    run_pass(cx, root, &mut accessed::AccessedValues)?;
    tracing::debug!("accessed values marked");

    run_pass(cx, root, &mut whole::WholeOrPartitioned)?;
    tracing::debug!("whole/partitioned states resolved");

    Ok(())
}

fn run_pass<V: Visitor>(
    cx: &mut Context,
    root: crate::traverse::PathId,
    visitor: &mut V,
) -> Result<()> {
    let mut state = WalkState::default();
    traverse(cx, root, visitor, &mut state)
}

/// Whether any identifier below `node` refers to a secret declaration.
pub(crate) fn touches_secret(cx: &Context, node: NodeId) -> bool {
    secret_reference_below(cx, node).is_some()
}

/// The name of the first identifier below `node` that refers to a secret
/// declaration. References to `this` are skipped.
pub(crate) fn secret_reference_below(cx: &Context, node: NodeId) -> Option<String> {
    let mut found = None;
    let mut state = WalkState::default();
    traverse_nodes_fast(
        cx.ast(),
        node,
        &mut |ast: &Ast, id, state| {
            if let NodeKind::Identifier { name, referenced_declaration: Some(decl), .. } = ast.kind(id) {
                if cx.is_this(id) {
                    return;
                }
                if cx.binding_by_id(*decl).is_some_and(|binding| binding.is_secret) {
                    found = Some(name.clone());
                    state.stop_traversal = true;
                }
            }
        },
        &mut state,
    );
    found
}
