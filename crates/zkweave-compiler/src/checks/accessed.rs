use crate::ast::NodeType;
use crate::error::Result;
use crate::scope::WriteKind;
use crate::traverse::{Context, PathId, Visitor, WalkState};

/// Marks reads of secret state. The prior value of an incremented variable
/// is never needed, so the variable's own occurrence on the right of an
/// incrementation is not a read.
pub struct AccessedValues;

impl AccessedValues {
    fn is_own_incrementation_term(cx: &Context, path: PathId, function_scope: crate::scope::ScopeId) -> bool {
        let Some(rhs) = cx.get_ancestor_contained_within(path, "rightHandSide") else {
            return false;
        };
        let Some(assignment) = cx.path(rhs).parent_path else {
            return false;
        };
        if cx.path(assignment).node_type != NodeType::Assignment {
            return false;
        }
        let Some(id) = cx.get_referenced_declaration_id(cx.path(path).node) else {
            return false;
        };
        let kind = cx.indicator(function_scope, id).and_then(|i| i.write_kind(assignment));
        let targets_self = super::incremented::classify_write(cx, cx.path(assignment).node)
            .is_some_and(|site| site.target == id);
        targets_self && matches!(kind, Some(WriteKind::Increment | WriteKind::Decrement))
    }
}

impl Visitor for AccessedValues {
    fn enter_identifier(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        let Some(binding) = cx.get_referenced_binding(path) else {
            return Ok(());
        };
        if !binding.is_secret_state() {
            return Ok(());
        }
        let id = binding.id;
        let Some(function_scope) = cx.get_function_scope(cx.path(path).scope) else {
            return Ok(());
        };
        if cx.is_modification(path) || Self::is_own_incrementation_term(cx, path, function_scope) {
            return Ok(());
        }

        let key = match cx.path(path).key {
            "baseExpression" => cx.path(path).parent.and_then(|access| cx.mapping_key_name(access)),
            _ => None,
        };
        if let Some(indicator) = cx.indicator_mut(function_scope, id) {
            indicator.is_accessed = true;
            if let Some(entry) = key.as_deref().and_then(|key| indicator.mapping_key_mut(key)) {
                entry.is_accessed = true;
            }
        }
        if let Some(binding) = cx.binding_by_id_mut(id) {
            binding.is_accessed = true;
        }
        let node = cx.path(path).node;
        cx.ast_mut().annotations_mut(node).is_accessed = true;
        tracing::trace!(location = %cx.get_location(path), "secret state accessed");
        Ok(())
    }
}
