use crate::ast::DeclId;
use crate::error::{CompilerError, Result};
use crate::scope::{ScopeId, WriteKind};
use crate::traverse::{Context, PathId, Visitor, WalkState};
use zkweave_runtime::{BoilerplateKind, StateClassification};

/// Settles each secret state variable of a contract as whole or partitioned
/// once every function using it has been seen.
///
/// A variable is whole if any function overwrites it, reads it, or marks it
/// `known`; otherwise it is partitioned if any function increments or
/// decrements it, and whole if it is never written.
pub struct WholeOrPartitioned;

impl Visitor for WholeOrPartitioned {
    fn exit_contract_definition(
        &mut self,
        cx: &mut Context,
        path: PathId,
        _: &mut WalkState,
    ) -> Result<()> {
        let scope = cx.path(path).scope;
        let mut secret: Vec<(PathId, DeclId)> = cx
            .scope(scope)
            .bindings
            .values()
            .filter(|binding| binding.is_secret_state())
            .map(|binding| (binding.path, binding.id))
            .collect();
        secret.sort();
        for (_, id) in secret {
            resolve(cx, id)?;
        }
        Ok(())
    }
}

fn function_name(cx: &Context, scope: ScopeId) -> String {
    cx.scope(scope).name.clone().unwrap_or_default()
}

fn resolve(cx: &mut Context, id: DeclId) -> Result<()> {
    let Some(binding) = cx.binding_by_id(id) else {
        return Ok(());
    };
    let name = binding.name.clone();

    let mut whole_reasons = Vec::new();
    for indicator in binding.indicators.values().filter(|i| i.requires_whole()) {
        whole_reasons.push(format!(
            "{} in {}",
            indicator.whole_requirements().join(" and "),
            function_name(cx, indicator.function_scope)
        ));
    }
    if binding.is_known {
        whole_reasons.push("declared known".to_string());
    }
    let partial_writes = binding.indicators.values().any(|i| i.is_incremented || i.is_decremented);
    let unknown = binding.is_unknown || binding.indicators.values().any(|i| i.is_unknown);

    let classification = if !whole_reasons.is_empty() {
        if unknown {
            return Err(CompilerError::contradiction(
                &name,
                format!(
                    "it is decorated unknown, but needs whole semantics ({})",
                    whole_reasons.join("; ")
                ),
            ));
        }
        StateClassification::Whole
    } else if partial_writes {
        StateClassification::Partitioned
    } else {
        StateClassification::Whole
    };
    if classification == StateClassification::Partitioned && binding.is_reinitialisable {
        return Err(CompilerError::contradiction(
            &name,
            "only whole states can be reinitialisable, but every write is an incrementation",
        ));
    }

    let whole = classification == StateClassification::Whole;
    let mut annotate = Vec::new();
    let Some(binding) = cx.binding_by_id_mut(id) else {
        return Ok(());
    };
    binding.set_classification(classification)?;
    for indicator in binding.indicators.values_mut() {
        indicator.is_whole = whole;
        indicator.is_partitioned = !whole;
        for entry in indicator.mapping_keys.iter_mut() {
            entry.resolve_nullified(whole);
        }
        indicator.is_nullified = if indicator.mapping_keys.is_empty() {
            if whole { indicator.is_modified } else { indicator.is_decremented }
        } else {
            indicator.mapping_keys.iter().any(|entry| entry.is_nullified)
        };
        indicator.whole_reasons = indicator.whole_requirements();

        // A mapping entry is spent only when its own key is.
        let nullified_at = |path: PathId| match indicator.mapping_key_at(path) {
            Some(entry) => entry.is_nullified,
            None => indicator.is_nullified,
        };
        for path in &indicator.referencing_paths {
            annotate.push((*path, None, indicator.modifying_paths.contains(path) && nullified_at(*path)));
        }
        for (path, kind) in &indicator.writes {
            let bp_type = match (whole, kind) {
                (false, WriteKind::Increment) => Some(BoilerplateKind::Incrementation),
                (false, WriteKind::Decrement) => Some(BoilerplateKind::Decrementation),
                _ => None,
            };
            annotate.push((*path, bp_type, nullified_at(*path)));
        }
    }
    binding.is_incremented = binding.indicators.values().any(|i| i.is_incremented);
    binding.is_decremented = binding.indicators.values().any(|i| i.is_decremented);
    binding.is_nullified = binding.indicators.values().any(|i| i.is_nullified);

    for (path, bp_type, nullified) in annotate {
        let node = cx.path(path).node;
        let annotations = cx.ast_mut().annotations_mut(node);
        annotations.is_whole = whole;
        annotations.is_partitioned = !whole;
        annotations.is_nullified |= nullified;
        if bp_type.is_some() {
            annotations.bp_type = bp_type;
        }
    }
    tracing::debug!(%name, %classification, "classified secret state");
    Ok(())
}
