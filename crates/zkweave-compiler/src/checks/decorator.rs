use crate::ast::NodeKind;
use crate::error::{CompilerError, Result};
use crate::traverse::{Context, PathId, Visitor, WalkState};

/// Rejects decorators that contradict each other or the declaration they
/// sit on.
pub struct Decorators;

impl Visitor for Decorators {
    fn enter_variable_declaration(
        &mut self,
        cx: &mut Context,
        path: PathId,
        _: &mut WalkState,
    ) -> Result<()> {
        let NodeKind::VariableDeclaration { name, is_secret, is_known, is_unknown, is_reinitialisable, .. } =
            &cx.node(path).kind
        else {
            return Ok(());
        };
        let conflict = |reason: String| Err(CompilerError::decorator_conflict(cx.get_location(path), reason));

        if *is_known && *is_unknown {
            return conflict(format!("'{}' is decorated both known and unknown", name));
        }
        if !is_secret {
            let decorator = if *is_known {
                Some("known")
            } else if *is_unknown {
                Some("unknown")
            } else if *is_reinitialisable {
                Some("reinitialisable")
            } else {
                None
            };
            if let Some(decorator) = decorator {
                return conflict(format!("'{}' is decorated {} but is not secret", name, decorator));
            }
        }
        Ok(())
    }

    fn enter_identifier(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        let NodeKind::Identifier { name, is_known, is_unknown, .. } = &cx.node(path).kind else {
            return Ok(());
        };
        let Some(binding) = cx.resolve_binding(path)? else {
            return Ok(());
        };
        let conflict = |reason: String| Err(CompilerError::decorator_conflict(cx.get_location(path), reason));

        if *is_known && *is_unknown {
            return conflict(format!("'{}' is decorated both known and unknown", name));
        }
        if (*is_known || *is_unknown) && !binding.is_secret {
            return conflict(format!("'{}' is not secret, so cannot be decorated known or unknown", name));
        }
        if *is_known && binding.is_unknown {
            return conflict(format!("'{}' is decorated known here but declared unknown", name));
        }
        if *is_unknown && binding.is_known {
            return conflict(format!("'{}' is decorated unknown here but declared known", name));
        }
        Ok(())
    }

    fn enter_assignment(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        let NodeKind::Assignment { left_hand_side, encrypt: true, .. } = &cx.node(path).kind else {
            return Ok(());
        };
        let target = cx
            .get_referenced_declaration_id(*left_hand_side)
            .and_then(|id| cx.binding_by_id(id));
        match target {
            Some(binding) if binding.is_secret_state() => Ok(()),
            Some(binding) => Err(CompilerError::decorator_conflict(
                cx.get_location(path),
                format!("cannot encrypt a write to '{}', which is not secret state", binding.name),
            )),
            None => Err(CompilerError::decorator_conflict(
                cx.get_location(path),
                "cannot encrypt a write that does not target secret state",
            )),
        }
    }
}
