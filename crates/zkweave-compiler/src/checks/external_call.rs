use super::secret_reference_below;
use crate::ast::NodeKind;
use crate::error::{CompilerError, Result};
use crate::traverse::{Context, PathId, Visitor, WalkState};

/// Rejects secret values passed as arguments to calls on external contracts.
pub struct ExternalCalls;

impl Visitor for ExternalCalls {
    fn enter_function_call(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        let Some(target) = cx.external_call_target(path) else {
            return Ok(());
        };
        let NodeKind::FunctionCall { arguments, .. } = &cx.node(path).kind else {
            return Ok(());
        };

        for (index, argument) in arguments.iter().enumerate() {
            if let Some(name) = secret_reference_below(cx, *argument) {
                return Err(CompilerError::secrecy_leak(
                    format!("{}.arguments[{}]", cx.get_location(path), index),
                    format!("Cannot pass a secret state ({}) to an external function call", name),
                ));
            }
        }

        if cx.config().is_known_token_interface(&target) {
            tracing::info!(
                location = %cx.get_location(path),
                "external call on a {} contract; its state stays public",
                target
            );
        }
        Ok(())
    }
}
