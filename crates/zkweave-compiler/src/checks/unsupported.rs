use super::touches_secret;
use crate::ast::NodeKind;
use crate::error::{CompilerError, Result};
use crate::traverse::{Context, PathId, Visitor, WalkState};

/// Rejects constructs the compiler does not model.
pub struct UnsupportedConstructs;

impl UnsupportedConstructs {
    fn reject(cx: &Context, path: PathId, construct: &str) -> Result<()> {
        Err(CompilerError::unsupported(cx.get_location(path), construct))
    }
}

impl Visitor for UnsupportedConstructs {
    fn enter_while_statement(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        Self::reject(cx, path, "while loops are not supported")
    }

    fn enter_do_while_statement(
        &mut self,
        cx: &mut Context,
        path: PathId,
        _: &mut WalkState,
    ) -> Result<()> {
        Self::reject(cx, path, "do-while loops are not supported")
    }

    fn enter_inline_assembly(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        Self::reject(cx, path, "inline assembly is not supported")
    }

    fn enter_for_statement(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        if touches_secret(cx, cx.path(path).node) {
            return Self::reject(cx, path, "for loops over secret state are not supported");
        }
        Ok(())
    }

    fn enter_conditional(&mut self, cx: &mut Context, path: PathId, _: &mut WalkState) -> Result<()> {
        if touches_secret(cx, cx.path(path).node) {
            return Self::reject(cx, path, "conditional expressions with secret operands are not supported");
        }
        Ok(())
    }

    fn enter_variable_declaration(
        &mut self,
        cx: &mut Context,
        path: PathId,
        _: &mut WalkState,
    ) -> Result<()> {
        let NodeKind::VariableDeclaration { name, is_secret: true, constant, .. } = &cx.node(path).kind
        else {
            return Ok(());
        };
        if *constant {
            return Self::reject(cx, path, &format!("constant '{}' cannot be secret", name));
        }
        if cx.path(path).key == "declarations" {
            return Self::reject(
                cx,
                path,
                &format!("local variable '{}' cannot be secret; only state and parameters can", name),
            );
        }
        Ok(())
    }
}
