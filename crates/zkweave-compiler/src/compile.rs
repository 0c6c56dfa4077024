//! End-to-end entry points

use crate::ast::Ast;
use crate::checks::run_checks;
use crate::circuit::CircuitProgram;
use crate::error::Result;
use crate::internal_call::reconcile_internal_calls;
use crate::scope::StateVarIndicator;
use crate::traverse::{Context, Stage};
use serde::Serialize;
use zkweave_runtime::CompilerConfig;

/// How one function uses state, as reported after the checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub name: String,
    pub interacts_with_secret: bool,
    pub interacts_with_public: bool,
    pub states: Vec<StateVarIndicator>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledOutput {
    pub ast: Ast,
    pub functions: Vec<FunctionSummary>,
    pub program: CircuitProgram,
}

/// Builds the Path and Scope tables for `ast` and runs every check.
pub fn analyse(ast: Ast, config: CompilerConfig) -> Result<Context> {
    let mut cx = Context::new(ast, config);
    run_checks(&mut cx)?;
    Ok(cx)
}

/// Per-function indicator summaries, in declaration order.
pub fn summarise(cx: &Context) -> Vec<FunctionSummary> {
    cx.function_scopes()
        .filter_map(|scope| {
            let function = cx.function_indicator(scope.id)?;
            let states = function
                .state_variables
                .iter()
                .filter_map(|id| cx.indicator(scope.id, *id).cloned())
                .collect();
            Some(FunctionSummary {
                name: function.name.clone(),
                interacts_with_secret: function.interacts_with_secret,
                interacts_with_public: function.interacts_with_public,
                states,
            })
        })
        .collect()
}

/// Runs the checks, builds the circuit program and reconciles internal calls.
pub fn compile(ast: Ast, config: CompilerConfig) -> Result<CompiledOutput> {
    let mut cx = analyse(ast, config)?;
    let mut program = CircuitProgram::build(&cx)?;
    reconcile_internal_calls(&mut program)?;
    cx.advance_stage(Stage::Checked, Stage::Reconciled)?;
    tracing::debug!(files = program.files.len(), "compiled");

    let functions = summarise(&cx);
    Ok(CompiledOutput { ast: cx.into_ast(), functions, program })
}
