//! Internal-call parameter reconciliation
//!
//! When one compiled function calls another, the callee's circuit needs
//! inputs (keys, nullifier roots, witnesses, salts) the caller never names.
//! For every call site the callee's parameter list is cloned, renamed into
//! the caller's vocabulary, expanded into concrete argument names, and merged
//! into the caller's own parameters in a canonical order. Callees that are
//! not imported as sub-circuits are spliced into the caller instead.

use crate::circuit::{
    BoilerplateStatement, CircuitExpression, CircuitFunction, CircuitParam, CircuitProgram,
    CircuitStatement, InternalFunctionCall, StateName,
};
use crate::error::{CompilerError, Result};
use std::collections::BTreeMap;
use zkweave_runtime::BoilerplateKind;

/// Renames `old` to `new` in a state name: an exact match becomes `new`, and
/// every `_old` segment (followed by the end of the name or another `_`)
/// becomes `_new`. Everything else is left untouched.
///
/// # Examples
///
/// ```
/// use zkweave_compiler::internal_call::rename_state_name;
///
/// assert_eq!(rename_state_name("account", "account", "sender"), "sender");
/// assert_eq!(rename_state_name("balances_account", "account", "sender"), "balances_sender");
/// assert_eq!(rename_state_name("balances_accounts", "account", "sender"), "balances_accounts");
/// ```
pub fn rename_state_name(name: &str, old: &str, new: &str) -> String {
    rename_state_names(name, &[(old.to_string(), new.to_string())])
}

/// [`rename_state_name`] for several `(old, new)` pairs applied at once.
///
/// Each part of `name` is matched against the original text only, so a
/// segment produced by one pair is never renamed again by another. When
/// pairs overlap, the first one listed wins.
///
/// ```
/// use zkweave_compiler::internal_call::rename_state_names;
///
/// let swap = [("y".to_string(), "z".to_string()), ("z".to_string(), "y".to_string())];
/// assert_eq!(rename_state_names("y", &swap), "z");
/// assert_eq!(rename_state_names("a_y_z", &swap), "a_z_y");
/// ```
pub fn rename_state_names(name: &str, pairs: &[(String, String)]) -> String {
    if let Some((_, new)) = pairs.iter().find(|(old, _)| old.as_str() == name) {
        return new.clone();
    }
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    'scan: while !rest.is_empty() {
        if let Some(segment) = rest.strip_prefix('_') {
            for (old, new) in pairs.iter().filter(|(old, _)| !old.is_empty()) {
                let Some(after) = segment.strip_prefix(old.as_str()) else {
                    continue;
                };
                if after.is_empty() || after.starts_with('_') {
                    out.push('_');
                    out.push_str(new);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Replaces whole identifier tokens in expression text, each token looked
/// up once against every `(old, new)` pair.
fn rename_tokens(text: &str, pairs: &[(String, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();
    let flush = |token: &mut String, out: &mut String| {
        match pairs.iter().find(|(old, _)| old.as_str() == token.as_str()) {
            Some((_, new)) => out.push_str(new),
            None => out.push_str(token),
        }
        token.clear();
    };
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

/// `(parameter, argument name)` for state-name renaming.
fn plain_names(pairs: &[(String, StateName)]) -> Vec<(String, String)> {
    pairs.iter().map(|(old, new)| (old.clone(), new.name.clone())).collect()
}

/// `(parameter, argument expression)` for renaming inside expression text.
fn qualified_names(pairs: &[(String, StateName)]) -> Vec<(String, String)> {
    pairs.iter().map(|(old, new)| (old.clone(), new.qualified())).collect()
}

/// The concrete argument names one parameter expands into.
///
/// `encrypted` says whether the variable's new commitment is encrypted to
/// its owner, in which case the owner's public key is not passed.
pub fn argument_names(param: &CircuitParam, encrypted: bool) -> Vec<String> {
    let param = match param {
        CircuitParam::VariableDeclaration { name, .. } => return vec![name.clone()],
        CircuitParam::Boilerplate(param) => param,
    };
    let name = &param.name;
    let accessed_only = param.is_accessed_only();
    let mut out = Vec::new();
    match param.bp_type {
        BoilerplateKind::ProofOfKeyOwnership => {
            out.push(format!("{}_oldCommitment_owner_secretKey", name));
        }
        BoilerplateKind::Nullification => {
            out.push(format!("{}_oldCommitment_owner_secretKey", name));
            out.push("nullifierRoot".to_string());
            if !accessed_only {
                out.push("newNullifierRoot".to_string());
                out.push(format!("{}_oldCommitment_nullifier", name));
            }
            out.push(format!("{}_nullifier_nonmembershipWitness_siblingPath", name));
            if !accessed_only {
                out.push(format!("{}_nullifier_nonmembershipWitness_newsiblingPath", name));
            }
        }
        BoilerplateKind::OldCommitmentPreimage => {
            out.push(format!("{}_oldCommitment_value", name));
            out.push(format!("{}_oldCommitment_salt", name));
        }
        BoilerplateKind::OldCommitmentExistence => {
            if param.is_whole && !accessed_only {
                out.push(format!("{}_oldCommitment_isDummy", name));
            }
            out.push("commitmentRoot".to_string());
            out.push(format!("{}_oldCommitment_membershipWitness_index", name));
            out.push(format!("{}_oldCommitment_membershipWitness_siblingPath", name));
        }
        BoilerplateKind::NewCommitment => {
            if !encrypted {
                out.push(format!("{}_newCommitment_owner_publicKey", name));
            }
            out.push(format!("{}_newCommitment_salt", name));
            out.push(format!("{}_newCommitment_commitment", name));
        }
        BoilerplateKind::Mapping => {
            if let Some(key) = &param.mapping_key_name {
                out.push(key.clone());
            }
        }
        BoilerplateKind::Encryption => {
            out.push(format!("{}_newCommitment_ephSecretKey", name));
            out.push(format!("{}_newCommitment_owner_publicKey_point", name));
        }
        BoilerplateKind::Incrementation | BoilerplateKind::Decrementation => {}
    }
    out
}

/// Identity of a parameter for deduplication: one entry per declared name,
/// and one per boilerplate kind per state.
fn param_key(param: &CircuitParam) -> (String, Option<BoilerplateKind>) {
    (param.name().to_string(), param.bp_type())
}

/// Brings a merged parameter list into canonical order.
///
/// 1. A nullification entry that is only accessed is superseded by a later
///    entry for the same state that is nullified (or not accessed); an
///    existence entry that is not whole and initialised is superseded by a
///    later one that is.
/// 2. Duplicates are dropped, keeping the first.
/// 3. A new-commitment entry sitting in a later run of a state whose first
///    run has none is moved right after the first run's existence (or
///    mapping) entry, so the old commitment is always spent before the new
///    one is produced.
pub fn reorder_parameters(params: &mut Vec<CircuitParam>) {
    let snapshot = params.clone();
    for (index, param) in snapshot.iter().enumerate() {
        let Some(param) = param.as_boilerplate() else {
            continue;
        };
        for later in snapshot[index + 1..].iter().filter_map(CircuitParam::as_boilerplate) {
            if later.name != param.name || later.bp_type != param.bp_type {
                continue;
            }
            let supersede = match param.bp_type {
                BoilerplateKind::Nullification => {
                    param.is_accessed_only() && (later.is_nullified || !later.is_accessed)
                }
                BoilerplateKind::OldCommitmentExistence => {
                    !(param.is_whole && param.initialisation_required)
                        && later.is_whole
                        && later.initialisation_required
                }
                _ => false,
            };
            if supersede {
                params[index] = CircuitParam::Boilerplate(later.clone());
            }
        }
    }

    let mut seen = Vec::new();
    params.retain(|param| {
        let key = param_key(param);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    for (from, anchor) in new_commitment_moves(params) {
        let Some(from) = params.iter().position(|p| *p == from) else {
            continue;
        };
        let moved = params.remove(from);
        let at = params.iter().position(|p| *p == anchor).map_or(0, |i| i + 1);
        params.insert(at, moved);
    }
}

#[derive(Debug, Default)]
struct Run {
    first: usize,
    mapping: Option<usize>,
    existence: Option<usize>,
    new_commitment: Option<usize>,
}

/// Pairs of (new-commitment entry to move, entry to place it after).
fn new_commitment_moves(params: &[CircuitParam]) -> Vec<(CircuitParam, CircuitParam)> {
    let mut runs: Vec<(String, Vec<Run>)> = Vec::new();
    let mut current: Option<String> = None;
    for (index, param) in params.iter().enumerate() {
        let Some(param) = param.as_boilerplate() else {
            continue;
        };
        if current.as_deref() != Some(param.name.as_str()) {
            current = Some(param.name.clone());
            let run = Run { first: index, ..Run::default() };
            match runs.iter_mut().find(|(name, _)| *name == param.name) {
                Some((_, state_runs)) => state_runs.push(run),
                None => runs.push((param.name.clone(), vec![run])),
            }
        }
        let Some((_, state_runs)) = runs.iter_mut().find(|(name, _)| *name == param.name) else {
            continue;
        };
        let Some(run) = state_runs.last_mut() else {
            continue;
        };
        match param.bp_type {
            BoilerplateKind::NewCommitment => run.new_commitment = Some(index),
            BoilerplateKind::Mapping => run.mapping = Some(index),
            BoilerplateKind::OldCommitmentExistence => run.existence = Some(index),
            _ => {}
        }
    }

    let mut moves = Vec::new();
    for (_, state_runs) in &runs {
        let [first, later @ ..] = state_runs.as_slice() else {
            continue;
        };
        if first.new_commitment.is_some() || later.is_empty() {
            continue;
        }
        let anchor = match (first.existence, first.mapping) {
            (Some(e), Some(m)) => e.max(m),
            (Some(e), None) => e,
            (None, Some(m)) => m,
            (None, None) => first.first,
        };
        if let Some(from) = later.iter().find_map(|run| run.new_commitment) {
            moves.push((params[from].clone(), params[anchor].clone()));
        }
    }
    moves
}

/// Set union keeping first-seen order.
fn union(into: &mut Vec<CircuitParam>, extra: &[CircuitParam]) {
    for param in extra {
        if !into.contains(param) {
            into.push(param.clone());
        }
    }
}

/// A callee's parameters and return parameters in the caller's vocabulary.
struct Renamed {
    parameters: Vec<CircuitParam>,
    return_parameters: Vec<CircuitParam>,
}

fn rename_params(params: &[CircuitParam], pairs: &[(String, StateName)]) -> Vec<CircuitParam> {
    let names = plain_names(pairs);
    let qualified = qualified_names(pairs);
    let mut out = Vec::new();
    for param in params {
        match param {
            CircuitParam::Boilerplate(bp) => {
                let mut bp = bp.clone();
                bp.name = rename_state_names(&bp.name, &names);
                let key = pairs.iter().find(|(old, _)| bp.mapping_key_name.as_deref() == Some(old.as_str()));
                if let Some((_, new)) = key {
                    bp.mapping_key_name = Some(new.name.clone());
                }
                bp.new_commitment_value =
                    bp.new_commitment_value.map(|value| rename_tokens(&value, &qualified));
                out.push(CircuitParam::Boilerplate(bp));
            }
            CircuitParam::VariableDeclaration { name, type_name, is_private } => {
                match pairs.iter().find(|(old, _)| old == name) {
                    // Struct members travel inside their struct.
                    Some((_, new)) if new.member_name.is_some() => {}
                    Some((_, new)) => out.push(CircuitParam::VariableDeclaration {
                        name: new.name.clone(),
                        type_name: type_name.clone(),
                        is_private: *is_private,
                    }),
                    None => out.push(param.clone()),
                }
            }
        }
    }
    out
}

fn rename_callee(callee: &CircuitFunction, pairs: &[(String, StateName)]) -> Renamed {
    Renamed {
        parameters: rename_params(&callee.parameters, pairs),
        return_parameters: rename_params(&callee.return_parameters, pairs),
    }
}

/// Expands every parameter into argument names, skipping names already taken.
fn expand_arguments(params: &[CircuitParam]) -> Vec<String> {
    let encrypted: Vec<&str> = params
        .iter()
        .filter(|p| p.bp_type() == Some(BoilerplateKind::Encryption))
        .map(CircuitParam::name)
        .collect();
    let mut arguments: Vec<String> = Vec::new();
    for param in params {
        for argument in argument_names(param, encrypted.contains(&param.name())) {
            if !arguments.contains(&argument) {
                arguments.push(argument);
            }
        }
    }
    arguments
}

// CALL SITES

fn for_each_call_in_expression(
    expression: &mut CircuitExpression,
    f: &mut dyn FnMut(&mut InternalFunctionCall),
) {
    match expression {
        CircuitExpression::InternalFunctionCall(call) => f(call),
        CircuitExpression::BinaryOperation { left_expression: a, right_expression: b, .. }
        | CircuitExpression::Assignment { left_hand_side: a, right_hand_side: b, .. }
        | CircuitExpression::IndexAccess { base_expression: a, index_expression: b } => {
            for_each_call_in_expression(a, f);
            for_each_call_in_expression(b, f);
        }
        CircuitExpression::UnaryOperation { sub_expression: a, .. }
        | CircuitExpression::MemberAccess { expression: a, .. } => for_each_call_in_expression(a, f),
        CircuitExpression::FunctionCall { arguments, .. } => {
            for argument in arguments {
                for_each_call_in_expression(argument, f);
            }
        }
        CircuitExpression::Identifier { .. }
        | CircuitExpression::Literal { .. }
        | CircuitExpression::MsgSender => {}
    }
}

fn for_each_call(statements: &mut [CircuitStatement], f: &mut dyn FnMut(&mut InternalFunctionCall)) {
    for statement in statements {
        match statement {
            CircuitStatement::ExpressionStatement { expression, .. } => {
                for_each_call_in_expression(expression, f)
            }
            CircuitStatement::IfStatement { condition, true_body, false_body } => {
                for_each_call_in_expression(condition, f);
                for_each_call(true_body, f);
                for_each_call(false_body, f);
            }
            CircuitStatement::BoilerplateStatement(_) => {}
        }
    }
}

/// Internal calls in `function`, in statement order.
fn calls_in(function: &CircuitFunction) -> Vec<InternalFunctionCall> {
    let mut statements = function.body.statements.clone();
    let mut calls = Vec::new();
    for_each_call(&mut statements, &mut |call| calls.push(call.clone()));
    calls
}

/// Applies `f` to the `ordinal`-th call of `callee` in `function`.
fn with_call(
    function: &mut CircuitFunction,
    callee: &str,
    ordinal: usize,
    f: &mut dyn FnMut(&mut InternalFunctionCall),
) {
    let mut seen = 0;
    for_each_call(&mut function.body.statements, &mut |call| {
        if call.name == callee {
            if seen == ordinal {
                f(call);
            }
            seen += 1;
        }
    });
}

fn count_calls(statement: &CircuitStatement, callee: &str) -> usize {
    let mut statement = statement.clone();
    let mut count = 0;
    for_each_call(std::slice::from_mut(&mut statement), &mut |call| {
        if call.name == callee {
            count += 1;
        }
    });
    count
}

fn count_calls_in_expression(expression: &CircuitExpression, callee: &str) -> usize {
    let mut expression = expression.clone();
    let mut count = 0;
    for_each_call_in_expression(&mut expression, &mut |call| {
        if call.name == callee {
            count += 1;
        }
    });
    count
}

fn replace_range(
    statements: &mut Vec<CircuitStatement>,
    range: std::ops::Range<usize>,
    replacement: &[CircuitStatement],
) {
    let tail = statements.split_off(range.end);
    statements.truncate(range.start);
    statements.extend(replacement.iter().cloned());
    statements.extend(tail);
}

/// Replaces the statement holding the `ordinal`-th call of `callee` with
/// `replacement`, when that statement is the call itself. Returns whether the
/// call was replaced (`Some(false)` when it sits inside a larger expression
/// and was left alone), or `None` when there are not that many calls.
fn splice_call(
    statements: &mut Vec<CircuitStatement>,
    callee: &str,
    ordinal: &mut usize,
    replacement: &[CircuitStatement],
) -> Option<bool> {
    for index in 0..statements.len() {
        let count = count_calls(&statements[index], callee);
        if *ordinal >= count {
            *ordinal -= count;
            continue;
        }
        let direct = matches!(
            &statements[index],
            CircuitStatement::ExpressionStatement {
                expression: CircuitExpression::InternalFunctionCall(call),
                ..
            } if call.name == callee
        );
        if direct {
            replace_range(statements, index..index + 1, replacement);
            return Some(true);
        }
        if let CircuitStatement::IfStatement { condition, true_body, false_body } = &mut statements[index] {
            let in_condition = count_calls_in_expression(condition, callee);
            if *ordinal >= in_condition {
                *ordinal -= in_condition;
                if let Some(replaced) = splice_call(true_body, callee, ordinal, replacement) {
                    return Some(replaced);
                }
                return splice_call(false_body, callee, ordinal, replacement);
            }
        }
        return Some(false);
    }
    None
}

/// Callers ordered so every callee is reconciled before its callers.
fn processing_order(program: &CircuitProgram) -> Result<Vec<String>> {
    let graph: BTreeMap<String, Vec<String>> = program
        .files
        .iter()
        .map(|file| {
            let callees = calls_in(&file.function)
                .into_iter()
                .map(|call| call.name)
                .filter(|name| program.file(name).is_some())
                .collect();
            (file.file_name.clone(), callees)
        })
        .collect();

    fn visit(
        name: &str,
        graph: &BTreeMap<String, Vec<String>>,
        visiting: &mut Vec<String>,
        done: &mut Vec<String>,
    ) -> Result<()> {
        if done.iter().any(|d| d == name) {
            return Ok(());
        }
        if visiting.iter().any(|v| v == name) {
            visiting.push(name.to_string());
            return Err(CompilerError::unsupported(
                name,
                format!("recursive internal calls ({})", visiting.join(" -> ")),
            ));
        }
        visiting.push(name.to_string());
        for callee in graph.get(name).into_iter().flatten() {
            visit(callee, graph, visiting, done)?;
        }
        visiting.pop();
        done.push(name.to_string());
        Ok(())
    }

    let mut done = Vec::new();
    for file in &program.files {
        visit(&file.file_name, &graph, &mut Vec::new(), &mut done)?;
    }
    Ok(done)
}

/// Reconciles every internal call in `program`.
pub fn reconcile_internal_calls(program: &mut CircuitProgram) -> Result<()> {
    for caller in processing_order(program)? {
        let Some(file) = program.file(&caller) else {
            continue;
        };
        let calls = calls_in(&file.function);
        let mut present: BTreeMap<String, usize> = BTreeMap::new();
        for call in calls {
            let Some(callee) = program.file(&call.name).map(|f| f.function.clone()) else {
                tracing::trace!(%caller, callee = %call.name, "callee has no circuit");
                continue;
            };
            let ordinal = present.entry(call.name.clone()).or_insert(0);
            let pairs: Vec<(String, StateName)> =
                call.old_state_name.iter().cloned().zip(call.new_state_name.iter().cloned()).collect();
            let renamed = rename_callee(&callee, &pairs);
            let Some(file) = program.file_mut(&caller) else {
                continue;
            };
            let function = &mut file.function;

            if call.circuit_import {
                import_call(function, &call.name, *ordinal, renamed);
                *ordinal += 1;
            } else if !inline_call(function, &caller, &callee, &call.name, *ordinal, &pairs, renamed)? {
                *ordinal += 1;
            }
            tracing::debug!(%caller, callee = %call.name, import = call.circuit_import, "reconciled internal call");
        }
    }
    Ok(())
}

fn import_call(function: &mut CircuitFunction, callee: &str, ordinal: usize, renamed: Renamed) {
    let arguments = expand_arguments(&renamed.parameters);

    union(&mut function.parameters, &renamed.parameters);
    reorder_parameters(&mut function.parameters);
    union(&mut function.return_parameters, &renamed.return_parameters);

    with_call(function, callee, ordinal, &mut |call| {
        for argument in &arguments {
            if !call.circuit_arguments.contains(argument) {
                call.circuit_arguments.push(argument.clone());
            }
        }
        call.circuit_return.extend(renamed.return_parameters.iter().cloned());
    });
}

/// Splices `callee`'s assignments into the caller in place of the call and
/// folds its partitioned deltas into the caller's. Returns whether the call
/// was replaced.
///
/// The call has to be a statement of its own: a callee that is not imported
/// has no circuit to call from inside an expression.
fn inline_call(
    function: &mut CircuitFunction,
    caller: &str,
    callee: &CircuitFunction,
    callee_name: &str,
    ordinal: usize,
    pairs: &[(String, StateName)],
    renamed: Renamed,
) -> Result<bool> {
    let mut spliced = Vec::new();
    for statement in &callee.body.statements {
        if let CircuitStatement::ExpressionStatement {
            expression: expression @ CircuitExpression::Assignment { .. },
            is_var_dec,
        } = statement
        {
            let mut expression = expression.clone();
            expression.rename(pairs);
            spliced.push(CircuitStatement::ExpressionStatement { expression, is_var_dec: *is_var_dec });
        }
    }
    let mut remaining = ordinal;
    let Some(replaced) = splice_call(&mut function.body.statements, callee_name, &mut remaining, &spliced)
    else {
        return Ok(false);
    };
    if !replaced {
        return Err(CompilerError::unsupported(
            caller,
            format!(
                "call to '{}' inside an expression; it writes the same partitioned state as '{}', \
                 so it must be a statement of its own",
                callee_name, caller
            ),
        ));
    }

    let names = plain_names(pairs);
    let qualified = qualified_names(pairs);
    let rename_statement = |statement: &BoilerplateStatement| {
        let mut statement = statement.clone();
        statement.name = rename_state_names(&statement.name, &names);
        statement.new_commitment_value =
            statement.new_commitment_value.map(|value| rename_tokens(&value, &qualified));
        statement
    };

    for statement in &callee.body.pre_statements {
        let CircuitStatement::BoilerplateStatement(pre) = statement else {
            continue;
        };
        if !pre.is_partitioned {
            continue;
        }
        let pre = rename_statement(pre);
        let Some(delta) = pre.new_commitment_value.clone() else {
            continue;
        };
        let caller_direction = function.body.pre_statements.iter().find_map(|s| match s {
            CircuitStatement::BoilerplateStatement(b) if b.name == pre.name && b.is_partitioned => {
                Some(b.bp_type)
            }
            _ => None,
        });
        let Some(caller_direction) = caller_direction else {
            // The caller does not write this state; take the callee's
            // statements as they are.
            function.body.pre_statements.push(CircuitStatement::BoilerplateStatement(pre.clone()));
            let post = callee.body.post_statements.iter().filter_map(|s| match s {
                CircuitStatement::BoilerplateStatement(b) => Some(rename_statement(b)),
                _ => None,
            });
            for post in post.filter(|b| b.name == pre.name) {
                function.body.post_statements.push(CircuitStatement::BoilerplateStatement(post));
            }
            continue;
        };
        let sign = if caller_direction == pre.bp_type { '+' } else { '-' };
        let fold = |statement: &mut CircuitStatement| {
            if let CircuitStatement::BoilerplateStatement(b) = statement {
                if b.name == pre.name && b.is_partitioned {
                    b.new_commitment_value = Some(match &b.new_commitment_value {
                        Some(value) => format!("{} {} ({})", value, sign, delta),
                        None => delta.clone(),
                    });
                }
            }
        };
        function.body.pre_statements.iter_mut().for_each(fold);
        function.body.post_statements.iter_mut().for_each(fold);
    }

    union(&mut function.parameters, &renamed.parameters);
    reorder_parameters(&mut function.parameters);
    union(&mut function.return_parameters, &renamed.return_parameters);
    Ok(true)
}
