//! Tests for the check pipeline

use zkweave_compiler::{
    analyse, compile, run_checks, Ast, AstBuilder, BoilerplateKind, CircuitProgram, CircuitStatement,
    CompilerConfig, CompilerError, Context, DeclId, NodeId, NodeKind, StateClassification,
};

const A: DeclId = 1;

fn finish(mut b: AstBuilder, members: Vec<NodeId>) -> Ast {
    let contract = b.contract(100, "Shield", members);
    let root = b.source_unit(vec![contract]);
    b.finish(root).unwrap()
}

/// `function <name>(uint256 <param>) { a <op> <param>; }`
fn writer(b: &mut AstBuilder, id: DeclId, name: &str, param: &str, op: &str) -> NodeId {
    let declaration = b.variable(id + 1, param, false);
    let target = b.identifier("a", Some(A));
    let value = b.identifier(param, Some(id + 1));
    let write = b.assignment(target, op, value);
    let statement = b.statement(write);
    b.function(id, name, vec![declaration], vec![statement])
}

/// `function <name>(uint256 <param>) { a = a * <param>; }`
fn scaler(b: &mut AstBuilder, id: DeclId, name: &str, param: &str) -> NodeId {
    let declaration = b.variable(id + 1, param, false);
    let target = b.identifier("a", Some(A));
    let current = b.identifier("a", Some(A));
    let value = b.identifier(param, Some(id + 1));
    let product = b.binary(current, "*", value);
    let write = b.assignment(target, "=", product);
    let statement = b.statement(write);
    b.function(id, name, vec![declaration], vec![statement])
}

fn function_scope(cx: &Context, name: &str) -> zkweave_compiler::ScopeId {
    cx.function_scopes().find(|scope| scope.name.as_deref() == Some(name)).unwrap().id
}

fn classification(cx: &Context) -> Option<StateClassification> {
    cx.binding_by_id(A).and_then(|binding| binding.classification())
}

// ============================================================================
// INCREMENTATION TESTS
// ============================================================================

#[test]
fn test_increment_forms_are_detected() {
    for (op, incremented, decremented) in [("+=", true, false), ("-=", false, true)] {
        let mut b = AstBuilder::new();
        let a = b.secret_state(A, "a");
        let f = writer(&mut b, 10, "f", "x", op);
        let cx = analyse(finish(b, vec![a, f]), CompilerConfig::default()).unwrap();

        let indicator = cx.indicator(function_scope(&cx, "f"), A).unwrap();
        assert_eq!(indicator.is_incremented, incremented, "{}", op);
        assert_eq!(indicator.is_decremented, decremented, "{}", op);
        assert!(!indicator.is_accessed, "{} does not read the old value", op);
    }
}

#[test]
fn test_self_reference_on_the_right_is_an_incrementation() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let x = b.variable(11, "x", false);
    let target = b.identifier("a", Some(A));
    let value = b.identifier("x", Some(11));
    let current = b.identifier("a", Some(A));
    let sum = b.binary(value, "+", current);
    let write = b.assignment(target, "=", sum);
    let statement = b.statement(write);
    let f = b.function(10, "f", vec![x], vec![statement]);

    let cx = analyse(finish(b, vec![a, f]), CompilerConfig::default()).unwrap();
    let indicator = cx.indicator(function_scope(&cx, "f"), A).unwrap();
    assert!(indicator.is_incremented);
    assert!(!indicator.is_accessed);
    assert_eq!(classification(&cx), Some(StateClassification::Partitioned));
    assert_eq!(cx.ast().annotations(write).bp_type, Some(BoilerplateKind::Incrementation));
}

#[test]
fn test_scaling_is_a_read_and_an_overwrite() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let f = scaler(&mut b, 10, "f", "x");
    let cx = analyse(finish(b, vec![a, f]), CompilerConfig::default()).unwrap();

    let indicator = cx.indicator(function_scope(&cx, "f"), A).unwrap();
    assert!(!indicator.is_incremented);
    assert!(indicator.is_accessed);
    assert!(indicator.is_whole);
    assert!(indicator.is_nullified);
}

// ============================================================================
// WHOLE / PARTITIONED TESTS
// ============================================================================

#[test]
fn test_overwrite_in_one_function_makes_every_function_whole() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let f = scaler(&mut b, 10, "f", "x");
    let g = writer(&mut b, 20, "g", "y", "+=");
    let cx = analyse(finish(b, vec![a, f, g]), CompilerConfig::default()).unwrap();

    assert_eq!(classification(&cx), Some(StateClassification::Whole));
    for name in ["f", "g"] {
        let indicator = cx.indicator(function_scope(&cx, name), A).unwrap();
        assert!(indicator.is_whole, "{} sees a whole state", name);
        assert!(!indicator.is_partitioned, "{} sees a whole state", name);
    }
}

#[test]
fn test_only_additive_writes_make_a_partitioned_state() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let g = writer(&mut b, 20, "g", "y", "+=");
    let h = writer(&mut b, 30, "h", "z", "-=");
    let cx = analyse(finish(b, vec![a, g, h]), CompilerConfig::default()).unwrap();

    assert_eq!(classification(&cx), Some(StateClassification::Partitioned));
    let g = cx.indicator(function_scope(&cx, "g"), A).unwrap();
    let h = cx.indicator(function_scope(&cx, "h"), A).unwrap();
    assert!(g.is_partitioned && h.is_partitioned);
    assert!(!g.is_nullified, "adding never spends an old commitment");
    assert!(h.is_nullified, "subtracting spends old commitments");
}

#[test]
fn test_known_declaration_forces_whole() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    if let NodeKind::VariableDeclaration { is_known, .. } = b.kind_mut(a) {
        *is_known = true;
    }
    let g = writer(&mut b, 20, "g", "y", "+=");
    let cx = analyse(finish(b, vec![a, g]), CompilerConfig::default()).unwrap();

    assert_eq!(classification(&cx), Some(StateClassification::Whole));
}

#[test]
fn test_unknown_state_needing_whole_is_a_contradiction() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    if let NodeKind::VariableDeclaration { is_unknown, .. } = b.kind_mut(a) {
        *is_unknown = true;
    }
    let f = scaler(&mut b, 10, "f", "x");
    let error = analyse(finish(b, vec![a, f]), CompilerConfig::default()).unwrap_err();

    match error {
        CompilerError::ClassificationContradiction { name, reason } => {
            assert_eq!(name, "a");
            assert!(reason.contains("unknown"), "{}", reason);
        }
        other => panic!("expected a classification contradiction, got {}", other),
    }
}

#[test]
fn test_reinitialisable_partitioned_state_is_a_contradiction() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    if let NodeKind::VariableDeclaration { is_reinitialisable, .. } = b.kind_mut(a) {
        *is_reinitialisable = true;
    }
    let g = writer(&mut b, 20, "g", "y", "+=");
    let result = analyse(finish(b, vec![a, g]), CompilerConfig::default());

    assert!(matches!(result, Err(CompilerError::ClassificationContradiction { .. })));
}

#[test]
fn test_partitioned_writes_become_boilerplate_statements() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let g = writer(&mut b, 20, "g", "y", "+=");
    let output = compile(finish(b, vec![a, g]), CompilerConfig::default()).unwrap();

    let circuit = &output.program.file("g").unwrap().function;
    match &circuit.body.statements[0] {
        CircuitStatement::BoilerplateStatement(statement) => {
            assert_eq!(statement.name, "a");
            assert_eq!(statement.bp_type, BoilerplateKind::Incrementation);
            assert_eq!(statement.new_commitment_value.as_deref(), Some("y"));
        }
        other => panic!("expected a boilerplate statement, got {:?}", other),
    }
    let kinds: Vec<_> = circuit.parameters.iter().map(|p| p.bp_type()).collect();
    assert_eq!(kinds, vec![None, Some(BoilerplateKind::NewCommitment)]);
}

// ============================================================================
// MAPPING TESTS
// ============================================================================

const BALANCES: DeclId = 5;

fn msg_sender(b: &mut AstBuilder) -> NodeId {
    let msg = b.identifier("msg", Some(-15));
    b.add(NodeKind::MemberAccess {
        member_name: "sender".to_string(),
        expression: msg,
        type_string: "address".to_string(),
    })
}

fn balance_of(b: &mut AstBuilder, key: NodeId) -> NodeId {
    let balances = b.identifier("balances", Some(BALANCES));
    b.add(NodeKind::IndexAccess { base_expression: balances, index_expression: key })
}

/// contract Shield {
///     secret mapping(address => uint256) balances;
///     function transfer(address to, uint256 amount) {
///         require(balances[msg.sender] > amount);   // with `checked`
///         balances[msg.sender] -= amount;
///         balances[to] += amount;
///     }
/// }
fn transfer(checked: bool) -> Ast {
    let mut b = AstBuilder::new();
    let balances = b.secret_state(BALANCES, "balances");
    if let NodeKind::VariableDeclaration { type_string, .. } = b.kind_mut(balances) {
        *type_string = "mapping(address => uint256)".to_string();
    }
    let to = b.variable(31, "to", false);
    let amount = b.variable(32, "amount", false);

    let mut statements = Vec::new();
    if checked {
        let sender = msg_sender(&mut b);
        let own = balance_of(&mut b, sender);
        let limit = b.identifier("amount", Some(32));
        let comparison = b.binary(own, ">", limit);
        let require = b.identifier("require", Some(-18));
        let call = b.add(NodeKind::FunctionCall { expression: require, arguments: vec![comparison] });
        statements.push(b.statement(call));
    }
    let sender = msg_sender(&mut b);
    let own = balance_of(&mut b, sender);
    let value = b.identifier("amount", Some(32));
    let debit = b.assignment(own, "-=", value);
    statements.push(b.statement(debit));

    let recipient = b.identifier("to", Some(31));
    let theirs = balance_of(&mut b, recipient);
    let value = b.identifier("amount", Some(32));
    let credit = b.assignment(theirs, "+=", value);
    statements.push(b.statement(credit));

    let f = b.function(30, "transfer", vec![to, amount], statements);
    finish(b, vec![balances, f])
}

fn entry_params(circuit: &zkweave_compiler::CircuitFunction, name: &str) -> Vec<BoilerplateKind> {
    circuit
        .parameters
        .iter()
        .filter(|p| p.name() == name)
        .filter_map(|p| p.bp_type())
        .collect()
}

#[test]
fn test_transfer_only_spends_the_senders_entry() {
    let output = compile(transfer(false), CompilerConfig::default()).unwrap();
    let circuit = &output.program.file("transfer").unwrap().function;

    assert_eq!(
        entry_params(circuit, "balances_msgSender"),
        vec![
            BoilerplateKind::Mapping,
            BoilerplateKind::Nullification,
            BoilerplateKind::OldCommitmentPreimage,
            BoilerplateKind::OldCommitmentExistence,
            BoilerplateKind::NewCommitment,
        ]
    );
    assert_eq!(
        entry_params(circuit, "balances_to"),
        vec![BoilerplateKind::Mapping, BoilerplateKind::NewCommitment]
    );
    let recipient = circuit.parameters.iter().filter_map(|p| p.as_boilerplate()).find(|p| {
        p.name == "balances_to" && p.bp_type == BoilerplateKind::NewCommitment
    });
    let recipient = recipient.unwrap();
    assert!(!recipient.is_nullified, "recipient entry is only incremented");
    assert_eq!(recipient.new_commitment_value.as_deref(), Some("amount"));
}

#[test]
fn test_transfer_entries_are_indicated_per_key() {
    let cx = analyse(transfer(false), CompilerConfig::default()).unwrap();
    assert_eq!(
        cx.binding_by_id(BALANCES).and_then(|b| b.classification()),
        Some(StateClassification::Partitioned)
    );

    let indicator = cx.indicator(function_scope(&cx, "transfer"), BALANCES).unwrap();
    let sender = indicator.mapping_key("msg.sender").unwrap();
    assert!(sender.is_decremented && sender.is_nullified);
    let recipient = indicator.mapping_key("to").unwrap();
    assert!(recipient.is_incremented);
    assert!(!recipient.is_decremented && !recipient.is_nullified);
    assert!(indicator.is_nullified, "the mapping is spent through the sender's entry");
}

#[test]
fn test_reading_one_entry_does_not_access_the_others() {
    let output = compile(transfer(true), CompilerConfig::default()).unwrap();
    let circuit = &output.program.file("transfer").unwrap().function;

    let params: Vec<_> = circuit.parameters.iter().filter_map(|p| p.as_boilerplate()).collect();
    assert!(params.iter().filter(|p| p.name == "balances_msgSender").all(|p| p.is_accessed));
    assert!(params.iter().filter(|p| p.name == "balances_to").all(|p| !p.is_accessed));
    assert!(
        !entry_params(circuit, "balances_to").contains(&BoilerplateKind::ProofOfKeyOwnership),
        "an unread entry needs no proof of key ownership"
    );
}

// ============================================================================
// SECRECY TESTS
// ============================================================================

/// contract Shield { secret uint256 a; <interface> token; function f() { token.transfer(<arg>); } }
fn external_call(interface: &str, argument: impl FnOnce(&mut AstBuilder) -> NodeId) -> Ast {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let token = b.variable(2, "token", true);
    if let NodeKind::VariableDeclaration { type_string, .. } = b.kind_mut(token) {
        *type_string = format!("contract {}", interface);
    }
    let instance = b.identifier("token", Some(2));
    if let NodeKind::Identifier { type_string, .. } = b.kind_mut(instance) {
        *type_string = format!("contract {}", interface);
    }
    let transfer = b.add(NodeKind::MemberAccess {
        member_name: "transfer".to_string(),
        expression: instance,
        type_string: String::new(),
    });
    let argument = argument(&mut b);
    let call = b.add(NodeKind::FunctionCall { expression: transfer, arguments: vec![argument] });
    let statement = b.statement(call);
    let f = b.function(10, "f", Vec::new(), vec![statement]);
    finish(b, vec![a, token, f])
}

#[test]
fn test_secret_argument_to_external_call_is_rejected() {
    let ast = external_call("IToken", |b| b.identifier("a", Some(A)));
    let error = analyse(ast, CompilerConfig::default()).unwrap_err();

    match error {
        CompilerError::SecrecyLeak { location, reason } => {
            assert_eq!(location, "ast.nodes[0].nodes[2].body.statements[0].expression.arguments[0]");
            assert!(reason.contains("(a)"), "{}", reason);
        }
        other => panic!("expected a secrecy leak, got {}", other),
    }
}

#[test]
fn test_secret_inside_an_argument_expression_is_rejected() {
    let ast = external_call("IToken", |b| {
        let a = b.identifier("a", Some(A));
        let one = b.literal("1");
        b.binary(a, "+", one)
    });
    assert!(matches!(analyse(ast, CompilerConfig::default()), Err(CompilerError::SecrecyLeak { .. })));
}

#[test]
fn test_this_is_exempt() {
    let ast = external_call("IToken", |b| b.identifier("this", Some(-28)));
    assert!(analyse(ast, CompilerConfig::default()).is_ok());
}

#[test]
fn test_public_argument_to_token_interface_is_allowed() {
    let ast = external_call("IERC20", |b| b.literal("10"));
    assert!(analyse(ast, CompilerConfig::default()).is_ok());
}

// ============================================================================
// UNSUPPORTED CONSTRUCT TESTS
// ============================================================================

#[test]
fn test_while_loop_is_rejected() {
    let mut b = AstBuilder::new();
    let condition = b.literal("true");
    let body = b.block(Vec::new());
    let loop_ = b.add(NodeKind::WhileStatement { condition, body });
    let f = b.function(10, "f", Vec::new(), vec![loop_]);
    let error = analyse(finish(b, vec![f]), CompilerConfig::default()).unwrap_err();

    assert!(matches!(error, CompilerError::UnsupportedConstruct { .. }));
    assert!(error.to_string().contains("while"), "{}", error);
    assert!(error.to_string().contains("ast.nodes[0].nodes[0].body.statements[0]"), "{}", error);
}

#[test]
fn test_secret_local_variable_is_rejected() {
    let mut b = AstBuilder::new();
    let local = b.variable(11, "tmp", false);
    if let NodeKind::VariableDeclaration { is_secret, .. } = b.kind_mut(local) {
        *is_secret = true;
    }
    let declaration =
        b.add(NodeKind::VariableDeclarationStatement { declarations: vec![local], initial_value: None });
    let f = b.function(10, "f", Vec::new(), vec![declaration]);
    let error = analyse(finish(b, vec![f]), CompilerConfig::default()).unwrap_err();

    assert!(error.to_string().contains("tmp"), "{}", error);
    assert!(matches!(error, CompilerError::UnsupportedConstruct { .. }));
}

#[test]
fn test_conditional_over_secret_is_rejected() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let x = b.variable(11, "x", false);
    let condition = b.identifier("x", Some(11));
    let secret = b.identifier("a", Some(A));
    let zero = b.literal("0");
    let conditional =
        b.add(NodeKind::Conditional { condition, true_expression: secret, false_expression: zero });
    let statement = b.statement(conditional);
    let f = b.function(10, "f", vec![x], vec![statement]);

    let result = analyse(finish(b, vec![a, f]), CompilerConfig::default());
    assert!(matches!(result, Err(CompilerError::UnsupportedConstruct { .. })));
}

// ============================================================================
// DECORATOR TESTS
// ============================================================================

#[test]
fn test_known_on_public_reference_is_rejected() {
    let mut b = AstBuilder::new();
    let total = b.variable(2, "total", true);
    let x = b.variable(11, "x", false);
    let target = b.identifier("total", Some(2));
    if let NodeKind::Identifier { is_known, .. } = b.kind_mut(target) {
        *is_known = true;
    }
    let value = b.identifier("x", Some(11));
    let write = b.assignment(target, "=", value);
    let statement = b.statement(write);
    let f = b.function(10, "f", vec![x], vec![statement]);

    let result = analyse(finish(b, vec![total, f]), CompilerConfig::default());
    assert!(matches!(result, Err(CompilerError::DecoratorConflict { .. })));
}

#[test]
fn test_known_and_unknown_together_are_rejected() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    if let NodeKind::VariableDeclaration { is_known, is_unknown, .. } = b.kind_mut(a) {
        *is_known = true;
        *is_unknown = true;
    }
    let result = analyse(finish(b, vec![a]), CompilerConfig::default());
    assert!(matches!(result, Err(CompilerError::DecoratorConflict { .. })));
}

#[test]
fn test_unresolved_reference_is_reported() {
    let mut b = AstBuilder::new();
    let ghost = b.identifier("ghost", Some(999));
    let one = b.literal("1");
    let write = b.assignment(ghost, "=", one);
    let statement = b.statement(write);
    let f = b.function(10, "f", Vec::new(), vec![statement]);

    let error = analyse(finish(b, vec![f]), CompilerConfig::default()).unwrap_err();
    assert!(matches!(error, CompilerError::UnresolvedReference { id: 999, .. }));
}

// ============================================================================
// ORDERING TESTS
// ============================================================================

#[test]
fn test_circuit_requires_checked_tree() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let cx = Context::new(finish(b, vec![a]), CompilerConfig::default());

    assert!(matches!(CircuitProgram::build(&cx), Err(CompilerError::Ordering(_))));
}

#[test]
fn test_checks_run_once() {
    let mut b = AstBuilder::new();
    let a = b.secret_state(A, "a");
    let mut cx = analyse(finish(b, vec![a]), CompilerConfig::default()).unwrap();

    assert!(matches!(run_checks(&mut cx), Err(CompilerError::Ordering(_))));
}
