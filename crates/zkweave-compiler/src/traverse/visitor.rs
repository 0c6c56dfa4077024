//! Visitor hooks, one enter/exit pair per node type
//!
//! Every hook defaults to doing nothing, so a check only implements the node
//! types it cares about.

use super::{Context, PathId, WalkState};
use crate::ast::NodeType;
use crate::error::Result;

macro_rules! visitor {
    ($($node_type:ident => $enter:ident, $exit:ident;)*) => {
        pub trait Visitor {
            $(
                fn $enter(
                    &mut self,
                    _cx: &mut Context,
                    _path: PathId,
                    _state: &mut WalkState,
                ) -> Result<()> {
                    Ok(())
                }

                fn $exit(
                    &mut self,
                    _cx: &mut Context,
                    _path: PathId,
                    _state: &mut WalkState,
                ) -> Result<()> {
                    Ok(())
                }
            )*
        }

        pub(crate) fn dispatch_enter<V: Visitor + ?Sized>(
            visitor: &mut V,
            node_type: NodeType,
            cx: &mut Context,
            path: PathId,
            state: &mut WalkState,
        ) -> Result<()> {
            match node_type {
                $(NodeType::$node_type => visitor.$enter(cx, path, state),)*
            }
        }

        pub(crate) fn dispatch_exit<V: Visitor + ?Sized>(
            visitor: &mut V,
            node_type: NodeType,
            cx: &mut Context,
            path: PathId,
            state: &mut WalkState,
        ) -> Result<()> {
            match node_type {
                $(NodeType::$node_type => visitor.$exit(cx, path, state),)*
            }
        }
    };
}

visitor! {
    SourceUnit => enter_source_unit, exit_source_unit;
    PragmaDirective => enter_pragma_directive, exit_pragma_directive;
    ContractDefinition => enter_contract_definition, exit_contract_definition;
    InheritanceSpecifier => enter_inheritance_specifier, exit_inheritance_specifier;
    FunctionDefinition => enter_function_definition, exit_function_definition;
    ParameterList => enter_parameter_list, exit_parameter_list;
    Block => enter_block, exit_block;
    VariableDeclaration => enter_variable_declaration, exit_variable_declaration;
    VariableDeclarationStatement => enter_variable_declaration_statement, exit_variable_declaration_statement;
    ExpressionStatement => enter_expression_statement, exit_expression_statement;
    IfStatement => enter_if_statement, exit_if_statement;
    ForStatement => enter_for_statement, exit_for_statement;
    WhileStatement => enter_while_statement, exit_while_statement;
    DoWhileStatement => enter_do_while_statement, exit_do_while_statement;
    InlineAssembly => enter_inline_assembly, exit_inline_assembly;
    Return => enter_return, exit_return;
    Assignment => enter_assignment, exit_assignment;
    BinaryOperation => enter_binary_operation, exit_binary_operation;
    UnaryOperation => enter_unary_operation, exit_unary_operation;
    Conditional => enter_conditional, exit_conditional;
    Identifier => enter_identifier, exit_identifier;
    Literal => enter_literal, exit_literal;
    FunctionCall => enter_function_call, exit_function_call;
    MemberAccess => enter_member_access, exit_member_access;
    IndexAccess => enter_index_access, exit_index_access;
    ElementaryTypeName => enter_elementary_type_name, exit_elementary_type_name;
    UserDefinedTypeName => enter_user_defined_type_name, exit_user_defined_type_name;
    Mapping => enter_mapping, exit_mapping;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::traverse::traverse;
    use zkweave_runtime::CompilerConfig;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Visitor for Recorder {
        fn enter_binary_operation(
            &mut self,
            _cx: &mut Context,
            _path: PathId,
            state: &mut WalkState,
        ) -> Result<()> {
            self.events.push("enter binary".to_string());
            state.skip_sub_nodes = true;
            Ok(())
        }

        fn exit_binary_operation(
            &mut self,
            _cx: &mut Context,
            _path: PathId,
            _state: &mut WalkState,
        ) -> Result<()> {
            self.events.push("exit binary".to_string());
            Ok(())
        }

        fn enter_identifier(
            &mut self,
            cx: &mut Context,
            path: PathId,
            _state: &mut WalkState,
        ) -> Result<()> {
            let name = cx.node(path).kind.name().unwrap_or_default().to_string();
            self.events.push(format!("identifier {}", name));
            Ok(())
        }
    }

    #[test]
    fn test_skip_sub_nodes_still_runs_exit() {
        let mut b = AstBuilder::new();
        let a = b.identifier("a", None);
        let c = b.identifier("c", None);
        let sum = b.binary(a, "+", c);
        let first = b.statement(sum);
        let d = b.identifier("d", None);
        let second = b.statement(d);
        let block = b.block(vec![first, second]);
        let mut cx = Context::new(b.finish(block).unwrap(), CompilerConfig::default());

        let root = cx.root_path().unwrap();
        let mut recorder = Recorder::default();
        traverse(&mut cx, root, &mut recorder, &mut WalkState::default()).unwrap();

        assert_eq!(recorder.events, vec!["enter binary", "exit binary", "identifier d"]);
    }
}
