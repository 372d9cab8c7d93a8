// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tests for the compiler driver.

use super::*;
use crate::ast::BinaryOperator;
use crate::ast::build::*;
use crate::ast::{Expression, ExpressionKind, Parameter, SubCall};

fn compile(body: Vec<Statement>) -> CompiledUnit {
    Compiler::new("test").compile(&program(body)).unwrap()
}

fn errors(body: Vec<Statement>) -> Vec<Diagnostic> {
    match Compiler::new("test").compile(&program(body)) {
        Err(Error::Compile(diagnostics)) => diagnostics,
        other => panic!("expected compile errors, got {:?}", other),
    }
}

fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(|d| d.kind).collect()
}

fn typed_sub(ty: TypeInfo, body: Vec<Statement>) -> Statement {
    sub_stmt(sub("f", vec![], body).returns(ty))
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_empty_program() {
    let unit = compile(vec![]);
    assert_eq!(unit.bytecode.instructions[0].opcode, OpCode::PushFrame);
    assert_eq!(unit.bytecode.instructions[1].opcode, OpCode::Halt);
    assert!(unit.uses.is_empty());
}

#[test]
fn test_sub_body_is_skipped() {
    let unit = compile(vec![sub_stmt(sub("f", vec![], vec![]))]);
    let entry = unit.subroutines["f"];
    assert_eq!(
        unit.bytecode.instructions[1].operand,
        Some(Operand::Jump(entry + 3))
    );
    assert_eq!(unit.bytecode.instructions[entry].opcode, OpCode::PushFrame);
}

#[test]
fn test_redeclaration_reported_once() {
    let body = vec![
        sub_stmt(sub("f", vec![], vec![])),
        sub_stmt(sub("f", vec![], vec![]).at(4, 1)),
    ];
    let mut compiler = Compiler::new("test");
    compiler.lower(&program(body)).unwrap();

    let diagnostics = compiler.diagnostics();
    assert_eq!(kinds(diagnostics), vec![DiagnosticKind::Redeclaration]);
    assert_eq!(diagnostics[0].message, "redeclaration of subroutine `f'");
    assert_eq!(diagnostics[0].span, Span::new(4, 1));

    let frames = compiler
        .codegen
        .instructions()
        .iter()
        .filter(|inst| inst.opcode == OpCode::PushFrame)
        .count();
    assert_eq!(frames, 2);
}

#[test]
fn test_same_name_in_different_packages() {
    let unit = compile(vec![
        package("A", vec![sub_stmt(sub("f", vec![], vec![]))]),
        package("B", vec![sub_stmt(sub("f", vec![], vec![]))]),
    ]);
    assert!(unit.subroutines.contains_key("A::f"));
    assert!(unit.subroutines.contains_key("B::f"));
}

#[test]
fn test_malformed_parameter() {
    let bad = Parameter {
        pattern: int(1).at(2, 9),
        copy: false,
    };
    let diagnostics = errors(vec![sub_stmt(sub("f", vec![bad], vec![]))]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::MalformedParameter]);
    assert_eq!(diagnostics[0].span, Span::new(2, 9));

    let typed_literal = Parameter {
        pattern: of_type(TypeInfo::Int, int(3)),
        copy: false,
    };
    let diagnostics = errors(vec![sub_stmt(sub("g", vec![typed_literal], vec![]))]);
    assert_eq!(
        diagnostics[0].message,
        "expected an identifier after type name in subroutine parameter list"
    );
}

#[test]
fn test_params_bound_in_order() {
    let unit = compile(vec![sub_stmt(sub(
        "f",
        vec![param("$a"), param("$b")],
        vec![expr(var("$b"))],
    ))]);
    let entry = unit.subroutines["f"];
    assert_eq!(
        unit.bytecode.instructions[entry].operand,
        Some(Operand::Frame {
            params: 2,
            locals: 0
        })
    );
    assert_eq!(
        unit.bytecode.instructions[entry + 1].operand,
        Some(Operand::Local(1))
    );
}

#[test]
fn test_frame_reserves_locals() {
    let unit = compile(vec![sub_stmt(sub(
        "f",
        vec![param("$a")],
        vec![
            expr(assign(my("$x"), int(1))),
            for_each("$i", var("$a"), vec![expr(my("$y"))]),
        ],
    ))]);
    let entry = unit.subroutines["f"];
    assert_eq!(
        unit.bytecode.instructions[entry].operand,
        Some(Operand::Frame {
            params: 1,
            locals: 4
        })
    );
}

// ============================================================================
// Return types
// ============================================================================

#[test]
fn test_return_identical_needs_no_coercion() {
    let unit = compile(vec![typed_sub(TypeInfo::Int, vec![expr(int(1))])]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 0);
}

#[test]
fn test_return_castable_emits_one_coercion() {
    let unit = compile(vec![typed_sub(TypeInfo::Int, vec![expr(string("42"))])]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);

    let unit = compile(vec![sub_stmt(
        sub("g", vec![param("$x")], vec![ret(Some(var("$x")))]).returns(TypeInfo::Str),
    )]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);
}

#[test]
fn test_return_incompatible() {
    let diagnostics = errors(vec![typed_sub(
        TypeInfo::Int,
        vec![expr(list(vec![int(1), int(2)]))],
    )]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TypeMismatch]);
    assert_eq!(
        diagnostics[0].message,
        "attempting to return a value of type `Array' when subroutine is expected to return `Int'"
    );
}

#[test]
fn test_bare_return_is_coerced() {
    let unit = compile(vec![typed_sub(TypeInfo::Int, vec![ret(None)])]);
    let code = &unit.bytecode.instructions;
    let coercions: Vec<usize> = (0..code.len())
        .filter(|&i| code[i].opcode == OpCode::ToCompatible)
        .collect();
    assert_eq!(coercions.len(), 1);

    let at = coercions[0];
    assert_eq!(code[at - 1].opcode, OpCode::LoadUndef);
    assert_eq!(code[at].operand, Some(Operand::Type(TypeInfo::Int)));
    assert_eq!(code[at + 1].opcode, OpCode::Return);
}

#[test]
fn test_untyped_bare_return_needs_no_coercion() {
    let unit = compile(vec![sub_stmt(sub("f", vec![], vec![ret(None)]))]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 0);
}

#[test]
fn test_fallthrough_return_is_coerced() {
    let unit = compile(vec![typed_sub(
        TypeInfo::Str,
        vec![if_else(boolean(true), vec![], vec![], None)],
    )]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);

    let unit = compile(vec![typed_sub(TypeInfo::Str, vec![])]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);
}

#[test]
fn test_return_type_error_still_applies_traits() {
    let diagnostics = errors(vec![sub_stmt(
        sub("f", vec![], vec![expr(list(vec![int(1)]))])
            .returns(TypeInfo::Int)
            .with_trait("bogus"),
    )]);
    assert_eq!(
        kinds(&diagnostics),
        vec![DiagnosticKind::TypeMismatch, DiagnosticKind::InvalidTrait]
    );
}

#[test]
fn test_deduced_arithmetic_type() {
    let unit = compile(vec![sub_stmt(
        sub(
            "f",
            vec![typed_param(TypeInfo::Int, "$x")],
            vec![expr(binary(BinaryOperator::Add, var("$x"), int(1)))],
        )
        .returns(TypeInfo::Int),
    )]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 0);
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_arity_error() {
    let diagnostics = errors(vec![
        sub_stmt(sub("f", vec![param("$a"), param("$b")], vec![])),
        expr(call("f", vec![int(1)]).at(3, 5)),
    ]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::Arity]);
    assert_eq!(
        diagnostics[0].message,
        "subroutine `f' expects at least 2 required parameter(s), 1 given."
    );
    assert_eq!(diagnostics[0].span, Span::new(3, 5));
}

#[test]
fn test_extra_arguments_allowed() {
    let unit = compile(vec![
        sub_stmt(sub("f", vec![param("$a")], vec![])),
        expr(call("f", vec![int(1), int(2), int(3)])),
    ]);
    assert_eq!(unit.uses.len(), 1);
}

#[test]
fn test_argument_type_checks() {
    let typed = || sub_stmt(sub("f", vec![typed_param(TypeInfo::Int, "$n")], vec![]));

    let unit = compile(vec![typed(), expr(call("f", vec![string("7")]))]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);

    let diagnostics = errors(vec![typed(), expr(call("f", vec![list(vec![])]))]);
    assert_eq!(
        diagnostics[0].message,
        "attempting to pass a parameter of an incompatible type `Array' where `Int' is expected"
    );
}

#[test]
fn test_copy_parameter() {
    let copied = Parameter {
        pattern: var("@items"),
        copy: true,
    };
    let unit = compile(vec![
        sub_stmt(sub("f", vec![copied], vec![])),
        expr(call("f", vec![list(vec![int(1)])])),
    ]);
    assert_eq!(unit.bytecode.count(OpCode::Copy), 1);
}

#[test]
fn test_arguments_compiled_right_to_left() {
    let unit = compile(vec![expr(call("say", vec![int(1), int(2)]))]);
    let pushed: Vec<_> = unit
        .bytecode
        .instructions
        .iter()
        .filter(|inst| inst.opcode == OpCode::PushInt)
        .map(|inst| inst.operand.clone())
        .collect();
    assert_eq!(pushed, vec![Some(Operand::Int(2)), Some(Operand::Int(1))]);
    assert!(unit.uses.is_empty());
}

#[test]
fn test_forward_reference_resolves_locally() {
    let unit = compile(vec![
        expr(call("later", vec![])),
        sub_stmt(sub("later", vec![], vec![])),
    ]);
    let call_site = &unit.uses[0];
    assert!(call_site.resolved);
    assert_eq!(call_site.name, "later");
    assert_eq!(
        unit.bytecode.instructions[call_site.position].operand,
        Some(Operand::Call {
            target: CallTarget::Address(unit.subroutines["later"]),
            argc: 0
        })
    );
}

#[test]
fn test_undeclared_call_is_placeholder() {
    let unit = compile(vec![expr(call("foo", vec![]).at(1, 1))]);
    assert_eq!(
        unit.uses,
        vec![SubroutineUse {
            name: "foo".to_string(),
            span: Span::new(1, 1),
            position: 1,
            resolved: false,
        }]
    );
    assert_eq!(
        unit.bytecode.instructions[1].operand,
        Some(Operand::Call {
            target: CallTarget::Unresolved,
            argc: 0
        })
    );
}

#[test]
fn test_resolution_walks_outward() {
    let unit = compile(vec![package(
        "Outer",
        vec![
            sub_stmt(sub("helper", vec![], vec![])),
            package("Inner", vec![expr(call("helper", vec![]))]),
        ],
    )]);
    assert_eq!(unit.uses[0].name, "Outer::helper");
    assert!(unit.uses[0].resolved);
}

#[test]
fn test_qualified_call_descends() {
    let unit = compile(vec![
        module(
            "Math",
            vec![sub_stmt(sub("square", vec![param("$x")], vec![]))],
        ),
        expr(call("Math::square", vec![int(3)])),
    ]);
    assert_eq!(unit.uses[0].name, "Math::square");
    assert!(unit.uses[0].resolved);
}

#[test]
fn test_arg_list_reified() {
    let unit = compile(vec![
        sub_stmt(sub("count", vec![], vec![expr(call("elems", vec![var("@_")]))])),
        expr(call("count", vec![int(1), int(2)])),
    ]);
    let entry = unit.subroutines["count"];
    assert_eq!(
        unit.bytecode.instructions[entry].operand,
        Some(Operand::Frame {
            params: 1,
            locals: 0
        })
    );
    let position = unit.uses[0].position;
    assert_eq!(
        unit.bytecode.instructions[position - 1].operand,
        Some(Operand::Count(2))
    );
    assert_eq!(
        unit.bytecode.instructions[position].operand,
        Some(Operand::Call {
            target: CallTarget::Address(entry),
            argc: 3
        })
    );
}

// ============================================================================
// Traits and modules
// ============================================================================

#[test]
fn test_export_inside_module() {
    let unit = compile(vec![module(
        "Math",
        vec![sub_stmt(
            sub("square", vec![param("$x")], vec![expr(binary(
                BinaryOperator::Multiply,
                var("$x"),
                var("$x"),
            ))])
            .with_trait("export"),
        )],
    )]);
    assert_eq!(unit.module.modules, vec!["Math"]);
    assert_eq!(
        unit.module.exports,
        vec![Export {
            name: "Math::square".to_string(),
            position: unit.subroutines["Math::square"],
        }]
    );
}

#[test]
fn test_export_outside_module() {
    let diagnostics = errors(vec![package(
        "Util",
        vec![sub_stmt(sub("f", vec![], vec![]).with_trait("export"))],
    )]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidTrait]);
    assert_eq!(
        diagnostics[0].message,
        "trait `export' can only be used inside a module"
    );
}

#[test]
fn test_hidden_names_not_exported() {
    let unit = compile(vec![module(
        "M",
        vec![sub_stmt(sub("#init", vec![], vec![]).with_trait("export"))],
    )]);
    assert!(unit.module.exports.is_empty());
}

#[test]
fn test_unknown_trait() {
    let diagnostics = errors(vec![sub_stmt(
        sub("f", vec![], vec![]).with_trait("cached"),
    )]);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidTrait);
    assert_eq!(diagnostics[0].message, "use of unknown trait `cached'");
}

#[test]
fn test_use_records_dependency() {
    let unit = compile(vec![use_module("Math"), use_module("Math")]);
    assert_eq!(unit.module.dependencies, vec!["Math"]);
    assert_eq!(unit.bytecode.len(), 2);
}

// ============================================================================
// Loop control and special calls
// ============================================================================

#[test]
fn test_last_outside_loop() {
    let diagnostics = errors(vec![expr(call("last", vec![]))]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidContext]);
    assert_eq!(diagnostics[0].message, "no loop structure to break from");
}

#[test]
fn test_loop_control_does_not_cross_subroutine() {
    let diagnostics = errors(vec![while_loop(
        boolean(true),
        vec![sub_stmt(sub("f", vec![], vec![expr(call("next", vec![]))]))],
    )]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidContext]);
}

#[test]
fn test_last_with_arguments() {
    let diagnostics = errors(vec![while_loop(
        boolean(true),
        vec![expr(call("last", vec![int(1)]))],
    )]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::Arity]);
    assert_eq!(diagnostics[0].message, "`last' expects 0 arguments");
}

#[test]
fn test_last_jumps_past_loop() {
    let unit = compile(vec![while_loop(
        boolean(true),
        vec![expr(call("last", vec![]))],
    )]);
    let jumps: Vec<_> = unit
        .bytecode
        .instructions
        .iter()
        .filter(|inst| inst.opcode == OpCode::Jump)
        .map(|inst| inst.operand.clone())
        .collect();
    let halt = unit.bytecode.len() - 1;
    assert_eq!(jumps[0], Some(Operand::Jump(halt)));
    assert_eq!(jumps[1], Some(Operand::Jump(1)));
}

#[test]
fn test_checkpoint() {
    let body = || vec![expr(call("checkpoint", vec![int(5)]))];

    let unit = compile(body());
    assert_eq!(unit.bytecode.count(OpCode::Checkpoint), 1);

    let options = CompileOptions {
        checkpoints: false,
        ..CompileOptions::default()
    };
    let unit = Compiler::with_options("test", options)
        .compile(&program(body()))
        .unwrap();
    assert_eq!(unit.bytecode.count(OpCode::Checkpoint), 0);

    let diagnostics = errors(vec![expr(call("checkpoint", vec![string("x")]))]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidArgument]);
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_undeclared_variable() {
    let diagnostics = errors(vec![expr(call("say", vec![var("$nope")]))]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::UndeclaredVariable]);
}

#[test]
fn test_typed_variable_assignment() {
    let unit = compile(vec![expr(assign(
        my_typed("$n", TypeInfo::Int),
        string("3"),
    ))]);
    assert_eq!(unit.bytecode.count(OpCode::ToCompatible), 1);

    let diagnostics = errors(vec![expr(assign(
        my_typed("$n", TypeInfo::Int),
        list(vec![]),
    ))]);
    assert_eq!(
        diagnostics[0].message,
        "attempting to assign a value of type `Array' to a variable of type `Int'"
    );
}

#[test]
fn test_type_annotation_outside_parameters() {
    let diagnostics = errors(vec![expr(of_type(TypeInfo::Int, var("$x")))]);
    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidContext]);
}

// ============================================================================
// Error recovery
// ============================================================================

#[test]
fn test_errors_in_siblings_are_all_reported() {
    let diagnostics = errors(vec![
        expr(call("last", vec![])),
        sub_stmt(sub("f", vec![], vec![]).with_trait("bogus")),
        expr(call("next", vec![])),
    ]);
    assert_eq!(
        kinds(&diagnostics),
        vec![
            DiagnosticKind::InvalidContext,
            DiagnosticKind::InvalidTrait,
            DiagnosticKind::InvalidContext,
        ]
    );
}

#[test]
fn test_error_limit() {
    let options = CompileOptions {
        max_errors: 1,
        ..CompileOptions::default()
    };
    let body = vec![expr(call("last", vec![])), expr(call("last", vec![]))];
    match Compiler::with_options("test", options).compile(&program(body)) {
        Err(Error::Compile(diagnostics)) => assert_eq!(diagnostics.len(), 1),
        other => panic!("expected compile errors, got {:?}", other),
    }
}

#[test]
fn test_ast_from_json() {
    let json = r#"{
        "body": [
            {"Expression": {"expression": {
                "kind": {"Call": {"name": "say", "args": [{"kind": {"Str": "hi"}}]}},
                "span": {"line": 1, "column": 1}
            }}}
        ]
    }"#;
    let program: Program = serde_json::from_str(json).unwrap();
    let expected = crate::ast::build::program(vec![expr(
        Expression::new(ExpressionKind::Call(SubCall {
            name: "say".to_string(),
            args: vec![string("hi")],
        }))
        .at(1, 1),
    )]);
    assert_eq!(program, expected);
}
