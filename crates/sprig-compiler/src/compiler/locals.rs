// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static pre-scans over subroutine bodies.
//!
//! The slot count must agree with how statement lowering opens frames:
//! blocks, `if` bodies, C-style loop bodies and package bodies get a fresh
//! scope; a `while` condition shares the scope of its body; a `for` loop adds
//! two hidden slots. Nested subroutine bodies reserve their own frame and
//! are skipped.

use rustc_hash::FxHashSet;

use crate::ast::{Expression, ExpressionKind, Statement};

/// The implicit argument array.
pub const ARG_LIST: &str = "@_";

/// Number of local slots a body needs beyond its arguments.
pub fn count_locals_needed(statements: &[Statement]) -> usize {
    let mut scope = ScopeCount::default();
    scope.statements(statements);
    scope.total()
}

#[derive(Default)]
struct ScopeCount<'a> {
    names: FxHashSet<&'a str>,
    nested: usize,
}

impl<'a> ScopeCount<'a> {
    fn total(&self) -> usize {
        self.names.len() + self.nested
    }

    fn nested_scope(&mut self, statements: &'a [Statement]) {
        self.nested += count_locals_needed(statements);
    }

    fn statements(&mut self, statements: &'a [Statement]) {
        for stmt in statements {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::Expression(stmt) => self.expression(&stmt.expression),
            Statement::Block(block) => self.nested_scope(&block.statements),
            Statement::Sub(_) | Statement::Use(_) => {}
            Statement::Return(ret) => {
                if let Some(value) = &ret.value {
                    self.expression(value);
                }
            }
            Statement::If(stmt) => {
                for branch in std::iter::once(&stmt.main).chain(&stmt.elsifs) {
                    self.expression(&branch.condition);
                    self.nested_scope(&branch.body.statements);
                }
                if let Some(otherwise) = &stmt.otherwise {
                    self.nested_scope(&otherwise.statements);
                }
            }
            Statement::While(stmt) => {
                let mut inner = ScopeCount::default();
                inner.expression(&stmt.condition);
                inner.statements(&stmt.body.statements);
                self.nested += inner.total();
            }
            Statement::For(stmt) => {
                self.expression(&stmt.iterable);
                let mut inner = ScopeCount::default();
                inner.statements(&stmt.body.statements);
                self.nested += inner.total() + 2;
            }
            Statement::Loop(stmt) => {
                let mut inner = ScopeCount::default();
                for part in [&stmt.init, &stmt.condition, &stmt.step]
                    .into_iter()
                    .flatten()
                {
                    inner.expression(part);
                }
                inner.nested_scope(&stmt.body.statements);
                self.nested += inner.total();
            }
            Statement::Package(decl) | Statement::Module(decl) => {
                self.nested_scope(&decl.body.statements)
            }
        }
    }

    fn expression(&mut self, expr: &'a Expression) {
        match &expr.kind {
            ExpressionKind::Declare { name, .. } => {
                self.names.insert(name);
            }
            ExpressionKind::OfType { expr, .. } => self.expression(expr),
            ExpressionKind::List(items) => items.iter().for_each(|item| self.expression(item)),
            ExpressionKind::Binary { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            ExpressionKind::Unary { operand, .. } => self.expression(operand),
            ExpressionKind::Assign { target, value } => {
                self.expression(target);
                self.expression(value);
            }
            ExpressionKind::Index { target, index } => {
                self.expression(target);
                self.expression(index);
            }
            ExpressionKind::Call(call) => call.args.iter().for_each(|arg| self.expression(arg)),
            ExpressionKind::Integer(_)
            | ExpressionKind::Float(_)
            | ExpressionKind::Str(_)
            | ExpressionKind::Bool(_)
            | ExpressionKind::Undef
            | ExpressionKind::Variable(_) => {}
        }
    }
}

/// Whether a body reads the implicit argument array.
pub fn uses_arg_list(statements: &[Statement]) -> bool {
    statements.iter().any(statement_uses_arg_list)
}

fn statement_uses_arg_list(stmt: &Statement) -> bool {
    match stmt {
        Statement::Expression(stmt) => expression_uses_arg_list(&stmt.expression),
        Statement::Block(block) => uses_arg_list(&block.statements),
        Statement::Sub(_) | Statement::Use(_) => false,
        Statement::Return(ret) => ret.value.as_ref().is_some_and(expression_uses_arg_list),
        Statement::If(stmt) => {
            std::iter::once(&stmt.main).chain(&stmt.elsifs).any(|branch| {
                expression_uses_arg_list(&branch.condition)
                    || uses_arg_list(&branch.body.statements)
            }) || stmt
                .otherwise
                .as_ref()
                .is_some_and(|block| uses_arg_list(&block.statements))
        }
        Statement::While(stmt) => {
            expression_uses_arg_list(&stmt.condition) || uses_arg_list(&stmt.body.statements)
        }
        Statement::For(stmt) => {
            expression_uses_arg_list(&stmt.iterable) || uses_arg_list(&stmt.body.statements)
        }
        Statement::Loop(stmt) => {
            [&stmt.init, &stmt.condition, &stmt.step]
                .into_iter()
                .flatten()
                .any(expression_uses_arg_list)
                || uses_arg_list(&stmt.body.statements)
        }
        Statement::Package(decl) | Statement::Module(decl) => uses_arg_list(&decl.body.statements),
    }
}

fn expression_uses_arg_list(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Variable(name) => name == ARG_LIST,
        ExpressionKind::OfType { expr, .. } => expression_uses_arg_list(expr),
        ExpressionKind::List(items) => items.iter().any(expression_uses_arg_list),
        ExpressionKind::Binary { left, right, .. } => {
            expression_uses_arg_list(left) || expression_uses_arg_list(right)
        }
        ExpressionKind::Unary { operand, .. } => expression_uses_arg_list(operand),
        ExpressionKind::Assign { target, value } => {
            expression_uses_arg_list(target) || expression_uses_arg_list(value)
        }
        ExpressionKind::Index { target, index } => {
            expression_uses_arg_list(target) || expression_uses_arg_list(index)
        }
        ExpressionKind::Call(call) => call.args.iter().any(expression_uses_arg_list),
        _ => false,
    }
}
