// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Expression compilation and static type deduction.

use crate::ast::{BinaryOperator, Expression, ExpressionKind, UnaryOperator};
use crate::compiler::Compiler;
use crate::compiler::bytecode::{Builtin, OpCode};
use crate::compiler::subroutine::TypeContext;
use crate::error::DiagnosticKind;
use crate::types::TypeInfo;
use crate::{Error, Result};

fn sigil_type(name: &str) -> TypeInfo {
    match name.chars().next() {
        Some('@') => TypeInfo::array_of(TypeInfo::None),
        Some('%') => TypeInfo::Hash,
        _ => TypeInfo::None,
    }
}

fn binary_opcode(op: BinaryOperator) -> OpCode {
    match op {
        BinaryOperator::Add => OpCode::Add,
        BinaryOperator::Subtract => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::Concat => OpCode::Concat,
        BinaryOperator::Equal => OpCode::Eq,
        BinaryOperator::NotEqual => OpCode::Ne,
        BinaryOperator::LessThan => OpCode::Lt,
        BinaryOperator::LessThanEqual => OpCode::Le,
        BinaryOperator::GreaterThan => OpCode::Gt,
        BinaryOperator::GreaterThanEqual => OpCode::Ge,
    }
}

impl Compiler {
    /// Compiles an expression, leaving exactly one value on the stack.
    pub fn compile_expression(&mut self, expr: &Expression) -> Result<()> {
        match &expr.kind {
            ExpressionKind::Integer(value) => {
                self.codegen.emit_push_int(*value);
            }
            ExpressionKind::Float(value) => {
                self.codegen.emit_push_num(*value)?;
            }
            ExpressionKind::Str(value) => {
                self.codegen.emit_push_str(value)?;
            }
            ExpressionKind::Bool(value) => {
                self.codegen.emit_push_bool(*value);
            }
            ExpressionKind::Undef => {
                self.codegen.emit_push_undef();
            }
            ExpressionKind::Variable(name) => match self.frames.resolve(name) {
                Some(local) => {
                    let slot = local.slot;
                    self.codegen.emit_load(slot);
                }
                None => {
                    self.error(
                        DiagnosticKind::UndeclaredVariable,
                        format!("use of undeclared variable `{}'", name),
                        expr.span,
                    );
                    self.codegen.emit_push_undef();
                }
            },
            ExpressionKind::Declare { name, ty } => {
                let slot = self.frames.add_local(name, ty.clone())?;
                self.codegen.emit_push_undef();
                self.codegen.emit_dup();
                self.codegen.emit_store(slot);
            }
            ExpressionKind::OfType { .. } => {
                self.error(
                    DiagnosticKind::InvalidContext,
                    "type annotations are only allowed in subroutine parameter lists",
                    expr.span,
                );
                self.codegen.emit_push_undef();
            }
            ExpressionKind::List(items) => self.compile_list(items)?,
            ExpressionKind::Binary { op, left, right } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.codegen.emit_op(binary_opcode(*op));
            }
            ExpressionKind::Unary { op, operand } => {
                self.compile_expression(operand)?;
                self.codegen.emit_op(match op {
                    UnaryOperator::Minus => OpCode::Neg,
                    UnaryOperator::Not => OpCode::Not,
                });
            }
            ExpressionKind::Assign { target, value } => self.compile_assign(target, value)?,
            ExpressionKind::Index { target, index } => {
                self.compile_expression(target)?;
                self.compile_expression(index)?;
                self.codegen.emit_array_get();
            }
            ExpressionKind::Call(call) => self.compile_call(call, expr.span)?,
        }
        Ok(())
    }

    /// Lowers a list literal into a single array value.
    pub fn compile_list(&mut self, items: &[Expression]) -> Result<()> {
        for item in items {
            self.compile_expression(item)?;
        }
        let count =
            u16::try_from(items.len()).map_err(|_| Error::internal("list literal too long"))?;
        self.codegen.emit_box_array(count);
        Ok(())
    }

    fn compile_assign(&mut self, target: &Expression, value: &Expression) -> Result<()> {
        // The value is compiled first so `my $x = $x` reads the outer `$x`.
        self.compile_expression(value)?;

        let (slot, ty) = match &target.kind {
            ExpressionKind::Variable(name) => match self.frames.resolve(name) {
                Some(local) => (local.slot, local.ty.clone()),
                None => {
                    self.error(
                        DiagnosticKind::UndeclaredVariable,
                        format!("assignment to undeclared variable `{}'", name),
                        target.span,
                    );
                    return Ok(());
                }
            },
            ExpressionKind::Declare { name, ty } => {
                (self.frames.add_local(name, ty.clone())?, ty.clone())
            }
            _ => {
                self.error(
                    DiagnosticKind::InvalidContext,
                    "left side of assignment must be a variable",
                    target.span,
                );
                return Ok(());
            }
        };

        if !self.enforce_type(value, &ty, TypeContext::Assignment) {
            return Ok(());
        }
        self.codegen.emit_dup();
        self.codegen.emit_store(slot);
        Ok(())
    }

    /// Best-effort static type of an expression; `TypeInfo::None` if unknown.
    pub fn deduce_type(&self, expr: &Expression) -> TypeInfo {
        match &expr.kind {
            ExpressionKind::Integer(_) => TypeInfo::Int,
            ExpressionKind::Float(_) => TypeInfo::Num,
            ExpressionKind::Str(_) => TypeInfo::Str,
            ExpressionKind::Bool(_) => TypeInfo::Bool,
            ExpressionKind::Undef => TypeInfo::None,
            ExpressionKind::Variable(name) => match self.frames.resolve(name) {
                Some(local) if !local.ty.is_none() => local.ty.clone(),
                _ => sigil_type(name),
            },
            ExpressionKind::Declare { name, ty } => {
                if ty.is_none() {
                    sigil_type(name)
                } else {
                    ty.clone()
                }
            }
            ExpressionKind::OfType { ty, .. } => ty.clone(),
            ExpressionKind::List(_) => TypeInfo::array_of(TypeInfo::None),
            ExpressionKind::Binary { op, left, right } => {
                if op.is_comparison() {
                    return TypeInfo::Bool;
                }
                match op {
                    BinaryOperator::Concat => TypeInfo::Str,
                    BinaryOperator::Divide => TypeInfo::Num,
                    _ => match (self.deduce_type(left), self.deduce_type(right)) {
                        (TypeInfo::Int, TypeInfo::Int) => TypeInfo::Int,
                        (TypeInfo::Int | TypeInfo::Num, TypeInfo::Int | TypeInfo::Num) => {
                            TypeInfo::Num
                        }
                        _ => TypeInfo::None,
                    },
                }
            }
            ExpressionKind::Unary { op, operand } => match op {
                UnaryOperator::Not => TypeInfo::Bool,
                UnaryOperator::Minus => match self.deduce_type(operand) {
                    ty @ (TypeInfo::Int | TypeInfo::Num) => ty,
                    _ => TypeInfo::None,
                },
            },
            ExpressionKind::Assign { target, value } => match self.deduce_type(target) {
                TypeInfo::None => self.deduce_type(value),
                ty => ty,
            },
            ExpressionKind::Index { target, .. } => match self.deduce_type(target) {
                TypeInfo::Array(elem) => *elem,
                _ => TypeInfo::None,
            },
            ExpressionKind::Call(call) => {
                if let Some(builtin) = Builtin::from_name(&call.name) {
                    return builtin.result_type();
                }
                self.packages
                    .resolve_sub(self.package, &call.name)
                    .map(|(_, info)| info.return_type.clone())
                    .unwrap_or_default()
            }
        }
    }
}
