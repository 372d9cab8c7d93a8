// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Subroutine declarations and call sites.
//!
//! A declaration is emitted in place, guarded by a jump over its body:
//!
//! ```text
//!   Jump -> skip
//! entry:                   ; subroutine label
//!   PushFrame params, locals
//!   [body]
//!   LoadUndef
//!   Return
//! skip:
//! ```
//!
//! Arguments are pushed right to left so the callee binds them left to
//! right. When the callee reads `@_`, `MakeArgArray` adds the argument array
//! on top and it lands in slot 0.

use tracing::debug;

use crate::ast::{Expression, ExpressionKind, Parameter, Span, Statement, SubCall, SubDeclaration};
use crate::compiler::bytecode::{Builtin, Label};
use crate::compiler::frame::{FrameKind, LoopControl};
use crate::compiler::locals::{self, ARG_LIST};
use crate::compiler::package::{strip_packages, PackageId, SubParam};
use crate::compiler::{slot_count, Compiler, SubroutineUse};
use crate::error::DiagnosticKind;
use crate::types::{Compatibility, TypeInfo};
use crate::{Error, Result};

/// Where a value is checked against a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeContext {
    Return,
    Argument,
    Assignment,
}

impl TypeContext {
    fn message(self, actual: &TypeInfo, expected: &TypeInfo) -> String {
        match self {
            TypeContext::Return => format!(
                "attempting to return a value of type `{}' when subroutine is expected to return `{}'",
                actual, expected
            ),
            TypeContext::Argument => format!(
                "attempting to pass a parameter of an incompatible type `{}' where `{}' is expected",
                actual, expected
            ),
            TypeContext::Assignment => format!(
                "attempting to assign a value of type `{}' to a variable of type `{}'",
                actual, expected
            ),
        }
    }
}

/// Reads a parameter pattern: `$name` or `Type $name`.
pub(crate) fn parse_param(param: &Parameter) -> std::result::Result<SubParam, (String, Span)> {
    let (name, ty) = match &param.pattern.kind {
        ExpressionKind::Variable(name) => (name, TypeInfo::None),
        ExpressionKind::OfType { ty, expr } => match &expr.kind {
            ExpressionKind::Variable(name) => (name, ty.clone()),
            _ => {
                return Err((
                    "expected an identifier after type name in subroutine parameter list"
                        .to_string(),
                    expr.span,
                ));
            }
        },
        _ => {
            return Err((
                "expected an identifier or a typed identifier in subroutine parameter list"
                    .to_string(),
                param.pattern.span,
            ));
        }
    };
    Ok(SubParam {
        name: name.clone(),
        ty,
        copy: param.copy,
    })
}

fn arg_count(count: usize) -> Option<u8> {
    u8::try_from(count).ok()
}

impl Compiler {
    /// Lowers a subroutine declaration.
    pub fn compile_sub(&mut self, decl: &SubDeclaration) -> Result<()> {
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            match parse_param(param) {
                Ok(param) => params.push(param),
                Err((message, span)) => {
                    self.error(DiagnosticKind::MalformedParameter, message, span);
                    return Ok(());
                }
            }
        }

        let package = self.package;
        let info = self
            .packages
            .get_or_create_sub(package, &decl.name, &mut self.codegen);
        if info.marked {
            self.error(
                DiagnosticKind::Redeclaration,
                format!("redeclaration of subroutine `{}'", decl.name),
                decl.span,
            );
            return Ok(());
        }
        let uses_arg_list = locals::uses_arg_list(&decl.body.statements);
        info.marked = true;
        info.declared = true;
        info.params = params.clone();
        info.return_type = decl.return_type.clone();
        info.uses_arg_list = uses_arg_list;
        let entry = info.label;

        let param_slots = slot_count(params.len() + usize::from(uses_arg_list))?;
        let locals = slot_count(locals::count_locals_needed(&decl.body.statements))?;

        let skip = self.codegen.create_label();
        {
            let mut this = self.enter_frame(FrameKind::Subroutine {
                return_type: decl.return_type.clone(),
            });
            this.codegen.emit_jump(skip);
            this.codegen.mark_label(entry)?;
            this.codegen.emit_push_frame(param_slots, locals);

            if uses_arg_list {
                this.frames
                    .add_arg(ARG_LIST, TypeInfo::array_of(TypeInfo::None))?;
            }
            for param in &params {
                this.frames.add_arg(&param.name, param.ty.clone())?;
            }

            if this.compile_sub_body(&decl.body.statements, &decl.return_type)? {
                this.codegen.emit_push_undef();
                this.codegen.emit_return();
            } else {
                this.emit_undef_return(decl.span);
            }
        }
        self.codegen.mark_label(skip)?;

        debug!(
            name = %self.packages.qualify(package, &decl.name),
            params = params.len(),
            locals,
            "emitted subroutine"
        );

        self.apply_traits(decl, package, entry)
    }

    /// Lowers the body; a trailing expression statement is returned.
    ///
    /// Returns whether the body ends in a return, in which case the
    /// fallthrough return after it is unreachable.
    fn compile_sub_body(
        &mut self,
        statements: &[Statement],
        return_type: &TypeInfo,
    ) -> Result<bool> {
        let Some((last, rest)) = statements.split_last() else {
            return Ok(false);
        };
        self.compile_statements(rest)?;

        match last {
            Statement::Expression(stmt) => {
                self.compile_expression(&stmt.expression)?;
                self.enforce_type(&stmt.expression, return_type, TypeContext::Return);
                self.codegen.emit_return();
                Ok(true)
            }
            Statement::Return(_) => {
                self.compile_statement(last)?;
                Ok(true)
            }
            other => {
                self.compile_statement(other)?;
                Ok(false)
            }
        }
    }

    /// Returns undef, coerced to the enclosing subroutine's return type.
    pub(crate) fn emit_undef_return(&mut self, span: Span) {
        let undef = Expression {
            kind: ExpressionKind::Undef,
            span,
        };
        let expected = self.frames.return_type();
        self.codegen.emit_push_undef();
        self.enforce_type(&undef, &expected, TypeContext::Return);
        self.codegen.emit_return();
    }

    fn apply_traits(
        &mut self,
        decl: &SubDeclaration,
        package: PackageId,
        entry: Label,
    ) -> Result<()> {
        for name in &decl.traits {
            match name.as_str() {
                "export" => {
                    if self.packages.find_enclosing_module(package).is_none() {
                        self.error(
                            DiagnosticKind::InvalidTrait,
                            "trait `export' can only be used inside a module",
                            decl.span,
                        );
                        continue;
                    }
                    if decl.name.starts_with('#') {
                        continue;
                    }
                    let position = self.codegen.label_position(entry).ok_or_else(|| {
                        Error::internal(format!("subroutine `{}' has no entry point", decl.name))
                    })?;
                    let qualified = self.packages.qualify(package, &decl.name);
                    self.module.export_sub(qualified, position);
                }
                other => self.error(
                    DiagnosticKind::InvalidTrait,
                    format!("use of unknown trait `{}'", other),
                    decl.span,
                ),
            }
        }
        Ok(())
    }

    /// Checks a freshly compiled value against `expected`.
    ///
    /// Emits a runtime coercion when the types are only castable. Returns
    /// `false` after recording an error for incompatible types.
    pub(crate) fn enforce_type(
        &mut self,
        expr: &Expression,
        expected: &TypeInfo,
        context: TypeContext,
    ) -> bool {
        if expected.is_none() {
            return true;
        }
        let actual = self.deduce_type(expr);
        match actual.check_compatibility(expected) {
            Compatibility::Identical => true,
            Compatibility::Castable => {
                self.codegen.emit_to_compatible(expected);
                true
            }
            Compatibility::Incompatible => {
                self.error(
                    DiagnosticKind::TypeMismatch,
                    context.message(&actual, expected),
                    expr.span,
                );
                false
            }
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Lowers a call. Always leaves exactly one value on the stack.
    pub(crate) fn compile_call(&mut self, call: &SubCall, span: Span) -> Result<()> {
        match call.name.as_str() {
            "last" | "next" => return self.compile_loop_control(call, span),
            "checkpoint" => return self.compile_checkpoint(call, span),
            _ => {}
        }

        match Builtin::from_name(&call.name) {
            Some(builtin) => self.compile_builtin_call(builtin, call, span),
            None => self.compile_sub_call(call, span),
        }
    }

    fn compile_loop_control(&mut self, call: &SubCall, span: Span) -> Result<()> {
        if !call.args.is_empty() {
            self.error(
                DiagnosticKind::Arity,
                format!("`{}' expects 0 arguments", call.name),
                span,
            );
            return Ok(());
        }

        let Some(control) = self.frames.innermost_loop() else {
            self.error(
                DiagnosticKind::InvalidContext,
                "no loop structure to break from",
                span,
            );
            return Ok(());
        };

        if call.name == "last" {
            self.codegen.emit_jump(control.done());
        } else {
            if let LoopControl::ForEach { index_slot, .. } = control {
                self.emit_increment(index_slot);
            }
            self.codegen.emit_jump(control.next());
        }
        self.codegen.emit_push_undef();
        Ok(())
    }

    fn compile_checkpoint(&mut self, call: &SubCall, span: Span) -> Result<()> {
        let id = match call.args.as_slice() {
            [Expression {
                kind: ExpressionKind::Integer(id),
                ..
            }] => *id,
            _ => {
                self.error(
                    DiagnosticKind::InvalidArgument,
                    "`checkpoint' expects a single integer literal",
                    span,
                );
                return Ok(());
            }
        };
        if self.options.checkpoints {
            self.codegen.emit_checkpoint(id);
        }
        self.codegen.emit_push_undef();
        Ok(())
    }

    fn compile_builtin_call(&mut self, builtin: Builtin, call: &SubCall, span: Span) -> Result<()> {
        let Some(argc) = self.checked_arg_count(call, 0, span) else {
            return Ok(());
        };
        for arg in call.args.iter().rev() {
            self.compile_expression(arg)?;
        }
        self.codegen.emit_call_builtin(builtin, argc);
        Ok(())
    }

    fn compile_sub_call(&mut self, call: &SubCall, span: Span) -> Result<()> {
        let resolved = self
            .packages
            .resolve_sub(self.package, &call.name)
            .map(|(owner, info)| {
                (
                    self.packages.qualify(owner, strip_packages(&call.name)),
                    info.clone(),
                )
            });

        let Some((name, info)) = resolved else {
            return self.compile_external_call(call, span);
        };

        if call.args.len() < info.params.len() {
            self.error(
                DiagnosticKind::Arity,
                format!(
                    "subroutine `{}' expects at least {} required parameter(s), {} given.",
                    name,
                    info.params.len(),
                    call.args.len()
                ),
                span,
            );
            return Ok(());
        }

        let extra = usize::from(info.uses_arg_list);
        let Some(argc) = self.checked_arg_count(call, extra, span) else {
            return Ok(());
        };

        for (i, arg) in call.args.iter().enumerate().rev() {
            self.compile_expression(arg)?;
            if let Some(param) = info.params.get(i) {
                if param.copy {
                    self.codegen.emit_copy();
                }
                if !self.enforce_type(arg, &param.ty, TypeContext::Argument) {
                    return Ok(());
                }
            }
        }

        if info.uses_arg_list {
            // argc fits in a u8, so the count fits in a u16
            self.codegen.emit_make_arg_array(call.args.len() as u16);
        }

        let position = self.codegen.emit_call(info.label, argc);
        self.uses.push(SubroutineUse {
            name,
            span,
            position,
            resolved: true,
        });
        Ok(())
    }

    /// Emits a placeholder call for a subroutine defined in another unit.
    fn compile_external_call(&mut self, call: &SubCall, span: Span) -> Result<()> {
        let Some(argc) = self.checked_arg_count(call, 0, span) else {
            return Ok(());
        };
        for arg in call.args.iter().rev() {
            self.compile_expression(arg)?;
        }

        let position = self.codegen.emit_placeholder_call(argc);
        debug!(name = %call.name, position, "placeholder call");
        self.uses.push(SubroutineUse {
            name: call.name.clone(),
            span,
            position,
            resolved: false,
        });
        Ok(())
    }

    fn checked_arg_count(&mut self, call: &SubCall, extra: usize, span: Span) -> Option<u8> {
        let argc = arg_count(call.args.len() + extra);
        if argc.is_none() {
            self.error(
                DiagnosticKind::InvalidArgument,
                format!("too many arguments in call to `{}'", call.name),
                span,
            );
        }
        argc
    }
}
