// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement lowering.
//!
//! ## Control Flow Compilation
//!
//! ### If Statement
//!
//! ```text
//! if c1 { a } elsif c2 { b } else { c }
//!
//!   [c1]
//!   JumpIfFalse -> next1
//!   [a]
//!   Jump -> done
//! next1:
//!   [c2]
//!   JumpIfFalse -> next2
//!   [b]
//!   Jump -> done
//! next2:
//!   [c]
//! done:
//! ```
//!
//! ### C-style Loop
//!
//! ```text
//! loop (init; cond; step) { body }
//!
//!   [init] Pop
//! top:
//!   [cond]
//!   JumpIfFalse -> done
//!   [body]
//! step:                      ; target of `next`
//!   [step] Pop
//!   Jump -> top
//! done:
//! ```
//!
//! ### For Loop
//!
//! The iterable and its element count stay on the stack for the whole loop.
//!
//! ```text
//! for LIST -> $x { body }
//!
//!   PushInt 0, StoreLocal index
//!   [LIST]
//!   Dup, CallBuiltin elems          ; list count
//! top:                              ; target of `next` (after increment)
//!   LoadLocal index, DupN 1
//!   JumpIfGreaterOrEqual -> done
//!   DupN 1, LoadLocal index, ArrayGet
//!   StoreLocal $x
//!   [body]
//!   index += 1
//!   Jump -> top
//! done:
//!   Pop, Pop
//! ```

use crate::ast::{
    Block, ForStatement, IfStatement, LoopStatement, PackageDeclaration, ReturnStatement,
    Statement, UseStatement, WhileStatement,
};
use crate::compiler::bytecode::{Builtin, OpCode};
use crate::compiler::frame::{FrameKind, LoopControl, Slot};
use crate::compiler::package::PackageKind;
use crate::compiler::subroutine::TypeContext;
use crate::compiler::Compiler;
use crate::types::TypeInfo;
use crate::Result;

impl Compiler {
    pub(crate) fn compile_statements(&mut self, statements: &[Statement]) -> Result<()> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Lowers one statement.
    pub fn compile_statement(&mut self, stmt: &Statement) -> Result<()> {
        match stmt {
            Statement::Expression(stmt) => {
                self.compile_expression(&stmt.expression)?;
                self.codegen.emit_pop();
                Ok(())
            }
            Statement::Block(block) => self.compile_block(block, true),
            Statement::Sub(decl) => self.compile_sub(decl),
            Statement::Return(ret) => self.compile_return(ret),
            Statement::If(stmt) => self.compile_if(stmt),
            Statement::While(stmt) => self.compile_while(stmt),
            Statement::For(stmt) => self.compile_for(stmt),
            Statement::Loop(stmt) => self.compile_loop(stmt),
            Statement::Use(stmt) => {
                self.compile_use(stmt);
                Ok(())
            }
            Statement::Package(decl) => self.compile_package(decl, PackageKind::Package),
            Statement::Module(decl) => self.compile_package(decl, PackageKind::Module),
        }
    }

    /// Lowers a block, in a fresh frame when `create_frame` is set.
    pub fn compile_block(&mut self, block: &Block, create_frame: bool) -> Result<()> {
        if create_frame {
            let mut this = self.enter_frame(FrameKind::Block);
            this.compile_statements(&block.statements)
        } else {
            self.compile_statements(&block.statements)
        }
    }

    /// Lowers `return`, enforcing the enclosing subroutine's return type.
    pub fn compile_return(&mut self, ret: &ReturnStatement) -> Result<()> {
        let Some(value) = &ret.value else {
            self.emit_undef_return(ret.span);
            return Ok(());
        };
        self.compile_expression(value)?;
        let expected = self.frames.return_type();
        self.enforce_type(value, &expected, TypeContext::Return);
        self.codegen.emit_return();
        Ok(())
    }

    /// Lowers if/elsif/else.
    pub fn compile_if(&mut self, stmt: &IfStatement) -> Result<()> {
        let done = self.codegen.create_label();

        for branch in std::iter::once(&stmt.main).chain(&stmt.elsifs) {
            let next = self.codegen.create_label();
            self.compile_expression(&branch.condition)?;
            self.codegen.emit_jump_if_false(next);
            self.compile_block(&branch.body, true)?;
            self.codegen.emit_jump(done);
            self.codegen.mark_label(next)?;
        }

        if let Some(otherwise) = &stmt.otherwise {
            self.compile_block(otherwise, true)?;
        }

        self.codegen.mark_label(done)
    }

    /// Lowers a while loop.
    pub fn compile_while(&mut self, stmt: &WhileStatement) -> Result<()> {
        let done = self.codegen.create_label();
        let top = self.codegen.create_and_mark_label();

        let mut this = self.enter_frame(FrameKind::Loop(LoopControl::While { done, next: top }));
        this.compile_expression(&stmt.condition)?;
        this.codegen.emit_jump_if_false(done);
        this.compile_block(&stmt.body, false)?;
        this.codegen.emit_jump(top);
        this.codegen.mark_label(done)
    }

    /// Lowers a C-style loop.
    pub fn compile_loop(&mut self, stmt: &LoopStatement) -> Result<()> {
        let done = self.codegen.create_label();
        let step = self.codegen.create_label();

        let mut this = self.enter_frame(FrameKind::Loop(LoopControl::CLoop { done, next: step }));
        if let Some(init) = &stmt.init {
            this.compile_expression(init)?;
            this.codegen.emit_pop();
        }

        let top = this.codegen.create_and_mark_label();
        if let Some(condition) = &stmt.condition {
            this.compile_expression(condition)?;
            this.codegen.emit_jump_if_false(done);
        }

        this.compile_block(&stmt.body, true)?;

        this.codegen.mark_label(step)?;
        if let Some(step) = &stmt.step {
            this.compile_expression(step)?;
            this.codegen.emit_pop();
        }
        this.codegen.emit_jump(top);
        this.codegen.mark_label(done)
    }

    /// Lowers a for-each loop.
    pub fn compile_for(&mut self, stmt: &ForStatement) -> Result<()> {
        let index_slot = self.frames.alloc_local()?;
        let loop_slot = self.frames.alloc_local()?;
        let done = self.codegen.create_label();
        let top = self.codegen.create_label();

        self.codegen.emit_push_int(0);
        self.codegen.emit_store(index_slot);
        self.compile_expression(&stmt.iterable)?;
        self.codegen.emit_dup();
        self.codegen.emit_call_builtin(Builtin::Elems, 1);

        let mut this = self.enter_frame(FrameKind::Loop(LoopControl::ForEach {
            done,
            next: top,
            index_slot,
            loop_slot,
        }));
        this.frames.bind(&stmt.variable, loop_slot, TypeInfo::None)?;

        this.codegen.mark_label(top)?;
        this.codegen.emit_load(index_slot);
        this.codegen.emit_dupn(1);
        this.codegen.emit_jge(done);

        this.codegen.emit_dupn(1);
        this.codegen.emit_load(index_slot);
        this.codegen.emit_array_get();
        this.codegen.emit_store(loop_slot);

        this.compile_block(&stmt.body, false)?;

        this.emit_increment(index_slot);
        this.codegen.emit_jump(top);

        this.codegen.mark_label(done)?;
        this.codegen.emit_pop();
        this.codegen.emit_pop();
        Ok(())
    }

    /// `slot += 1`
    pub(crate) fn emit_increment(&mut self, slot: Slot) {
        self.codegen.emit_load(slot);
        self.codegen.emit_push_int(1);
        self.codegen.emit_op(OpCode::Add);
        self.codegen.emit_store(slot);
    }

    /// Records a module dependency. Emits nothing.
    pub fn compile_use(&mut self, stmt: &UseStatement) {
        self.module.add_dependency(&stmt.module);
    }

    /// Lowers a package or module body inside its namespace.
    pub fn compile_package(&mut self, decl: &PackageDeclaration, kind: PackageKind) -> Result<()> {
        let id = self.packages.enter_path(self.package, &decl.name, kind);
        if kind == PackageKind::Module {
            let path = self.packages.path(id);
            self.module.declare_module(path);
        }

        let mut this = self.enter_package(id);
        this.compile_block(&decl.body, true)
    }
}
