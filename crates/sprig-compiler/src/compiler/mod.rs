// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler.
//!
//! Lowers a [`Program`] into a [`CompiledUnit`] for the stack VM.
//!
//! # Module Structure
//!
//! - `bytecode`: Bytecode definitions and instructions
//! - `codegen`: Instruction emitter with labels
//! - `frame`: Compile-time scope frames
//! - `package`: Package tree and subroutine signatures
//! - `module`: Dependencies and exports of a unit
//! - `statements`, `subroutine`, `expressions`: lowering of each AST kind

pub mod bytecode;
pub mod codegen;
pub mod frame;
mod locals;
pub mod module;
pub mod package;

mod expressions;
mod statements;
mod subroutine;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use bytecode::{Builtin, Bytecode, CallTarget, Constant, Instruction, Label, OpCode, Operand};
pub use codegen::CodeGen;
pub use frame::{FrameKind, FrameStack, FrameTag, LoopControl, Slot};
pub use module::{Export, ModuleInfo};
pub use package::{PackageId, PackageKind, PackageTree, SubParam, SubroutineInfo};

use crate::ast::{Program, Span, Statement};
use crate::config::CompileOptions;
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::types::TypeInfo;
use crate::{Error, Result};

/// A call site recorded for the linking stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubroutineUse {
    /// Absolute name if resolved locally, otherwise the name as written
    pub name: String,
    /// Location of the call
    pub span: Span,
    /// Offset of the call instruction
    pub position: usize,
    /// Whether the target lives in this unit
    pub resolved: bool,
}

/// The output of compiling one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Unit name
    pub name: String,
    /// Finished bytecode with local labels resolved
    pub bytecode: Bytecode,
    /// Every non-builtin call, in emission order
    pub uses: Vec<SubroutineUse>,
    /// Entry offset of every subroutine emitted, by absolute name
    pub subroutines: BTreeMap<String, usize>,
    /// Dependencies, exports and declared modules
    pub module: ModuleInfo,
}

impl CompiledUnit {
    /// Call sites left for the linker to patch.
    pub fn unresolved_uses(&self) -> impl Iterator<Item = &SubroutineUse> {
        self.uses.iter().filter(|u| !u.resolved)
    }
}

/// Compiles AST to bytecode.
pub struct Compiler {
    name: String,
    codegen: CodeGen,
    frames: FrameStack,
    packages: PackageTree,
    package: PackageId,
    module: ModuleInfo,
    diagnostics: Diagnostics,
    uses: Vec<SubroutineUse>,
    options: CompileOptions,
}

impl Compiler {
    /// Creates a compiler for the unit `name` with default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, CompileOptions::default())
    }

    /// Creates a compiler with explicit options.
    pub fn with_options(name: impl Into<String>, options: CompileOptions) -> Self {
        Self {
            name: name.into(),
            codegen: CodeGen::new(),
            frames: FrameStack::new(),
            packages: PackageTree::new(),
            package: PackageTree::ROOT,
            module: ModuleInfo::default(),
            diagnostics: Diagnostics::with_limit(options.max_errors),
            uses: Vec::new(),
            options,
        }
    }

    /// Compiles a whole program.
    pub fn compile(mut self, program: &Program) -> Result<CompiledUnit> {
        self.lower(program)?;
        self.finish()
    }

    /// Lowers `program` into the unit's bytecode.
    ///
    /// User errors are collected rather than returned; only internal errors
    /// abort. Call [`Compiler::finish`] afterwards.
    pub fn lower(&mut self, program: &Program) -> Result<()> {
        self.declare_signatures(&program.body, PackageTree::ROOT);

        let locals = slot_count(locals::count_locals_needed(&program.body))?;
        let mut this = self.enter_frame(FrameKind::Subroutine {
            return_type: TypeInfo::None,
        });
        this.codegen.emit_push_frame(0, locals);
        this.compile_statements(&program.body)?;
        this.codegen.emit_halt();
        Ok(())
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Produces the compiled unit, or every recorded diagnostic.
    pub fn finish(self) -> Result<CompiledUnit> {
        if !self.diagnostics.is_empty() {
            return Err(Error::Compile(self.diagnostics.into_vec()));
        }

        let mut subroutines = BTreeMap::new();
        for (package, info) in self.packages.iter_subroutines() {
            if !info.marked {
                continue;
            }
            let position = self.codegen.label_position(info.label).ok_or_else(|| {
                Error::internal(format!("subroutine `{}' has no entry point", info.name))
            })?;
            subroutines.insert(self.packages.qualify(package, &info.name), position);
        }

        let bytecode = self.codegen.finish()?;
        debug!(
            unit = %self.name,
            instructions = bytecode.len(),
            uses = self.uses.len(),
            "compiled unit"
        );

        Ok(CompiledUnit {
            name: self.name,
            bytecode,
            uses: self.uses,
            subroutines,
            module: self.module,
        })
    }

    /// Registers every subroutine signature ahead of lowering so that calls
    /// can be checked and addressed by label regardless of source order.
    fn declare_signatures(&mut self, statements: &[Statement], package: PackageId) {
        for stmt in statements {
            match stmt {
                Statement::Sub(decl) => {
                    let params: Option<Vec<SubParam>> = decl
                        .params
                        .iter()
                        .map(|param| subroutine::parse_param(param).ok())
                        .collect();
                    let info = self
                        .packages
                        .get_or_create_sub(package, &decl.name, &mut self.codegen);
                    if let (Some(params), false) = (params, info.declared) {
                        info.declared = true;
                        info.params = params;
                        info.return_type = decl.return_type.clone();
                        info.uses_arg_list = locals::uses_arg_list(&decl.body.statements);
                    }
                    self.declare_signatures(&decl.body.statements, package);
                }
                Statement::Package(decl) | Statement::Module(decl) => {
                    let kind = match stmt {
                        Statement::Module(_) => PackageKind::Module,
                        _ => PackageKind::Package,
                    };
                    let id = self.packages.enter_path(package, &decl.name, kind);
                    self.declare_signatures(&decl.body.statements, id);
                }
                Statement::Block(block) => self.declare_signatures(&block.statements, package),
                Statement::If(stmt) => {
                    for branch in std::iter::once(&stmt.main).chain(&stmt.elsifs) {
                        self.declare_signatures(&branch.body.statements, package);
                    }
                    if let Some(otherwise) = &stmt.otherwise {
                        self.declare_signatures(&otherwise.statements, package);
                    }
                }
                Statement::While(stmt) => self.declare_signatures(&stmt.body.statements, package),
                Statement::For(stmt) => self.declare_signatures(&stmt.body.statements, package),
                Statement::Loop(stmt) => self.declare_signatures(&stmt.body.statements, package),
                Statement::Expression(_) | Statement::Return(_) | Statement::Use(_) => {}
            }
        }
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.diagnostics.error(kind, message, span);
    }

    /// Opens a frame that is closed when the guard is dropped.
    fn enter_frame(&mut self, kind: FrameKind) -> FrameGuard<'_> {
        self.frames.push(kind);
        FrameGuard { compiler: self }
    }

    /// Makes `package` current until the guard is dropped.
    fn enter_package(&mut self, package: PackageId) -> PackageGuard<'_> {
        let saved = std::mem::replace(&mut self.package, package);
        trace!(package = %self.packages.path(package), "enter package");
        PackageGuard {
            compiler: self,
            saved,
        }
    }
}

fn slot_count(count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| Error::internal("too many local variables in subroutine"))
}

struct FrameGuard<'a> {
    compiler: &'a mut Compiler,
}

impl Deref for FrameGuard<'_> {
    type Target = Compiler;

    fn deref(&self) -> &Compiler {
        self.compiler
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Compiler {
        self.compiler
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let _ = self.compiler.frames.pop();
    }
}

struct PackageGuard<'a> {
    compiler: &'a mut Compiler,
    saved: PackageId,
}

impl Deref for PackageGuard<'_> {
    type Target = Compiler;

    fn deref(&self) -> &Compiler {
        self.compiler
    }
}

impl DerefMut for PackageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Compiler {
        self.compiler
    }
}

impl Drop for PackageGuard<'_> {
    fn drop(&mut self) {
        trace!(package = %self.compiler.packages.path(self.saved), "leave package");
        self.compiler.package = self.saved;
    }
}
