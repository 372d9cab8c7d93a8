// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # sprig-compiler
//!
//! Bytecode backend for the sprig scripting language.
//!
//! ## Overview
//!
//! This crate lowers a parsed AST into linear bytecode for a stack VM:
//! - Scope frames with per-subroutine slot allocation
//! - Package and module namespaces with outward name resolution
//! - Best-effort static typing with runtime coercion as fallback
//! - Label-patched control flow for if/while/loop/for
//! - A linking stage that resolves calls across units
//!
//! ## Quick Start
//!
//! ```rust
//! use sprig_compiler::ast::build::*;
//! use sprig_compiler::{Compiler, Linker};
//!
//! let program = program(vec![expr(call("say", vec![string("hello")]))]);
//! let unit = Compiler::new("main").compile(&program).unwrap();
//!
//! let mut linker = Linker::new();
//! linker.add_unit(unit);
//! let linked = linker.link("main").unwrap();
//! println!("{}", linked.bytecode);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod link;
pub mod types;

pub use compiler::{CompiledUnit, Compiler, SubroutineUse};
pub use config::CompileOptions;
pub use error::{Diagnostic, DiagnosticKind, Error, LinkError, Result};
pub use link::{LinkedProgram, Linker};
pub use types::{Compatibility, TypeInfo};
