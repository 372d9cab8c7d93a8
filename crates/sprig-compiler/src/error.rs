// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error and diagnostic types for the compiler.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::ast::Span;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a compilation or a link.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more user-facing diagnostics were recorded
    #[error("compilation failed with {} error(s)", .0.len())]
    Compile(Vec<Diagnostic>),

    /// A compiler-internal contract was violated
    #[error("internal compiler error: {0}")]
    Internal(String),

    /// The linking stage could not produce a program
    #[error("linking failed with {} error(s)", .0.len())]
    Link(Vec<LinkError>),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The diagnostics carried by a failed compilation, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compile(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

/// Errors reported by the linking stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// A call site names a subroutine no unit defines or exports
    #[error("{}:{}: call to undeclared subroutine `{name}' in unit `{unit}'", .span.line, .span.column)]
    UnresolvedSubroutine {
        /// Unit containing the call
        unit: String,
        /// Name as recorded at the call site
        name: String,
        /// Location of the call
        span: Span,
    },

    /// A `use` names a module that none of the linked units declares
    #[error("unit `{unit}' depends on missing module `{module}'")]
    MissingModule {
        /// Unit declaring the dependency
        unit: String,
        /// Module that could not be found
        module: String,
    },

    /// Two units export the same fully qualified name
    #[error("subroutine `{0}' is exported more than once")]
    DuplicateExport(String),

    /// The requested entry unit was never added to the linker
    #[error("entry unit `{0}' not found")]
    MissingEntry(String),
}

/// The category of a user-facing compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A subroutine already emitted is declared again
    Redeclaration,
    /// Fewer arguments than required parameters, or arguments to `last`/`next`
    Arity,
    /// A statically deduced type is incompatible with the declared one
    TypeMismatch,
    /// `last`/`next` outside a loop, or a construct used where it is not allowed
    InvalidContext,
    /// Unknown trait, or `export` outside a module
    InvalidTrait,
    /// A parameter pattern that is not a (typed) identifier
    MalformedParameter,
    /// A variable read or assigned before any declaration
    UndeclaredVariable,
    /// A special call received an argument of the wrong shape
    InvalidArgument,
}

/// A single compile error with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error category
    pub kind: DiagnosticKind,
    /// Human readable message
    pub message: String,
    /// Where the offending construct starts
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: error: {}",
            self.span.line, self.span.column, self.message
        )
    }
}

/// Collects diagnostics without interrupting compilation of sibling constructs.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    limit: usize,
    dropped: usize,
}

impl Diagnostics {
    /// Creates a sink keeping at most `limit` diagnostics (0 keeps everything).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    /// Records an error.
    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        if self.limit != 0 && self.items.len() >= self.limit {
            if self.dropped == 0 {
                warn!("error limit of {} reached, further errors suppressed", self.limit);
            }
            self.dropped += 1;
            return;
        }
        self.items.push(Diagnostic {
            kind,
            message: message.into(),
            span,
        });
    }

    /// Whether no error has been recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.dropped == 0
    }

    /// Recorded diagnostics, in the order they were reported.
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Number of diagnostics suppressed by the limit.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Consumes the sink, returning the recorded diagnostics.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
