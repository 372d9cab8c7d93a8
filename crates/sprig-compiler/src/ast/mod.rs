// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for sprig.
//!
//! The tree is produced by the front end and only read by the compiler. It is
//! serde-compatible so that ASTs can be handed over as JSON.

pub mod build;

use serde::{Deserialize, Serialize};

use crate::types::TypeInfo;

/// A source location (1-based line and column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

impl Span {
    /// Creates a span at the given position.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A complete compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The top-level statements
    pub body: Vec<Statement>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Expression evaluated for its side effects
    Expression(ExpressionStatement),
    /// Block `{ ... }`
    Block(Block),
    /// Subroutine declaration
    Sub(SubDeclaration),
    /// Return statement
    Return(ReturnStatement),
    /// if / elsif / else
    If(IfStatement),
    /// while loop
    While(WhileStatement),
    /// for-each loop
    For(ForStatement),
    /// C-style `loop (init; cond; step)`
    Loop(LoopStatement),
    /// `use Module;`
    Use(UseStatement),
    /// `package Name { ... }`
    Package(PackageDeclaration),
    /// `module Name { ... }`
    Module(PackageDeclaration),
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
}

/// A block of statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The statements, in source order
    pub statements: Vec<Statement>,
}

/// A subroutine declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubDeclaration {
    /// Undecorated name
    pub name: String,
    /// Parameter patterns
    pub params: Vec<Parameter>,
    /// Declared return type, `TypeInfo::None` if absent
    #[serde(default)]
    pub return_type: TypeInfo,
    /// Traits such as `is export`
    #[serde(default)]
    pub traits: Vec<String>,
    /// The body
    pub body: Block,
    /// Location of the declaration
    #[serde(default)]
    pub span: Span,
}

/// A subroutine parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Either a variable or a type-annotated variable
    pub pattern: Expression,
    /// `is copy`: the caller's value is duplicated before binding
    #[serde(default)]
    pub copy: bool,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    /// Returned value, if any
    pub value: Option<Expression>,
    /// Location of the statement
    #[serde(default)]
    pub span: Span,
}

/// An if statement with optional elsif and else parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    /// Main condition and body
    pub main: ConditionalBranch,
    /// elsif parts, in source order
    #[serde(default)]
    pub elsifs: Vec<ConditionalBranch>,
    /// else body
    #[serde(default)]
    pub otherwise: Option<Block>,
}

/// A condition and the block it guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    /// Condition
    pub condition: Expression,
    /// Body
    pub body: Block,
}

/// A while loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    /// Condition tested before each iteration
    pub condition: Expression,
    /// Body
    pub body: Block,
}

/// A for-each loop: `for LIST -> $var { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// Loop variable name (with sigil)
    pub variable: String,
    /// Iterated expression
    pub iterable: Expression,
    /// Body
    pub body: Block,
}

/// A C-style loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatement {
    /// Evaluated once before the loop
    pub init: Option<Expression>,
    /// Tested before each iteration
    pub condition: Option<Expression>,
    /// Evaluated after each iteration
    pub step: Option<Expression>,
    /// Body
    pub body: Block,
}

/// A `use` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseStatement {
    /// Module name
    pub module: String,
}

/// A package or module declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDeclaration {
    /// Name, possibly `::`-qualified
    pub name: String,
    /// Body
    pub body: Block,
}

/// An expression with its location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// What kind of expression this is
    pub kind: ExpressionKind,
    /// Location of the expression
    #[serde(default)]
    pub span: Span,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
    /// String literal
    Str(String),
    /// Boolean literal
    Bool(bool),
    /// The undefined value
    Undef,
    /// Variable reference (name includes the sigil)
    Variable(String),
    /// `my [Type] $name`
    Declare {
        /// Variable name
        name: String,
        /// Declared type
        #[serde(default)]
        ty: TypeInfo,
    },
    /// Type-annotated pattern `Type $name`, only valid in parameter lists
    OfType {
        /// The annotation
        ty: TypeInfo,
        /// The annotated expression
        expr: Box<Expression>,
    },
    /// List literal `(a, b, c)`
    List(Vec<Expression>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOperator,
        /// Operand
        operand: Box<Expression>,
    },
    /// Assignment
    Assign {
        /// Variable or declaration being assigned
        target: Box<Expression>,
        /// Assigned value
        value: Box<Expression>,
    },
    /// Element access `@a[i]`
    Index {
        /// Indexed expression
        target: Box<Expression>,
        /// Index
        index: Box<Expression>,
    },
    /// Subroutine call
    Call(SubCall),
}

/// A subroutine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCall {
    /// Called name, possibly `::`-qualified
    pub name: String,
    /// Arguments
    pub args: Vec<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// ~
    Concat,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
}

impl BinaryOperator {
    /// Whether the operator yields a Bool.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanEqual
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// !
    Not,
}
