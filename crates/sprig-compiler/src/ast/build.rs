// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shorthand constructors for building ASTs by hand.
//!
//! ```rust
//! use sprig_compiler::ast::build::*;
//!
//! // say $x for (1, 2, 3)
//! let stmt = for_each("$x", list(vec![int(1), int(2), int(3)]), vec![
//!     expr(call("say", vec![var("$x")])),
//! ]);
//! ```

#![allow(missing_docs)]

use super::*;

impl Expression {
    /// Creates an expression without location.
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    /// Sets the location.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

impl SubDeclaration {
    /// Sets the declared return type.
    pub fn returns(mut self, ty: TypeInfo) -> Self {
        self.return_type = ty;
        self
    }

    /// Adds a trait such as `export`.
    pub fn with_trait(mut self, name: &str) -> Self {
        self.traits.push(name.to_string());
        self
    }

    /// Sets the location.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

pub fn program(body: Vec<Statement>) -> Program {
    Program { body }
}

pub fn int(value: i64) -> Expression {
    Expression::new(ExpressionKind::Integer(value))
}

pub fn float(value: f64) -> Expression {
    Expression::new(ExpressionKind::Float(value))
}

pub fn string(value: &str) -> Expression {
    Expression::new(ExpressionKind::Str(value.to_string()))
}

pub fn boolean(value: bool) -> Expression {
    Expression::new(ExpressionKind::Bool(value))
}

pub fn undef() -> Expression {
    Expression::new(ExpressionKind::Undef)
}

pub fn var(name: &str) -> Expression {
    Expression::new(ExpressionKind::Variable(name.to_string()))
}

/// `my $name`
pub fn my(name: &str) -> Expression {
    my_typed(name, TypeInfo::None)
}

/// `my Type $name`
pub fn my_typed(name: &str, ty: TypeInfo) -> Expression {
    Expression::new(ExpressionKind::Declare {
        name: name.to_string(),
        ty,
    })
}

/// `Type $name`
pub fn of_type(ty: TypeInfo, expr: Expression) -> Expression {
    Expression::new(ExpressionKind::OfType {
        ty,
        expr: Box::new(expr),
    })
}

pub fn list(items: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::List(items))
}

pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::new(ExpressionKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unary(op: UnaryOperator, operand: Expression) -> Expression {
    Expression::new(ExpressionKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn assign(target: Expression, value: Expression) -> Expression {
    Expression::new(ExpressionKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

pub fn index(target: Expression, idx: Expression) -> Expression {
    Expression::new(ExpressionKind::Index {
        target: Box::new(target),
        index: Box::new(idx),
    })
}

pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::Call(SubCall {
        name: name.to_string(),
        args,
    }))
}

pub fn expr(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement { expression })
}

pub fn block(statements: Vec<Statement>) -> Block {
    Block { statements }
}

pub fn block_stmt(statements: Vec<Statement>) -> Statement {
    Statement::Block(block(statements))
}

/// A plain `$name` parameter.
pub fn param(name: &str) -> Parameter {
    Parameter {
        pattern: var(name),
        copy: false,
    }
}

/// A `Type $name` parameter.
pub fn typed_param(ty: TypeInfo, name: &str) -> Parameter {
    Parameter {
        pattern: of_type(ty, var(name)),
        copy: false,
    }
}

pub fn sub(name: &str, params: Vec<Parameter>, body: Vec<Statement>) -> SubDeclaration {
    SubDeclaration {
        name: name.to_string(),
        params,
        return_type: TypeInfo::None,
        traits: Vec::new(),
        body: block(body),
        span: Span::default(),
    }
}

pub fn sub_stmt(decl: SubDeclaration) -> Statement {
    Statement::Sub(decl)
}

pub fn ret(value: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        value,
        span: Span::default(),
    })
}

pub fn if_else(
    condition: Expression,
    body: Vec<Statement>,
    elsifs: Vec<(Expression, Vec<Statement>)>,
    otherwise: Option<Vec<Statement>>,
) -> Statement {
    Statement::If(IfStatement {
        main: ConditionalBranch {
            condition,
            body: block(body),
        },
        elsifs: elsifs
            .into_iter()
            .map(|(condition, body)| ConditionalBranch {
                condition,
                body: block(body),
            })
            .collect(),
        otherwise: otherwise.map(block),
    })
}

pub fn while_loop(condition: Expression, body: Vec<Statement>) -> Statement {
    Statement::While(WhileStatement {
        condition,
        body: block(body),
    })
}

pub fn for_each(variable: &str, iterable: Expression, body: Vec<Statement>) -> Statement {
    Statement::For(ForStatement {
        variable: variable.to_string(),
        iterable,
        body: block(body),
    })
}

pub fn c_loop(
    init: Option<Expression>,
    condition: Option<Expression>,
    step: Option<Expression>,
    body: Vec<Statement>,
) -> Statement {
    Statement::Loop(LoopStatement {
        init,
        condition,
        step,
        body: block(body),
    })
}

pub fn use_module(module: &str) -> Statement {
    Statement::Use(UseStatement {
        module: module.to_string(),
    })
}

pub fn package(name: &str, body: Vec<Statement>) -> Statement {
    Statement::Package(PackageDeclaration {
        name: name.to_string(),
        body: block(body),
    })
}

pub fn module(name: &str, body: Vec<Statement>) -> Statement {
    Statement::Module(PackageDeclaration {
        name: name.to_string(),
        body: block(body),
    })
}
