// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TypeInfo;
use crate::{Error, Result};

/// An abstract jump target, bound to an instruction offset once marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label(pub(crate) u32);

/// A compiled bytecode chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Constant>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant and returns its index.
    pub fn add_constant(&mut self, value: Constant) -> Result<u16> {
        if let Some(index) = self.constants.iter().position(|c| *c == value) {
            return Ok(index as u16);
        }
        let index = u16::try_from(self.constants.len())
            .map_err(|_| Error::internal("too many constants in compilation unit"))?;
        self.constants.push(value);
        Ok(index)
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether no instruction has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Counts instructions with the given opcode.
    pub fn count(&self, opcode: OpCode) -> usize {
        self.instructions
            .iter()
            .filter(|inst| inst.opcode == opcode)
            .count()
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, inst) in self.instructions.iter().enumerate() {
            write!(f, "{:05}  {}", offset, inst)?;
            if let (OpCode::LoadConst, Some(Operand::Constant(idx))) = (inst.opcode, &inst.operand)
            {
                if let Some(constant) = self.constants.get(*idx as usize) {
                    write!(f, "  ; {}", constant)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// Floating point number
    Num(f64),
    /// String
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Num(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{:?} {}", self.opcode, operand),
            None => write!(f, "{:?}", self.opcode),
        }
    }
}

/// Where a call instruction transfers control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTarget {
    /// Entry label of a subroutine in the same unit
    Label(Label),
    /// Resolved instruction offset
    Address(usize),
    /// Placeholder patched by the linker
    Unresolved,
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Constant pool index
    Constant(u16),
    /// Immediate integer
    Int(i64),
    /// Local variable slot
    Local(u16),
    /// Element or value count
    Count(u16),
    /// Unresolved jump target
    Label(Label),
    /// Resolved jump target
    Jump(usize),
    /// Call target and argument count
    Call {
        /// Target
        target: CallTarget,
        /// Number of values passed
        argc: u8,
    },
    /// Builtin and argument count
    Builtin {
        /// Which builtin
        builtin: Builtin,
        /// Number of values passed
        argc: u8,
    },
    /// Frame reservation
    Frame {
        /// Argument slots bound by the call
        params: u16,
        /// Additional local slots
        locals: u16,
    },
    /// Type for a runtime coercion
    Type(TypeInfo),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(idx) => write!(f, "#{}", idx),
            Operand::Int(value) => write!(f, "{}", value),
            Operand::Local(slot) => write!(f, "${}", slot),
            Operand::Count(count) => write!(f, "{}", count),
            Operand::Label(label) => write!(f, "L{}", label.0),
            Operand::Jump(offset) => write!(f, "@{:05}", offset),
            Operand::Call { target, argc } => match target {
                CallTarget::Label(label) => write!(f, "L{} ({} args)", label.0, argc),
                CallTarget::Address(offset) => write!(f, "@{:05} ({} args)", offset, argc),
                CallTarget::Unresolved => write!(f, "<unresolved> ({} args)", argc),
            },
            Operand::Builtin { builtin, argc } => write!(f, "{} ({} args)", builtin, argc),
            Operand::Frame { params, locals } => {
                write!(f, "{} params, {} locals", params, locals)
            }
            Operand::Type(ty) => write!(f, "{}", ty),
        }
    }
}

/// Subroutines implemented by the VM itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    /// print
    Print,
    /// say
    Say,
    /// elems
    Elems,
    /// push
    Push,
    /// pop
    Pop,
    /// shift
    Shift,
    /// substr
    Substr,
    /// length
    Length,
}

impl Builtin {
    /// Looks up a builtin by its source name.
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "print" => Builtin::Print,
            "say" => Builtin::Say,
            "elems" => Builtin::Elems,
            "push" => Builtin::Push,
            "pop" => Builtin::Pop,
            "shift" => Builtin::Shift,
            "substr" => Builtin::Substr,
            "length" => Builtin::Length,
            _ => return None,
        };
        Some(builtin)
    }

    /// The source name.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Say => "say",
            Builtin::Elems => "elems",
            Builtin::Push => "push",
            Builtin::Pop => "pop",
            Builtin::Shift => "shift",
            Builtin::Substr => "substr",
            Builtin::Length => "length",
        }
    }

    /// Statically known result type.
    pub fn result_type(self) -> TypeInfo {
        match self {
            Builtin::Elems | Builtin::Length => TypeInfo::Int,
            Builtin::Substr => TypeInfo::Str,
            Builtin::Print | Builtin::Say => TypeInfo::Bool,
            Builtin::Push | Builtin::Pop | Builtin::Shift => TypeInfo::None,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push a constant onto the stack
    LoadConst,
    /// Push an immediate integer
    PushInt,
    /// Push undef
    LoadUndef,
    /// Push True
    LoadTrue,
    /// Push False
    LoadFalse,
    /// Pop the top value
    Pop,
    /// Duplicate the top value
    Dup,
    /// Push a copy of the value `n` entries below the top
    DupN,
    /// Replace the top value with a deep copy
    Copy,

    // Arithmetic operations
    /// Add top two values
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// String concatenation
    Concat,
    /// Negate (unary minus)
    Neg,

    // Comparison operations
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Logical operations
    /// Logical NOT
    Not,

    // Variable operations
    /// Load a local variable
    LoadLocal,
    /// Pop into a local variable
    StoreLocal,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop and jump if false
    JumpIfFalse,
    /// Pop `b`, pop `a`, jump if `a >= b`
    JumpIfGreaterOrEqual,

    // Subroutines
    /// Call a subroutine
    Call,
    /// Call a builtin
    CallBuiltin,
    /// Return from a subroutine
    Return,
    /// Reserve the slots of a subroutine frame
    PushFrame,
    /// Coerce the top value to a type or fail at run time
    ToCompatible,
    /// Push an array holding copies of the top `n` values
    MakeArgArray,

    // Arrays
    /// Pop `n` values into an array
    BoxArray,
    /// Pop index and array, push the element
    ArrayGet,

    // Special
    /// Debugger breakpoint marker
    Checkpoint,
    /// Halt execution
    Halt,
}
