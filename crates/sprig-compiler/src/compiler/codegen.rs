// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Instruction emitter with label management.
//!
//! Jumps and calls are emitted against [`Label`]s. A label is bound to the
//! current output position with [`CodeGen::mark_label`] and every reference
//! is rewritten to a concrete offset by [`CodeGen::finish`].

use crate::compiler::bytecode::{
    Builtin, Bytecode, CallTarget, Constant, Instruction, Label, OpCode, Operand,
};
use crate::types::TypeInfo;
use crate::{Error, Result};

/// Low-level bytecode sink.
#[derive(Debug, Default)]
pub struct CodeGen {
    bytecode: Bytecode,
    labels: Vec<Option<usize>>,
}

impl CodeGen {
    /// Creates an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next emitted instruction.
    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Allocates an unbound label.
    pub fn create_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Binds `label` to the current position.
    pub fn mark_label(&mut self, label: Label) -> Result<()> {
        let position = self.position();
        match self.labels.get_mut(label.0 as usize) {
            Some(slot @ None) => {
                *slot = Some(position);
                Ok(())
            }
            Some(Some(_)) => Err(Error::internal(format!("label L{} marked twice", label.0))),
            None => Err(Error::internal(format!("unknown label L{}", label.0))),
        }
    }

    /// Allocates a label bound to the current position.
    pub fn create_and_mark_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(Some(self.position()));
        label
    }

    /// Offset a label is bound to, if it has been marked.
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0 as usize).copied().flatten()
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Appends a raw instruction.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.bytecode.emit(instruction)
    }

    fn op(&mut self, opcode: OpCode) -> usize {
        self.emit(Instruction::simple(opcode))
    }

    fn op_with(&mut self, opcode: OpCode, operand: Operand) -> usize {
        self.emit(Instruction::with_operand(opcode, operand))
    }

    /// Emits a bare opcode such as an arithmetic or comparison primitive.
    pub fn emit_op(&mut self, opcode: OpCode) -> usize {
        self.op(opcode)
    }

    /// Pushes an integer.
    pub fn emit_push_int(&mut self, value: i64) -> usize {
        self.op_with(OpCode::PushInt, Operand::Int(value))
    }

    /// Pushes a floating point number.
    pub fn emit_push_num(&mut self, value: f64) -> Result<usize> {
        let index = self.bytecode.add_constant(Constant::Num(value))?;
        Ok(self.op_with(OpCode::LoadConst, Operand::Constant(index)))
    }

    /// Pushes a string.
    pub fn emit_push_str(&mut self, value: &str) -> Result<usize> {
        let index = self.bytecode.add_constant(Constant::Str(value.to_string()))?;
        Ok(self.op_with(OpCode::LoadConst, Operand::Constant(index)))
    }

    /// Pushes a boolean.
    pub fn emit_push_bool(&mut self, value: bool) -> usize {
        self.op(if value {
            OpCode::LoadTrue
        } else {
            OpCode::LoadFalse
        })
    }

    /// Pushes undef.
    pub fn emit_push_undef(&mut self) -> usize {
        self.op(OpCode::LoadUndef)
    }

    /// Discards the top value.
    pub fn emit_pop(&mut self) -> usize {
        self.op(OpCode::Pop)
    }

    /// Duplicates the top value.
    pub fn emit_dup(&mut self) -> usize {
        self.op(OpCode::Dup)
    }

    /// Pushes a copy of the value `depth` entries below the top.
    pub fn emit_dupn(&mut self, depth: u16) -> usize {
        self.op_with(OpCode::DupN, Operand::Count(depth))
    }

    /// Replaces the top value with a deep copy.
    pub fn emit_copy(&mut self) -> usize {
        self.op(OpCode::Copy)
    }

    /// Pushes a local.
    pub fn emit_load(&mut self, slot: u16) -> usize {
        self.op_with(OpCode::LoadLocal, Operand::Local(slot))
    }

    /// Pops into a local.
    pub fn emit_store(&mut self, slot: u16) -> usize {
        self.op_with(OpCode::StoreLocal, Operand::Local(slot))
    }

    /// Unconditional jump.
    pub fn emit_jump(&mut self, label: Label) -> usize {
        self.op_with(OpCode::Jump, Operand::Label(label))
    }

    /// Pops a value and jumps if it is false.
    pub fn emit_jump_if_false(&mut self, label: Label) -> usize {
        self.op_with(OpCode::JumpIfFalse, Operand::Label(label))
    }

    /// Pops two values and jumps if the lower is greater or equal to the upper.
    pub fn emit_jge(&mut self, label: Label) -> usize {
        self.op_with(OpCode::JumpIfGreaterOrEqual, Operand::Label(label))
    }

    /// Calls a subroutine of this unit.
    pub fn emit_call(&mut self, label: Label, argc: u8) -> usize {
        self.op_with(
            OpCode::Call,
            Operand::Call {
                target: CallTarget::Label(label),
                argc,
            },
        )
    }

    /// Emits a call whose target is filled in by the linker.
    pub fn emit_placeholder_call(&mut self, argc: u8) -> usize {
        self.op_with(
            OpCode::Call,
            Operand::Call {
                target: CallTarget::Unresolved,
                argc,
            },
        )
    }

    /// Calls a builtin.
    pub fn emit_call_builtin(&mut self, builtin: Builtin, argc: u8) -> usize {
        self.op_with(OpCode::CallBuiltin, Operand::Builtin { builtin, argc })
    }

    /// Returns the top value to the caller.
    pub fn emit_return(&mut self) -> usize {
        self.op(OpCode::Return)
    }

    /// Reserves the slots of a subroutine frame.
    pub fn emit_push_frame(&mut self, params: u16, locals: u16) -> usize {
        self.op_with(OpCode::PushFrame, Operand::Frame { params, locals })
    }

    /// Coerces the top value to `ty` at run time.
    pub fn emit_to_compatible(&mut self, ty: &TypeInfo) -> usize {
        self.op_with(OpCode::ToCompatible, Operand::Type(ty.clone()))
    }

    /// Builds an array from the top `count` values.
    pub fn emit_box_array(&mut self, count: u16) -> usize {
        self.op_with(OpCode::BoxArray, Operand::Count(count))
    }

    /// Pops index and array, pushes the element.
    pub fn emit_array_get(&mut self) -> usize {
        self.op(OpCode::ArrayGet)
    }

    /// Builds the `@_` array from the top `count` values, leaving them in place.
    pub fn emit_make_arg_array(&mut self, count: u16) -> usize {
        self.op_with(OpCode::MakeArgArray, Operand::Count(count))
    }

    /// Embeds a breakpoint marker.
    pub fn emit_checkpoint(&mut self, id: i64) -> usize {
        self.op_with(OpCode::Checkpoint, Operand::Int(id))
    }

    /// Stops the VM.
    pub fn emit_halt(&mut self) -> usize {
        self.op(OpCode::Halt)
    }

    // ========================================================================
    // Raw buffer access
    // ========================================================================

    /// The instructions emitted so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.bytecode.instructions
    }

    /// Mutable access to an already emitted instruction.
    pub fn instruction_mut(&mut self, position: usize) -> Result<&mut Instruction> {
        self.bytecode
            .instructions
            .get_mut(position)
            .ok_or_else(|| Error::internal(format!("no instruction at offset {}", position)))
    }

    /// Resolves every label reference and returns the finished chunk.
    pub fn finish(self) -> Result<Bytecode> {
        let CodeGen {
            mut bytecode,
            labels,
        } = self;
        let resolve = |label: Label| {
            labels
                .get(label.0 as usize)
                .copied()
                .flatten()
                .ok_or_else(|| Error::internal(format!("label L{} was never marked", label.0)))
        };

        for inst in &mut bytecode.instructions {
            match &mut inst.operand {
                Some(Operand::Label(label)) => {
                    let offset = resolve(*label)?;
                    inst.operand = Some(Operand::Jump(offset));
                }
                Some(Operand::Call { target, .. }) => {
                    if let CallTarget::Label(label) = *target {
                        *target = CallTarget::Address(resolve(label)?);
                    }
                }
                _ => {}
            }
        }

        Ok(bytecode)
    }
}
