// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A small reference stack machine for executing compiled programs in tests.

#![allow(dead_code)]

use sprig_compiler::ast::Program;
use sprig_compiler::compiler::{Builtin, Bytecode, CallTarget, Constant, OpCode, Operand};
use sprig_compiler::{Compiler, LinkedProgram, Linker, TypeInfo};

const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undef,
    Int(i64),
    Num(f64),
    Str(String),
    Bool(bool),
    Array(Vec<Value>),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Undef => false,
            Value::Int(n) => *n != 0,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Bool(b) => *b,
            Value::Array(items) => !items.is_empty(),
        }
    }

    fn to_num(&self) -> f64 {
        match self {
            Value::Undef => 0.0,
            Value::Int(n) => *n as f64,
            Value::Num(n) => *n,
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Array(items) => items.len() as f64,
        }
    }

    fn to_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Str(s) => s
                .trim()
                .parse()
                .unwrap_or_else(|_| self.to_num() as i64),
            other => other.to_num() as i64,
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Undef => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Num(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Array(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn coerce(self, ty: &TypeInfo) -> Value {
        match (ty, self) {
            (TypeInfo::None | TypeInfo::Any, value) => value,
            (TypeInfo::Int, value) => Value::Int(value.to_int()),
            (TypeInfo::Num, value) => Value::Num(value.to_num()),
            (TypeInfo::Str, value) => Value::Str(value.render()),
            (TypeInfo::Bool, value) => Value::Bool(value.truthy()),
            (TypeInfo::Array(_), value @ Value::Array(_)) => value,
            (ty, value) => panic!("runtime type error: cannot coerce {:?} to {}", value, ty),
        }
    }
}

struct CallFrame {
    slots: Vec<Value>,
    return_pc: usize,
    base: usize,
}

/// What a run produced.
#[derive(Debug)]
pub struct Run {
    pub output: String,
    /// Execution count per instruction offset
    pub counts: Vec<usize>,
    /// Values left on the stack at `Halt`
    pub stack: Vec<Value>,
}

fn jump_target(operand: &Option<Operand>) -> usize {
    match operand {
        Some(Operand::Jump(target)) => *target,
        other => panic!("expected a resolved jump, got {:?}", other),
    }
}

fn arithmetic(op: OpCode, a: Value, b: Value) -> Value {
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        match op {
            OpCode::Add => return Value::Int(x + y),
            OpCode::Sub => return Value::Int(x - y),
            OpCode::Mul => return Value::Int(x * y),
            OpCode::Mod => return Value::Int(x.rem_euclid(*y)),
            _ => {}
        }
    }
    let (x, y) = (a.to_num(), b.to_num());
    match op {
        OpCode::Add => Value::Num(x + y),
        OpCode::Sub => Value::Num(x - y),
        OpCode::Mul => Value::Num(x * y),
        OpCode::Div => Value::Num(x / y),
        OpCode::Mod => Value::Num(x % y),
        _ => unreachable!(),
    }
}

fn compare(op: OpCode, a: &Value, b: &Value) -> bool {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return match op {
            OpCode::Eq => x == y,
            OpCode::Ne => x != y,
            OpCode::Lt => x < y,
            OpCode::Le => x <= y,
            OpCode::Gt => x > y,
            OpCode::Ge => x >= y,
            _ => unreachable!(),
        };
    }
    let (x, y) = (a.to_num(), b.to_num());
    match op {
        OpCode::Eq => x == y,
        OpCode::Ne => x != y,
        OpCode::Lt => x < y,
        OpCode::Le => x <= y,
        OpCode::Gt => x > y,
        OpCode::Ge => x >= y,
        _ => unreachable!(),
    }
}

fn call_builtin(builtin: Builtin, args: Vec<Value>, output: &mut String) -> Value {
    match builtin {
        Builtin::Print | Builtin::Say => {
            for arg in &args {
                output.push_str(&arg.render());
            }
            if builtin == Builtin::Say {
                output.push('\n');
            }
            Value::Bool(true)
        }
        Builtin::Elems => match args.first() {
            Some(Value::Array(items)) => Value::Int(items.len() as i64),
            Some(Value::Undef) | None => Value::Int(0),
            Some(_) => Value::Int(1),
        },
        Builtin::Push => match args.as_slice() {
            [Value::Array(items), rest @ ..] => {
                let mut items = items.clone();
                items.extend(rest.iter().cloned());
                Value::Array(items)
            }
            _ => Value::Undef,
        },
        Builtin::Pop => match args.first() {
            Some(Value::Array(items)) => items.last().cloned().unwrap_or(Value::Undef),
            _ => Value::Undef,
        },
        Builtin::Shift => match args.first() {
            Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Undef),
            _ => Value::Undef,
        },
        Builtin::Length => Value::Int(
            args.first()
                .map(|v| v.render().chars().count())
                .unwrap_or(0) as i64,
        ),
        Builtin::Substr => {
            let text = args.first().map(Value::render).unwrap_or_default();
            let start = args.get(1).map(Value::to_int).unwrap_or(0).max(0) as usize;
            let len = args
                .get(2)
                .map(|v| v.to_int().max(0) as usize)
                .unwrap_or(usize::MAX);
            Value::Str(text.chars().skip(start).take(len).collect())
        }
    }
}

/// Executes `bytecode` from offset 0 until `Halt`.
pub fn execute(bytecode: &Bytecode) -> Run {
    let code = &bytecode.instructions;
    let mut counts = vec![0; code.len()];
    let mut stack: Vec<Value> = Vec::new();
    let mut frames = vec![CallFrame {
        slots: Vec::new(),
        return_pc: usize::MAX,
        base: 0,
    }];
    let mut output = String::new();
    let mut pc = 0;

    for _ in 0..STEP_LIMIT {
        let inst = &code[pc];
        counts[pc] += 1;
        let mut next = pc + 1;

        match inst.opcode {
            OpCode::LoadConst => match &inst.operand {
                Some(Operand::Constant(idx)) => {
                    stack.push(match &bytecode.constants[*idx as usize] {
                        Constant::Num(n) => Value::Num(*n),
                        Constant::Str(s) => Value::Str(s.clone()),
                    })
                }
                other => panic!("bad LoadConst operand {:?}", other),
            },
            OpCode::PushInt => match inst.operand {
                Some(Operand::Int(n)) => stack.push(Value::Int(n)),
                ref other => panic!("bad PushInt operand {:?}", other),
            },
            OpCode::LoadUndef => stack.push(Value::Undef),
            OpCode::LoadTrue => stack.push(Value::Bool(true)),
            OpCode::LoadFalse => stack.push(Value::Bool(false)),
            OpCode::Pop => {
                stack.pop().unwrap();
            }
            OpCode::Dup => {
                let top = stack.last().unwrap().clone();
                stack.push(top);
            }
            OpCode::DupN => match inst.operand {
                Some(Operand::Count(n)) => {
                    let value = stack[stack.len() - 1 - n as usize].clone();
                    stack.push(value);
                }
                ref other => panic!("bad DupN operand {:?}", other),
            },
            OpCode::Copy => {}
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(arithmetic(inst.opcode, a, b));
            }
            OpCode::Concat => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(Value::Str(a.render() + &b.render()));
            }
            OpCode::Neg => {
                let value = match stack.pop().unwrap() {
                    Value::Int(n) => Value::Int(-n),
                    other => Value::Num(-other.to_num()),
                };
                stack.push(value);
            }
            OpCode::Eq | OpCode::Ne | OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(Value::Bool(compare(inst.opcode, &a, &b)));
            }
            OpCode::Not => {
                let value = stack.pop().unwrap();
                stack.push(Value::Bool(!value.truthy()));
            }
            OpCode::LoadLocal => match inst.operand {
                Some(Operand::Local(slot)) => {
                    let frame = frames.last().unwrap();
                    let value = frame
                        .slots
                        .get(slot as usize)
                        .cloned()
                        .unwrap_or(Value::Undef);
                    stack.push(value);
                }
                ref other => panic!("bad LoadLocal operand {:?}", other),
            },
            OpCode::StoreLocal => match inst.operand {
                Some(Operand::Local(slot)) => {
                    let frame = frames.last_mut().unwrap();
                    let slot = slot as usize;
                    if frame.slots.len() <= slot {
                        frame.slots.resize(slot + 1, Value::Undef);
                    }
                    frame.slots[slot] = stack.pop().unwrap();
                }
                ref other => panic!("bad StoreLocal operand {:?}", other),
            },
            OpCode::Jump => next = jump_target(&inst.operand),
            OpCode::JumpIfFalse => {
                if !stack.pop().unwrap().truthy() {
                    next = jump_target(&inst.operand);
                }
            }
            OpCode::JumpIfGreaterOrEqual => {
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                if a.to_num() >= b.to_num() {
                    next = jump_target(&inst.operand);
                }
            }
            OpCode::Call => match inst.operand {
                Some(Operand::Call { target, argc }) => {
                    let CallTarget::Address(target) = target else {
                        panic!("call to unlinked target {:?} at {}", target, pc);
                    };
                    let slots = (0..argc).map(|_| stack.pop().unwrap()).collect();
                    frames.push(CallFrame {
                        slots,
                        return_pc: pc + 1,
                        base: stack.len(),
                    });
                    next = target;
                }
                ref other => panic!("bad Call operand {:?}", other),
            },
            OpCode::CallBuiltin => match inst.operand {
                Some(Operand::Builtin { builtin, argc }) => {
                    let args = (0..argc).map(|_| stack.pop().unwrap()).collect();
                    let result = call_builtin(builtin, args, &mut output);
                    stack.push(result);
                }
                ref other => panic!("bad CallBuiltin operand {:?}", other),
            },
            OpCode::Return => {
                let value = stack.pop().unwrap();
                let frame = frames.pop().unwrap();
                if frames.is_empty() {
                    return Run {
                        output,
                        counts,
                        stack,
                    };
                }
                stack.truncate(frame.base);
                stack.push(value);
                next = frame.return_pc;
            }
            OpCode::PushFrame => match inst.operand {
                Some(Operand::Frame { params, locals }) => {
                    let frame = frames.last_mut().unwrap();
                    frame.slots.truncate(params as usize);
                    frame
                        .slots
                        .resize((params + locals) as usize, Value::Undef);
                }
                ref other => panic!("bad PushFrame operand {:?}", other),
            },
            OpCode::ToCompatible => match &inst.operand {
                Some(Operand::Type(ty)) => {
                    let value = stack.pop().unwrap().coerce(ty);
                    stack.push(value);
                }
                other => panic!("bad ToCompatible operand {:?}", other),
            },
            OpCode::MakeArgArray => match inst.operand {
                Some(Operand::Count(n)) => {
                    let args = stack[stack.len() - n as usize..]
                        .iter()
                        .rev()
                        .cloned()
                        .collect();
                    stack.push(Value::Array(args));
                }
                ref other => panic!("bad MakeArgArray operand {:?}", other),
            },
            OpCode::BoxArray => match inst.operand {
                Some(Operand::Count(n)) => {
                    let items = stack.split_off(stack.len() - n as usize);
                    stack.push(Value::Array(items));
                }
                ref other => panic!("bad BoxArray operand {:?}", other),
            },
            OpCode::ArrayGet => {
                let index = stack.pop().unwrap().to_int();
                let value = match stack.pop().unwrap() {
                    Value::Array(items) => usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or(Value::Undef),
                    _ => Value::Undef,
                };
                stack.push(value);
            }
            OpCode::Checkpoint => {}
            OpCode::Halt => {
                return Run {
                    output,
                    counts,
                    stack,
                };
            }
        }

        pc = next;
    }

    panic!("step limit exceeded");
}

/// Compiles `program` as unit `main`, links it alone and runs it.
pub fn run(program: &Program) -> Run {
    let linked = link(vec![("main", program)], "main");
    execute(&linked.bytecode)
}

/// Compiles and links several units.
pub fn link(units: Vec<(&str, &Program)>, entry: &str) -> LinkedProgram {
    let mut linker = Linker::new();
    for (name, program) in units {
        linker.add_unit(Compiler::new(name).compile(program).unwrap());
    }
    linker.link(entry).unwrap()
}

/// Offsets of every instruction matching `opcode`.
pub fn positions(bytecode: &Bytecode, opcode: OpCode) -> Vec<usize> {
    bytecode
        .instructions
        .iter()
        .enumerate()
        .filter(|(_, inst)| inst.opcode == opcode)
        .map(|(i, _)| i)
        .collect()
}
