// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compile-time scope frames.
//!
//! Frames live in a single stack and refer to their lexical parent by index.
//! Slots are numbered per subroutine: every frame allocates from the counter
//! of its nearest subroutine frame, arguments first, and a slot is never
//! handed out twice within one subroutine.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::compiler::bytecode::Label;
use crate::types::TypeInfo;
use crate::{Error, Result};

/// A local variable slot index.
pub type Slot = u16;

/// Frame kind without its payload, used for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    /// Subroutine body (or the unit's top level)
    Subroutine,
    /// Free-standing block
    Block,
    /// Loop body
    Loop,
}

/// Jump targets of a loop, by loop flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// `while`: `next` re-tests the condition
    While {
        /// Target of `last`
        done: Label,
        /// Target of `next`
        next: Label,
    },
    /// C-style `loop`: `next` runs the step expression
    CLoop {
        /// Target of `last`
        done: Label,
        /// Target of `next`
        next: Label,
    },
    /// `for`: `next` increments the index, then re-tests
    ForEach {
        /// Target of `last`
        done: Label,
        /// The index comparison
        next: Label,
        /// Hidden index variable
        index_slot: Slot,
        /// The loop variable
        loop_slot: Slot,
    },
}

impl LoopControl {
    /// Target of `last`.
    pub fn done(&self) -> Label {
        match *self {
            LoopControl::While { done, .. }
            | LoopControl::CLoop { done, .. }
            | LoopControl::ForEach { done, .. } => done,
        }
    }

    /// Target of `next`.
    pub fn next(&self) -> Label {
        match *self {
            LoopControl::While { next, .. }
            | LoopControl::CLoop { next, .. }
            | LoopControl::ForEach { next, .. } => next,
        }
    }
}

/// What a frame was pushed for.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// Subroutine with its declared return type
    Subroutine {
        /// `TypeInfo::None` if undeclared
        return_type: TypeInfo,
    },
    /// Block scope
    Block,
    /// Loop scope
    Loop(LoopControl),
}

impl FrameKind {
    /// The payload-free tag.
    pub fn tag(&self) -> FrameTag {
        match self {
            FrameKind::Subroutine { .. } => FrameTag::Subroutine,
            FrameKind::Block => FrameTag::Block,
            FrameKind::Loop(_) => FrameTag::Loop,
        }
    }
}

/// A bound local.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    /// Slot index
    pub slot: Slot,
    /// Declared type, `TypeInfo::None` if untyped
    pub ty: TypeInfo,
}

/// A subroutine argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Name with sigil
    pub name: String,
    /// Declared type
    pub ty: TypeInfo,
}

/// One scope.
#[derive(Debug)]
pub struct Frame {
    /// Kind and loop metadata
    pub kind: FrameKind,
    /// Index of the lexically enclosing frame
    pub parent: Option<usize>,
    locals: FxHashMap<String, LocalVar>,
    args: Vec<Argument>,
    next_slot: u32,
}

impl Frame {
    fn new(kind: FrameKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            parent,
            locals: FxHashMap::default(),
            args: Vec::new(),
            next_slot: 0,
        }
    }

    /// Looks a name up in this frame only.
    pub fn local(&self, name: &str) -> Option<&LocalVar> {
        self.locals.get(name)
    }

    /// Arguments bound so far, in order.
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Loop metadata, if this is a loop frame.
    pub fn loop_control(&self) -> Option<LoopControl> {
        match self.kind {
            FrameKind::Loop(control) => Some(control),
            _ => None,
        }
    }
}

/// The stack of open frames.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a frame whose parent is the current top.
    pub fn push(&mut self, kind: FrameKind) {
        let parent = self.frames.len().checked_sub(1);
        trace!(depth = self.frames.len() + 1, kind = ?kind.tag(), "push frame");
        self.frames.push(Frame::new(kind, parent));
    }

    /// Closes the current top frame.
    pub fn pop(&mut self) -> Result<Frame> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::internal("frame stack underflow"))?;
        trace!(depth = self.frames.len(), kind = ?frame.kind.tag(), "pop frame");
        Ok(frame)
    }

    /// The innermost frame.
    pub fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::internal("no open frame"))
    }

    /// The innermost frame, mutably.
    pub fn top_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::internal("no open frame"))
    }

    fn ancestors(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.frames.len().checked_sub(1), move |&index| {
            self.frames[index].parent
        })
    }

    /// Walks outward from the top to the nearest frame of the given kind.
    pub fn find_enclosing(&self, tag: FrameTag) -> Option<&Frame> {
        self.ancestors()
            .map(|index| &self.frames[index])
            .find(|frame| frame.kind.tag() == tag)
    }

    /// Innermost loop within the current subroutine.
    pub fn innermost_loop(&self) -> Option<LoopControl> {
        for index in self.ancestors() {
            match self.frames[index].kind {
                FrameKind::Loop(control) => return Some(control),
                FrameKind::Subroutine { .. } => return None,
                FrameKind::Block => {}
            }
        }
        None
    }

    /// Declared return type of the innermost subroutine.
    pub fn return_type(&self) -> TypeInfo {
        match self.find_enclosing(FrameTag::Subroutine) {
            Some(Frame {
                kind: FrameKind::Subroutine { return_type },
                ..
            }) => return_type.clone(),
            _ => TypeInfo::None,
        }
    }

    fn subroutine_index(&self) -> Result<usize> {
        self.ancestors()
            .find(|&index| self.frames[index].kind.tag() == FrameTag::Subroutine)
            .ok_or_else(|| Error::internal("no enclosing subroutine frame"))
    }

    fn next_slot(&mut self) -> Result<Slot> {
        let index = self.subroutine_index()?;
        let frame = &mut self.frames[index];
        let slot = Slot::try_from(frame.next_slot)
            .map_err(|_| Error::internal("too many local variables in subroutine"))?;
        frame.next_slot += 1;
        Ok(slot)
    }

    /// Allocates an anonymous slot.
    pub fn alloc_local(&mut self) -> Result<Slot> {
        self.next_slot()
    }

    /// Binds `name` in the top frame, reusing its slot if already bound there.
    pub fn add_local(&mut self, name: &str, ty: TypeInfo) -> Result<Slot> {
        if let Some(local) = self.top()?.local(name) {
            return Ok(local.slot);
        }
        let slot = self.next_slot()?;
        self.bind(name, slot, ty)?;
        Ok(slot)
    }

    /// Binds `name` to an already allocated slot in the top frame.
    pub fn bind(&mut self, name: &str, slot: Slot, ty: TypeInfo) -> Result<()> {
        self.top_mut()?
            .locals
            .insert(name.to_string(), LocalVar { slot, ty });
        Ok(())
    }

    /// Appends an argument to the top frame, which must be a subroutine frame.
    pub fn add_arg(&mut self, name: &str, ty: TypeInfo) -> Result<Slot> {
        if self.top()?.kind.tag() != FrameTag::Subroutine {
            return Err(Error::internal("argument bound outside a subroutine frame"));
        }
        let slot = self.next_slot()?;
        let top = self.top_mut()?;
        top.args.push(Argument {
            name: name.to_string(),
            ty: ty.clone(),
        });
        top.locals.insert(name.to_string(), LocalVar { slot, ty });
        Ok(slot)
    }

    /// Resolves a variable, searching outward up to the nearest subroutine frame.
    pub fn resolve(&self, name: &str) -> Option<&LocalVar> {
        for index in self.ancestors() {
            let frame = &self.frames[index];
            if let Some(local) = frame.local(name) {
                return Some(local);
            }
            if frame.kind.tag() == FrameTag::Subroutine {
                break;
            }
        }
        None
    }
}
