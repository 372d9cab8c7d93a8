// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking compiled units into one program.
//!
//! Units are laid out back to back, entry unit first. Every offset and
//! constant index is relocated, and each placeholder call is patched by
//! looking its name up, in order, among the unit's own subroutines, the
//! exported names, and the exports of the unit's `use`d modules.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::package::PATH_SEPARATOR;
use crate::compiler::{Bytecode, CallTarget, CompiledUnit, Operand};
use crate::error::LinkError;
use crate::{Error, Result};

/// A fully linked program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedProgram {
    /// Combined bytecode; execution starts at offset 0
    pub bytecode: Bytecode,
    /// Start offset of each unit, in layout order
    pub units: Vec<(String, usize)>,
    /// Absolute entry offset of every exported subroutine
    pub exports: BTreeMap<String, usize>,
}

/// Collects units and links them.
#[derive(Debug, Default)]
pub struct Linker {
    units: Vec<CompiledUnit>,
}

impl Linker {
    /// Creates an empty linker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a compiled unit.
    pub fn add_unit(&mut self, unit: CompiledUnit) -> &mut Self {
        self.units.push(unit);
        self
    }

    /// Links every unit, starting execution in `entry`.
    pub fn link(mut self, entry: &str) -> Result<LinkedProgram> {
        let entry_index = self
            .units
            .iter()
            .position(|unit| unit.name == entry)
            .ok_or_else(|| Error::Link(vec![LinkError::MissingEntry(entry.to_string())]))?;
        let entry_unit = self.units.remove(entry_index);
        self.units.insert(0, entry_unit);

        let mut errors = Vec::new();

        // Layout
        let mut bases = Vec::with_capacity(self.units.len());
        let mut constant_bases = Vec::with_capacity(self.units.len());
        let (mut code_len, mut constant_len) = (0usize, 0usize);
        for unit in &self.units {
            bases.push(code_len);
            constant_bases.push(constant_len);
            code_len += unit.bytecode.instructions.len();
            constant_len += unit.bytecode.constants.len();
        }

        // Export table and declared modules
        let mut exports = BTreeMap::new();
        let mut modules = FxHashSet::default();
        for (unit, base) in self.units.iter().zip(&bases) {
            for export in &unit.module.exports {
                if exports
                    .insert(export.name.clone(), base + export.position)
                    .is_some()
                {
                    errors.push(LinkError::DuplicateExport(export.name.clone()));
                }
            }
            modules.extend(unit.module.modules.iter().cloned());
        }

        for unit in &self.units {
            for dependency in &unit.module.dependencies {
                if !modules.contains(dependency) {
                    errors.push(LinkError::MissingModule {
                        unit: unit.name.clone(),
                        module: dependency.clone(),
                    });
                }
            }
        }

        // Relocate and patch
        let mut bytecode = Bytecode::new();
        for (index, unit) in self.units.iter().enumerate() {
            let base = bases[index];
            let constant_base = u16::try_from(constant_bases[index])
                .map_err(|_| Error::internal("too many constants in program"))?;
            let mut instructions = unit.bytecode.instructions.clone();

            for inst in &mut instructions {
                match &mut inst.operand {
                    Some(Operand::Jump(offset)) => *offset += base,
                    Some(Operand::Constant(idx)) => {
                        *idx = idx.checked_add(constant_base).ok_or_else(|| {
                            Error::internal("too many constants in program")
                        })?;
                    }
                    Some(Operand::Call {
                        target: CallTarget::Address(offset),
                        ..
                    }) => *offset += base,
                    _ => {}
                }
            }

            for call in unit.unresolved_uses() {
                let target = unit
                    .subroutines
                    .get(&call.name)
                    .map(|offset| base + offset)
                    .or_else(|| exports.get(&call.name).copied())
                    .or_else(|| {
                        unit.module.dependencies.iter().find_map(|dep| {
                            let qualified = format!("{}{}{}", dep, PATH_SEPARATOR, call.name);
                            exports.get(&qualified).copied()
                        })
                    });

                let Some(target) = target else {
                    errors.push(LinkError::UnresolvedSubroutine {
                        unit: unit.name.clone(),
                        name: call.name.clone(),
                        span: call.span,
                    });
                    continue;
                };

                match instructions.get_mut(call.position).and_then(|i| i.operand.as_mut()) {
                    Some(Operand::Call { target: slot, .. }) => {
                        *slot = CallTarget::Address(target);
                    }
                    _ => {
                        return Err(Error::internal(format!(
                            "no call instruction at offset {} in unit `{}'",
                            call.position, unit.name
                        )));
                    }
                }
                debug!(unit = %unit.name, name = %call.name, target, "patched call");
            }

            bytecode.instructions.extend(instructions);
            bytecode
                .constants
                .extend(unit.bytecode.constants.iter().cloned());
        }

        if !errors.is_empty() {
            return Err(Error::Link(errors));
        }

        debug!(
            units = self.units.len(),
            instructions = bytecode.len(),
            "linked program"
        );

        Ok(LinkedProgram {
            bytecode,
            units: self
                .units
                .iter()
                .zip(bases)
                .map(|(unit, base)| (unit.name.clone(), base))
                .collect(),
            exports,
        })
    }
}
