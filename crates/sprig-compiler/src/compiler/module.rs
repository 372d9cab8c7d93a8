// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-unit module registry: dependencies and exports.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// An exported subroutine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Fully qualified name
    pub name: String,
    /// Entry offset within the unit
    pub position: usize,
}

/// What a unit provides to and requires from other units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Modules named by `use`, in first-seen order
    pub dependencies: Vec<String>,
    /// Subroutines registered with `is export`
    pub exports: Vec<Export>,
    /// Absolute paths of the modules this unit declares
    pub modules: Vec<String>,
}

impl ModuleInfo {
    /// Records a dependency on `name`.
    pub fn add_dependency(&mut self, name: &str) {
        if !self.dependencies.iter().any(|dep| dep == name) {
            debug!(module = name, "add dependency");
            self.dependencies.push(name.to_string());
        }
    }

    /// Registers an exported subroutine.
    pub fn export_sub(&mut self, name: String, position: usize) {
        debug!(%name, position, "export subroutine");
        self.exports.push(Export { name, position });
    }

    /// Records that this unit declares module `path`.
    pub fn declare_module(&mut self, path: String) {
        if !self.modules.contains(&path) {
            self.modules.push(path);
        }
    }

    /// Looks an export up by fully qualified name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }
}
