// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler options.

use serde::{Deserialize, Serialize};

/// Options controlling a single compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Emit breakpoint markers for `checkpoint(n)` calls
    pub checkpoints: bool,

    /// Maximum number of diagnostics kept per unit (0 = unlimited)
    pub max_errors: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            checkpoints: true,
            max_errors: 0,
        }
    }
}
