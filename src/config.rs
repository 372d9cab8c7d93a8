// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration for the sprig CLI, read from `sprig.toml`.
//!
//! ```toml
//! [compiler]
//! checkpoints = false
//! max_errors = 20
//!
//! [output]
//! listing = true
//! color = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sprig_compiler::CompileOptions;
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "sprig.toml";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Options passed to every compiler instance
    pub compiler: CompileOptions,

    /// Output settings
    pub output: OutputConfig,
}

/// The `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print a disassembly listing of the linked program
    pub listing: bool,

    /// Colorize diagnostics
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            listing: false,
            color: true,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Otherwise `sprig.toml` in the current
    /// directory is tried, then the user config directory; defaults apply
    /// when neither exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for path in search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Reads a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("sprig").join(CONFIG_FILE));
    }
    paths
}
