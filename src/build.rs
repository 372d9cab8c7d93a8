// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `build` command: compile AST files in parallel, then link them.

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use sprig_compiler::ast::Program;
use sprig_compiler::{CompileOptions, CompiledUnit, Compiler, Error, LinkedProgram, Linker};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings for one build, after merging flags and config.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub inputs: Vec<PathBuf>,
    pub entry: Option<String>,
    pub output: Option<PathBuf>,
    pub listing: bool,
    pub color: bool,
    pub options: CompileOptions,
}

/// Unit name for an input file: its file stem.
pub fn unit_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_program(path: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("invalid AST in {}", path.display()))
}

fn compile_file(
    path: &Path,
    options: &CompileOptions,
) -> Result<(PathBuf, sprig_compiler::Result<CompiledUnit>)> {
    let program = read_program(path)?;
    let name = unit_name(path);
    debug!(unit = %name, "compiling");
    let result = Compiler::with_options(name, options.clone()).compile(&program);
    Ok((path.to_path_buf(), result))
}

fn error_label(color: bool) -> String {
    if color {
        "error".red().bold().to_string()
    } else {
        "error".to_string()
    }
}

fn location(path: &Path, color: bool) -> String {
    if color {
        path.display().cyan().to_string()
    } else {
        path.display().to_string()
    }
}

/// Compiles and links every input. Returns the linked program, or `None`
/// after printing diagnostics when compilation or linking failed.
pub fn build(settings: &BuildSettings) -> Result<Option<LinkedProgram>> {
    let results = settings
        .inputs
        .par_iter()
        .map(|path| compile_file(path, &settings.options))
        .collect::<Result<Vec<_>>>()?;

    let mut units = Vec::with_capacity(results.len());
    let mut failed = false;
    for (path, result) in results {
        match result {
            Ok(unit) => units.push(unit),
            Err(Error::Compile(diagnostics)) => {
                failed = true;
                for diagnostic in diagnostics {
                    eprintln!(
                        "{}:{}:{}: {}: {}",
                        location(&path, settings.color),
                        diagnostic.span.line,
                        diagnostic.span.column,
                        error_label(settings.color),
                        diagnostic.message
                    );
                }
            }
            Err(err) => {
                return Err(err).with_context(|| format!("while compiling {}", path.display()));
            }
        }
    }
    if failed {
        return Ok(None);
    }

    let entry = match &settings.entry {
        Some(entry) => entry.clone(),
        None => match settings.inputs.first() {
            Some(path) => unit_name(path),
            None => bail!("no input files"),
        },
    };

    let mut linker = Linker::new();
    for unit in units {
        linker.add_unit(unit);
    }

    match linker.link(&entry) {
        Ok(program) => {
            info!(
                units = program.units.len(),
                instructions = program.bytecode.len(),
                "build finished"
            );
            Ok(Some(program))
        }
        Err(Error::Link(errors)) => {
            for err in errors {
                eprintln!("{}: {}", error_label(settings.color), err);
            }
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Writes the linked program as JSON to `settings.output`, or stdout.
pub fn emit(program: &LinkedProgram, settings: &BuildSettings) -> Result<()> {
    if settings.listing {
        print!("{}", program.bytecode);
    }

    match &settings.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(program)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None if !settings.listing => {
            println!("{}", serde_json::to_string_pretty(program)?);
        }
        None => {}
    }
    Ok(())
}
