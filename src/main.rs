// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! sprig - bytecode compiler and linker for the sprig scripting language
//!
//! Reads ASTs serialized as JSON, compiles each file as its own unit and
//! links them into a single program.

mod build;
mod config;

use build::BuildSettings;
use clap::{Args, Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "sprig",
    about = "Bytecode compiler and linker for sprig",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./sprig.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and link AST files
    Build(BuildArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// AST files (JSON); each file is one unit named after its stem
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Unit whose top-level code runs first (defaults to the first input)
    #[arg(long)]
    entry: Option<String>,

    /// Write the linked program here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a disassembly listing
    #[arg(long)]
    listing: bool,

    /// Do not emit checkpoint markers
    #[arg(long)]
    no_checkpoints: bool,

    /// Disable colored diagnostics
    #[arg(long)]
    no_color: bool,
}

impl BuildArgs {
    fn into_settings(self, config: Config) -> BuildSettings {
        let mut options = config.compiler;
        if self.no_checkpoints {
            options.checkpoints = false;
        }
        BuildSettings {
            inputs: self.inputs,
            entry: self.entry,
            output: self.output,
            listing: self.listing || config.output.listing,
            color: config.output.color && !self.no_color,
            options,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "sprig=debug,sprig_compiler=debug"
    } else {
        "sprig=warn,sprig_compiler=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Build(args) => {
            let settings = args.into_settings(config);
            match build::build(&settings)? {
                Some(program) => {
                    build::emit(&program, &settings)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::FAILURE),
            }
        }
    }
}
