//! Maintenance tasks for the ghship workspace.
//!
//! `cargo xtask completions` writes shell completion scripts and
//! `cargo xtask man` writes man pages, both generated from the CLI
//! definition in the `ghship` crate.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xtask", about = "ghship maintenance tasks")]
struct Xtask {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Write shell completion scripts for ghship.
    Completions(commands::completions::CompletionsArgs),

    /// Write man pages for ghship and each of its subcommands.
    Man(commands::man::ManArgs),
}

fn main() -> Result<(), String> {
    match Xtask::parse().task {
        Task::Completions(args) => commands::completions::run(args),
        Task::Man(args) => commands::man::run(args),
    }
}

/// Name of the installed binary.
pub const BIN_NAME: &str = "ghship";

/// Resolve `dir` against the workspace root and make sure it exists.
pub fn output_dir(dir: &std::path::Path) -> Result<PathBuf, String> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir.parent().unwrap_or(&manifest_dir);
    let out = root.join(dir);
    std::fs::create_dir_all(&out).map_err(|e| format!("{}: {e}", out.display()))?;
    Ok(out)
}
