//! Argument parsing and command implementations for the `ghship` binary.
//!
//! `main.rs` only loads config, sets up logging and dispatches; everything
//! else lives here so `xtask` can render man pages and completions from
//! [`command`].

pub mod commands;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

/// When to colorize terminal output.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

impl ColorChoice {
    /// Apply the choice process-wide.
    pub fn apply(self) {
        match self {
            Self::Auto => owo_colors::unset_override(),
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const AFTER_HELP: &str = "\
ENVIRONMENT:
    GH_TOKEN            Token `gh` uses to talk to GitHub
    RUST_LOG            Log filter, e.g. ghship_core::release=debug
    GHSHIP_LOG_PATH     Write logs to exactly this file
    GHSHIP_LOG_DIR      Write logs into this directory

CONFIG FILES:
    .ghship.toml (or ghship.toml, .yaml, .yml, .json) in the repository,
    config.toml in the user config directory, and --config FILE, merged
    in that order of increasing precedence.
";

/// Bump the version, update the changelog and publish a GitHub release.
#[derive(Parser)]
#[command(name = "ghship", version, about, long_about = None)]
#[command(after_long_help = AFTER_HELP)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config file, merged over the discovered ones
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long = "chdir", global = true, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Log errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Release the next major, minor or patch version
    Release(commands::release::ReleaseArgs),

    /// Print the changelog section the next release would add
    Changelog(commands::changelog::ChangelogArgs),

    /// Check that the repository is ready to release
    Preflight(commands::preflight::PreflightArgs),

    /// Show where config and logs live and which variables are set
    Doctor(commands::doctor::DoctorArgs),

    /// Show version, effective config and repository
    Info(commands::info::InfoArgs),
}

/// The clap command tree, for man pages and completions.
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn bump_kind_is_positional() {
        let cli = Cli::try_parse_from(["ghship", "release", "minor", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Release(args) => {
                assert_eq!(args.kind, ghship_core::BumpKind::Minor);
                assert!(args.dry_run);
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["ghship", "info", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["ghship", "-q", "-v", "info"]).is_err());
    }
}
