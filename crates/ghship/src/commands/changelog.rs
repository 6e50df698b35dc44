//! Changelog command: preview the section the next release would add.

use anyhow::Context;
use clap::Args;
use tracing::{debug, instrument};

use ghship_core::config::Config;
use ghship_core::version::BumpKind;

use super::Repository;

/// Arguments for the `changelog` subcommand.
#[derive(Args, Debug)]
pub struct ChangelogArgs {
    /// Which version component the release would bump
    #[arg(value_enum)]
    pub kind: BumpKind,

    /// Release description (overrides config)
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,
}

/// Render the next changelog section to stdout.
#[instrument(name = "cmd_changelog", skip_all, fields(kind = %args.kind))]
pub fn cmd_changelog(
    args: ChangelogArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "rendering changelog preview");

    let repository = Repository::discover(config, cwd)?;
    let mut release = super::github_release(config, &repository, args.description);
    let plan = release
        .plan(args.kind)
        .context("failed to render changelog section")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", plan.section);
    }

    Ok(())
}
