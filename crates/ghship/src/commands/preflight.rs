//! Preflight command: report whether a release could start now.

use anyhow::bail;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{info, instrument};

use ghship_core::config::Config;
use ghship_core::git::Git;
use ghship_core::preflight::{self, CheckResult};

/// Arguments for the `preflight` subcommand.
#[derive(Args, Debug, Default)]
pub struct PreflightArgs {}

/// Run every check, print the results, and fail if any check failed.
#[instrument(name = "cmd_preflight", skip_all)]
pub fn cmd_preflight(
    _args: PreflightArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    // Outside a work tree the first check reports the problem.
    let git = Git::new(cwd);
    let git = git.toplevel().map_or(git, Git::new);
    let report = preflight::run_preflight(&git, config);
    let failed: Vec<&CheckResult> = report.checks.iter().filter(|c| !c.passed).collect();
    info!(
        checks = report.checks.len(),
        failed = failed.len(),
        repository = report.repository.as_deref(),
        "preflight finished"
    );

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report.repository {
            Some(ref slug) => println!("{} {}", "Preflight for".bold(), slug.cyan().bold()),
            None => println!("{}", "Preflight".bold()),
        }
        println!();
        for check in &report.checks {
            print_check(check);
        }
        println!();
        if failed.is_empty() {
            println!("  {}", "Ready to release.".green().bold());
        } else {
            println!(
                "  {}",
                format!("{} of {} checks failed.", failed.len(), report.checks.len())
                    .red()
                    .bold()
            );
        }
    }

    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|c| c.name.as_str()).collect();
        bail!("preflight failed: {}", names.join(", "));
    }
    Ok(())
}

fn print_check(check: &CheckResult) {
    let mark = if check.passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    };
    println!("  {mark} {:<16} {}", check.name, check.message.dimmed());
}
