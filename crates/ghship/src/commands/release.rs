//! Release command: thin CLI layer over `ghship_core::release`.

use anyhow::{Context, bail};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use ghship_core::config::Config;
use ghship_core::preflight;
use ghship_core::release::{ReleaseEvent, ReleasePlan, ReleaseStage, StageOutcome};
use ghship_core::version::BumpKind;

use super::Repository;

/// Arguments for the `release` subcommand.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Which version component to bump
    #[arg(value_enum)]
    pub kind: BumpKind,

    /// Show the plan and changelog section without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Release description (overrides config)
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Release even if preflight checks fail
    #[arg(long)]
    pub skip_preflight: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all, fields(kind = %args.kind))]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing release command"
    );

    let repository = Repository::discover(config, cwd)?;

    if !args.skip_preflight && !args.dry_run {
        let report = preflight::run_preflight(&repository.git, config);
        if !report.all_passed {
            for check in report.checks.iter().filter(|c| !c.passed) {
                eprintln!("  {} {}: {}", "✗".red(), check.name.bold(), check.message);
            }
            bail!("preflight checks failed (run `ghship preflight` for details, or pass --skip-preflight)");
        }
    }

    let mut release = super::github_release(config, &repository, args.description);
    let plan = release.plan(args.kind).context("release planning failed")?;

    if args.dry_run {
        if global_json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("\n{}", "DRY RUN: no changes will be made".yellow().bold());
            print_plan(&plan, &repository);
            print!("{}", plan.section);
        }
        return Ok(());
    }

    if !global_json {
        print_plan(&plan, &repository);
    }

    if config.confirm() && !args.yes && !global_json {
        let confirmed = Confirm::new("Proceed with release?")
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let outcome = release
        .execute(plan, |event| {
            if !global_json {
                handle_event(event);
            }
        })
        .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        let verb = if outcome.resumed { "Published" } else { "Released" };
        println!(
            "{} {verb} {} ({} hooks)",
            "✓".green().bold(),
            outcome.tag.green().bold(),
            outcome.hooks_run,
        );
        if let Some(ref url) = outcome.release_url {
            println!("  {}", url.cyan());
        }
        if let Some(ref milestone) = outcome.closed_milestone {
            println!("  {} {}", "closed milestone".dimmed(), milestone);
        }
    }

    Ok(())
}

fn print_plan(plan: &ReleasePlan, repository: &Repository) {
    println!();
    if plan.resume {
        let left = if plan.resumed_after == Some(ReleaseStage::TagCreated) {
            "was tagged but never published"
        } else {
            "was committed but never tagged"
        };
        println!("{}: {} {left}", "Resume".bold(), plan.tag.green().bold());
    } else {
        println!(
            "{}: {} → {}",
            "Release".bold(),
            plan.previous_version.to_string().dimmed(),
            plan.version.to_string().green().bold(),
        );
    }
    println!(
        "{}: {}/{} | {}: {} | {}: {} | {}: {}",
        "Repository".dimmed(),
        repository.owner,
        repository.name,
        "Tag".dimmed(),
        plan.tag,
        "Issues".dimmed(),
        plan.closed_issues,
        "Pull requests".dimmed(),
        plan.merged_pull_requests,
    );
    if let Some(ref milestone) = plan.milestone {
        println!("{}: {} (closed after publishing)", "Milestone".dimmed(), milestone.title);
    }
    println!();
}

/// Print progress for one release event.
fn handle_event(event: ReleaseEvent) {
    match event {
        ReleaseEvent::StageStarted(stage) => {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                spinner.set_style(
                    style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                );
            }
            spinner.set_message(format!("{stage}..."));
            spinner.finish_and_clear();
        }
        ReleaseEvent::StageCompleted(stage, outcome) => match outcome {
            StageOutcome::Success { message } => {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    stage.to_string().bold(),
                    message.dimmed(),
                );
            }
            StageOutcome::Skipped { reason } => {
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    stage.to_string().bold(),
                    format!("skipped: {reason}").dimmed(),
                );
            }
        },
        ReleaseEvent::HooksStarted { point, commands } => {
            debug!(%point, count = commands.len(), "running hooks");
            for command in &commands {
                println!("    {} {}", "hook →".dimmed(), command.cyan());
            }
        }
        ReleaseEvent::HooksCompleted { point, count } => {
            debug!(%point, count, "hooks completed");
        }
    }
}
