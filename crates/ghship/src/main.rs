//! ghship CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use tracing::debug;

use ghship::{Cli, Commands, commands};
use ghship_core::config::{Config, ConfigLoader};

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = utf8(std::env::current_dir().context("failed to determine current directory")?)
        .context("current directory is not valid UTF-8")?;

    let config = load_config(&cli, &cwd).context("failed to load configuration")?;

    let _guard = observability::init_observability(
        &observability::ObservabilityConfig::from_env_with_overrides(
            config.log_dir.clone().map(Utf8PathBuf::into_std_path_buf),
        ),
        observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str()),
    )
    .context("failed to initialize logging")?;
    debug!(
        command = command_name(&cli.command),
        %cwd,
        json = cli.json,
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting"
    );

    let json = cli.json;
    let result = match cli.command {
        Commands::Release(args) => commands::release::cmd_release(args, json, &config, &cwd),
        Commands::Changelog(args) => commands::changelog::cmd_changelog(args, json, &config, &cwd),
        Commands::Preflight(args) => commands::preflight::cmd_preflight(args, json, &config, &cwd),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, json, &cwd),
        Commands::Info(args) => commands::info::cmd_info(args, json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    result
}

/// Discovered config for `cwd`, with `--config` merged on top.
fn load_config(cli: &Cli, cwd: &Utf8Path) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(ref path) = cli.config {
        let path = utf8(path.clone()).context("config path is not valid UTF-8")?;
        loader = loader.with_file(&path);
    }
    Ok(loader.load()?)
}

fn utf8(path: PathBuf) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| anyhow!("{}", e.into_path_buf().display()))
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Release(_) => "release",
        Commands::Changelog(_) => "changelog",
        Commands::Preflight(_) => "preflight",
        Commands::Doctor(_) => "doctor",
        Commands::Info(_) => "info",
    }
}
