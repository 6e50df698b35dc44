//! Info command: show package, config, and repository information.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use ghship_core::config::{self, Config};
use ghship_core::store::{FileVersionStore, VersionStore};

use super::Repository;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    remote: String,
    version_file: String,
    changelog_file: String,
    draft: bool,
    timeout_secs: u64,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            remote: config.remote_name().to_string(),
            version_file: config.version_file().to_string(),
            changelog_file: config.changelog_file().to_string(),
            draft: config.draft(),
            timeout_secs: config.timeout().as_secs(),
        }
    }
}

#[derive(Serialize)]
struct RepositoryInfo {
    root: String,
    slug: String,
    /// Current version, or why it could not be read
    version: Result<String, String>,
}

impl RepositoryInfo {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Option<Self> {
        let repository = Repository::discover(config, cwd).ok()?;
        let version = FileVersionStore::new(repository.version_file(config))
            .current()
            .map(|v| v.to_string())
            .map_err(|e| e.to_string());
        Some(Self {
            root: repository.root().to_string(),
            slug: format!("{}/{}", repository.owner, repository.name),
            version,
        })
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<RepositoryInfo>,
}

/// Print package, config, and repository information.
#[instrument(name = "cmd_info", skip_all)]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        repository: RepositoryInfo::gather(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), info.package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match info.config.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!("{}: {}", "Remote".dimmed(), info.config.remote);
    println!("{}: {}", "Version file".dimmed(), info.config.version_file);
    println!("{}: {}", "Changelog".dimmed(), info.config.changelog_file);

    println!();
    println!("{}", "Repository".bold().underline());
    match info.repository {
        Some(ref repo) => {
            println!("{}: {}", "Root".dimmed(), repo.root);
            println!("{}: {}", "GitHub".dimmed(), repo.slug.cyan());
            match repo.version {
                Ok(ref version) => println!("{}: {}", "Version".dimmed(), version.green()),
                Err(ref reason) => println!("{}: {}", "Version".dimmed(), reason.yellow()),
            }
        }
        None => println!("  {} {}", "○".yellow(), "Not in a GitHub repository".yellow()),
    }

    Ok(())
}
