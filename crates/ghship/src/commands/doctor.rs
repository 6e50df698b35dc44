//! Doctor command: where config and logs live, which tools are installed,
//! and which environment variables affect a release.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use ghship_core::config::{self, Config};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Serialize)]
struct DoctorReport {
    cwd: String,
    config: ConfigFiles,
    logs: Option<String>,
    tools: Vec<Tool>,
    environment: Vec<EnvVar>,
}

#[derive(Serialize)]
struct ConfigFiles {
    user_dir: Option<String>,
    /// User config file, if one exists
    user_file: Option<String>,
    /// Project config file that applies to the working directory
    project_file: Option<String>,
}

#[derive(Serialize)]
struct Tool {
    name: &'static str,
    purpose: &'static str,
    /// First line of `<tool> --version`, or `None` if it could not run
    version: Option<String>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    description: &'static str,
    value: Option<String>,
}

const TOOLS: &[(&str, &str)] = &[
    ("git", "commits, tags and pushes"),
    ("gh", "issues, pull requests and releases"),
];

const WATCHED_VARS: &[(&str, &str)] = &[
    ("GH_TOKEN", "Token used by gh (value hidden)"),
    ("GH_HOST", "GitHub host used by gh"),
    ("RUST_LOG", "Log filter directive"),
    ("GHSHIP_LOG_PATH", "Explicit log file path"),
    ("GHSHIP_LOG_DIR", "Log directory"),
    ("XDG_CONFIG_HOME", "Override config directory"),
    ("XDG_DATA_HOME", "Override data directory"),
];

const SECRET_VARS: &[&str] = &["GH_TOKEN"];

impl DoctorReport {
    fn gather(cwd: &Utf8Path) -> Self {
        let user_dir = config::user_config_dir();
        let user_file = user_dir.as_deref().and_then(user_config_file);

        Self {
            cwd: cwd.to_string(),
            config: ConfigFiles {
                user_dir: user_dir.map(|p| p.to_string()),
                user_file: user_file.map(|p| p.to_string()),
                project_file: config::find_project_config(cwd).map(|p| p.to_string()),
            },
            logs: config::user_data_local_dir().map(|p| p.join("logs").to_string()),
            tools: TOOLS
                .iter()
                .map(|&(name, purpose)| Tool {
                    name,
                    purpose,
                    version: tool_version(name),
                })
                .collect(),
            environment: WATCHED_VARS
                .iter()
                .map(|&(name, description)| EnvVar {
                    name,
                    description,
                    value: std::env::var(name).ok().map(|value| {
                        if SECRET_VARS.contains(&name) {
                            "(set)".to_string()
                        } else {
                            value
                        }
                    }),
                })
                .collect(),
        }
    }
}

fn user_config_file(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    ["toml", "yaml", "yml", "json"]
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

fn tool_version(name: &str) -> Option<String> {
    let output = Command::new(name).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

/// Print the diagnostics.
#[instrument(name = "cmd_doctor", skip_all)]
pub fn cmd_doctor(_args: DoctorArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Checking environment...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let report = DoctorReport::gather(cwd);
    spinner.finish_and_clear();

    let missing_tools = report.tools.iter().filter(|t| t.version.is_none()).count();
    debug!(missing_tools, "diagnostics gathered");

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        match tool.version {
            Some(ref version) => println!("  {} {}: {}", "✓".green(), tool.name.bold(), version),
            None => println!(
                "  {} {}: not found (needed for {})",
                "✗".red(),
                tool.name.bold(),
                tool.purpose
            ),
        }
    }
    println!();

    println!("{}", "Configuration".bold().underline());
    print_path("Project file", report.config.project_file.as_deref());
    print_path("User file", report.config.user_file.as_deref());
    print_path("User directory", report.config.user_dir.as_deref());
    print_path("Default log directory", report.logs.as_deref());
    if report.config.project_file.is_none() && report.config.user_file.is_none() {
        offer_user_config(report.config.user_dir.as_deref())?;
    }
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), report.cwd.cyan());
    let mut any_set = false;
    for var in &report.environment {
        if let Some(ref value) = var.value {
            any_set = true;
            println!("  {}: {}", var.name.dimmed(), value.cyan());
        }
    }
    if !any_set {
        println!("  {} No overrides set", "○".dimmed());
    }

    Ok(())
}

fn print_path(label: &str, path: Option<&str>) {
    match path {
        Some(path) => println!("  {}: {}", label.dimmed(), path.cyan()),
        None => println!("  {}: {}", label.dimmed(), "none".yellow()),
    }
}

/// Offer to write the default config as the user config file.
fn offer_user_config(user_dir: Option<&str>) -> anyhow::Result<()> {
    let Some(dir) = user_dir.map(Utf8PathBuf::from) else {
        return Ok(());
    };
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let path = dir.join("config.yaml");
    let answer = Confirm::new("Write a default user config?")
        .with_default(false)
        .with_help_message(&format!("Creates {path}"))
        .prompt();

    if matches!(answer, Ok(true)) {
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&path, serde_saphyr::to_string(&Config::default())?)?;
        println!("  {} Wrote {}", "✓".green(), path.cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cwd() -> Utf8PathBuf {
        Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn json_report_succeeds() {
        assert!(cmd_doctor(DoctorArgs::default(), true, &cwd()).is_ok());
    }

    #[test]
    fn checks_git_and_gh() {
        let report = DoctorReport::gather(&cwd());
        let names: Vec<_> = report.tools.iter().map(|t| t.name).collect();
        assert_eq!(names, ["git", "gh"]);
    }

    #[test]
    fn git_version_is_read() {
        let version = tool_version("git").unwrap();
        assert!(version.starts_with("git version"), "{version}");
    }

    #[test]
    fn missing_tool_has_no_version() {
        assert!(tool_version("ghship-no-such-tool").is_none());
    }

    #[test]
    fn watches_release_variables() {
        let report = DoctorReport::gather(&cwd());
        let names: Vec<_> = report.environment.iter().map(|v| v.name).collect();
        assert!(names.contains(&"GH_TOKEN"));
        assert!(names.contains(&"GHSHIP_LOG_DIR"));
    }

    #[test]
    fn user_config_file_prefers_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        assert!(user_config_file(dir).is_none());

        std::fs::write(dir.join("config.yaml"), "log_level: warn\n").unwrap();
        std::fs::write(dir.join("config.toml"), "log_level = \"warn\"\n").unwrap();
        assert_eq!(user_config_file(dir).unwrap(), dir.join("config.toml"));
    }
}
