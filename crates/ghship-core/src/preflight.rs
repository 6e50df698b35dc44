//! Release readiness checks.
//!
//! Looks at the working copy, the branch, the remote and the tools a
//! release needs, and returns structured results for the CLI to format.
//! Nothing here changes the repository.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::git::{Git, GitResult, parse_owner_repo};
use crate::store::{FileVersionStore, VersionStore};

/// A single check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// What was found.
    pub message: String,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.into(),
        }
    }

    fn from_git(name: &str, result: GitResult<bool>, ok: &str, not_ok: &str) -> Self {
        match result {
            Ok(true) => Self::pass(name, ok),
            Ok(false) => Self::fail(name, not_ok),
            Err(e) => Self::fail(name, format!("Failed to check: {e}")),
        }
    }
}

/// Full preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Individual check results, in the order they ran.
    pub checks: Vec<CheckResult>,
    /// Whether every check passed.
    pub all_passed: bool,
    /// `owner/repo` the release would go to, when it could be determined.
    pub repository: Option<String>,
}

/// Run every check against the working copy at `git.root()`.
#[instrument(skip_all, fields(root = %git.root()))]
pub fn run_preflight(git: &Git, config: &Config) -> PreflightReport {
    let mut checks = vec![CheckResult::from_git(
        "Git repository",
        git.is_inside_repo(),
        "Inside a git repository",
        "Not inside a git repository",
    )];

    if !checks[0].passed {
        return PreflightReport {
            checks,
            all_passed: false,
            repository: None,
        };
    }

    checks.push(CheckResult::from_git(
        "Working tree",
        git.is_clean(),
        "Clean working tree",
        "Uncommitted changes in working tree",
    ));
    checks.push(check_release_branch(git, config.release_branch()));
    checks.push(CheckResult::from_git(
        "Remote sync",
        git.is_remote_in_sync(),
        "Local branch is in sync with its upstream",
        "Local branch is out of sync with its upstream (pull or push needed)",
    ));

    let (remote_check, repository) = check_remote(git, config);
    checks.push(remote_check);
    checks.push(check_version_file(git, config));
    checks.push(check_gh());

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport {
        checks,
        all_passed,
        repository,
    }
}

fn check_release_branch(git: &Git, configured: Option<&str>) -> CheckResult {
    const NAME: &str = "Release branch";

    let current = match git.current_branch() {
        Ok(Some(branch)) => branch,
        Ok(None) => return CheckResult::fail(NAME, "Detached HEAD, not on any branch"),
        Err(e) => return CheckResult::fail(NAME, format!("Failed to check: {e}")),
    };

    let expected = match configured {
        Some(branch) => branch.to_string(),
        None => match git.detect_release_branch() {
            Ok(Some(branch)) => branch,
            Ok(None) => {
                return CheckResult::fail(NAME, format!("On '{current}', no main or master branch"));
            }
            Err(e) => return CheckResult::fail(NAME, format!("Failed to detect: {e}")),
        },
    };

    if current == expected {
        CheckResult::pass(NAME, format!("On release branch '{current}'"))
    } else {
        CheckResult::fail(NAME, format!("On '{current}', expected '{expected}'"))
    }
}

fn check_remote(git: &Git, config: &Config) -> (CheckResult, Option<String>) {
    const NAME: &str = "Remote";
    let remote = config.remote_name();

    let url = match git.remote_url(remote) {
        Ok(Some(url)) => url,
        Ok(None) => return (CheckResult::fail(NAME, format!("No remote named '{remote}'")), None),
        Err(e) => return (CheckResult::fail(NAME, format!("Failed to check: {e}")), None),
    };

    let parsed = parse_owner_repo(&url);
    let owner = config
        .owner()
        .map(str::to_string)
        .or_else(|| parsed.as_ref().map(|(o, _)| o.clone()));
    let repo = config
        .repo_name()
        .map(str::to_string)
        .or_else(|| parsed.as_ref().map(|(_, r)| r.clone()));

    match owner.zip(repo) {
        Some((owner, repo)) => {
            let slug = format!("{owner}/{repo}");
            (
                CheckResult::pass(NAME, format!("Releasing to {slug} via '{remote}'")),
                Some(slug),
            )
        }
        None => (
            CheckResult::fail(
                NAME,
                format!("Cannot tell owner/repo from '{url}'; set [repository] owner and name"),
            ),
            None,
        ),
    }
}

fn check_version_file(git: &Git, config: &Config) -> CheckResult {
    const NAME: &str = "Version file";
    let store = FileVersionStore::new(git.root().join(config.version_file()));
    match store.current() {
        Ok(version) => CheckResult::pass(NAME, format!("{} holds {version}", config.version_file())),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

fn check_gh() -> CheckResult {
    match which::which("gh") {
        Ok(path) => CheckResult::pass("GitHub CLI", format!("Found at {}", path.display())),
        Err(_) => CheckResult::fail(
            "GitHub CLI",
            "gh not found on PATH; install it from https://cli.github.com",
        ),
    }
}
