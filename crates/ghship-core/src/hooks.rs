//! User commands run at release stage boundaries.
//!
//! Hooks are shell commands from the `[hooks]` config section. Each hook
//! point holds a list of commands that run one after another through
//! `sh -c` in the repository root; the first failure stops the list and
//! fails the release stage the hook point belongs to.
//!
//! # Variables
//!
//! Before running, these placeholders are replaced: `{version}`,
//! `{prev_version}`, `{tag}`, `{changelog_path}`, `{owner}` and `{repo}`.

use std::process::Command;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::process::output_within;

/// A hook that did not succeed.
#[derive(Error, Debug)]
pub enum HookError {
    /// The command exited unsuccessfully.
    #[error("hook `{command}` failed")]
    CommandFailed {
        /// Command as configured.
        command: String,
        /// Exit code; `None` if killed by a signal or the timeout.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// `sh` could not be started.
    #[error("could not start hook: {0}")]
    Exec(#[from] std::io::Error),
}

/// Result alias for [`HookError`].
pub type HookResult<T> = Result<T, HookError>;

/// Where in a release a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before anything is written locally.
    PreRelease,
    /// After the version and changelog are written, before they are committed.
    PostChangelog,
    /// After the tag is on the remote.
    PostTag,
    /// After the release entry is published.
    PostRelease,
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreRelease => write!(f, "pre_release"),
            Self::PostChangelog => write!(f, "post_changelog"),
            Self::PostTag => write!(f, "post_tag"),
            Self::PostRelease => write!(f, "post_release"),
        }
    }
}

/// Hook commands per hook point.
///
/// # Example
///
/// ```toml
/// [hooks]
/// post_changelog = ["npx prettier --write {changelog_path}"]
/// post_release = ["echo released {owner}/{repo} {tag}"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HooksConfig {
    /// Commands to run before anything is written locally.
    pub pre_release: Option<Vec<String>>,
    /// Commands to run after the changelog is written, before the commit.
    pub post_changelog: Option<Vec<String>>,
    /// Commands to run after the tag is pushed.
    pub post_tag: Option<Vec<String>>,
    /// Commands to run after the release entry is published.
    pub post_release: Option<Vec<String>>,
}

impl HooksConfig {
    /// Commands configured for `point`.
    pub fn commands(&self, point: HookPoint) -> &[String] {
        let list = match point {
            HookPoint::PreRelease => &self.pre_release,
            HookPoint::PostChangelog => &self.post_changelog,
            HookPoint::PostTag => &self.post_tag,
            HookPoint::PostRelease => &self.post_release,
        };
        list.as_deref().unwrap_or_default()
    }
}

/// Values substituted into hook commands.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Version being released, without the `v`.
    pub version: String,
    /// Version before the bump.
    pub prev_version: String,
    /// Release tag.
    pub tag: String,
    /// Changelog file the release writes.
    pub changelog_path: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl HookContext {
    /// Replace `{var}` placeholders in `command`. Unknown placeholders are
    /// left as written.
    pub fn interpolate(&self, command: &str) -> String {
        command
            .replace("{version}", &self.version)
            .replace("{prev_version}", &self.prev_version)
            .replace("{tag}", &self.tag)
            .replace("{changelog_path}", &self.changelog_path)
            .replace("{owner}", &self.owner)
            .replace("{repo}", &self.repo)
    }
}

/// A hook command that ran successfully.
#[derive(Debug, Clone, Serialize)]
pub struct HookOutput {
    /// Command as configured, before substitution.
    pub command: String,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Wall-clock run time.
    pub duration: Duration,
}

/// Runs configured hooks in a fixed directory.
#[derive(Debug, Clone, Default)]
pub struct HookRunner {
    hooks: HooksConfig,
    root: Utf8PathBuf,
    timeout: Option<Duration>,
}

impl HookRunner {
    /// Run `hooks` with `root` as the working directory.
    pub fn new(hooks: HooksConfig, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            hooks,
            root: root.into(),
            timeout: None,
        }
    }

    /// Kill any hook command that runs longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of commands configured for `point`.
    pub fn count(&self, point: HookPoint) -> usize {
        self.hooks.commands(point).len()
    }

    /// Commands for `point` with `context` interpolated, for display.
    pub fn commands(&self, point: HookPoint, context: &HookContext) -> Vec<String> {
        self.hooks
            .commands(point)
            .iter()
            .map(|command| context.interpolate(command))
            .collect()
    }

    /// Run every command for `point` in order, stopping at the first failure.
    #[instrument(skip(self, context), fields(%point, count = self.count(point)))]
    pub fn run(&self, point: HookPoint, context: &HookContext) -> HookResult<Vec<HookOutput>> {
        self.hooks
            .commands(point)
            .iter()
            .map(|command| run_single(command, context, &self.root, self.timeout))
            .collect()
    }
}

fn run_single(
    command: &str,
    context: &HookContext,
    root: &Utf8Path,
    timeout: Option<Duration>,
) -> HookResult<HookOutput> {
    let interpolated = context.interpolate(command);
    debug!(command = %interpolated, "running hook");

    let start = Instant::now();
    let output = output_within(
        Command::new("sh")
            .args(["-c", &interpolated])
            .current_dir(root.as_std_path()),
        timeout,
    )?;
    let duration = start.elapsed();

    if !output.status.success() {
        return Err(HookError::CommandFailed {
            command: command.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(HookOutput {
        command: command.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_context() -> HookContext {
        HookContext {
            version: "1.2.3".into(),
            prev_version: "1.1.0".into(),
            tag: "v1.2.3".into(),
            changelog_path: "CHANGELOG.md".into(),
            owner: "acme".into(),
            repo: "widgets".into(),
        }
    }

    fn runner(tmp: &TempDir, hooks: HooksConfig) -> HookRunner {
        HookRunner::new(hooks, Utf8Path::from_path(tmp.path()).unwrap())
    }

    #[test]
    fn interpolate_all_variables() {
        let result = test_context().interpolate(
            "echo {version} {prev_version} {tag} {changelog_path} {owner}/{repo}",
        );
        assert_eq!(result, "echo 1.2.3 1.1.0 v1.2.3 CHANGELOG.md acme/widgets");
    }

    #[test]
    fn interpolate_preserves_unknown_braces() {
        let result = test_context().interpolate("echo {unknown} {version}");
        assert_eq!(result, "echo {unknown} 1.2.3");
    }

    #[test]
    fn commands_per_point() {
        let hooks = HooksConfig {
            post_tag: Some(vec!["echo tagged".into()]),
            ..HooksConfig::default()
        };
        assert_eq!(hooks.commands(HookPoint::PostTag), ["echo tagged"]);
        assert!(hooks.commands(HookPoint::PreRelease).is_empty());
    }

    #[test]
    fn hook_point_names_match_config_keys() {
        assert_eq!(HookPoint::PreRelease.to_string(), "pre_release");
        assert_eq!(HookPoint::PostChangelog.to_string(), "post_changelog");
        assert_eq!(
            serde_json::to_string(&HookPoint::PostRelease).unwrap(),
            "\"post_release\""
        );
    }

    #[test]
    fn run_nothing_configured() {
        let tmp = TempDir::new().unwrap();
        let results = runner(&tmp, HooksConfig::default())
            .run(HookPoint::PostRelease, &test_context())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn run_interpolates_and_captures() {
        let tmp = TempDir::new().unwrap();
        let hooks = HooksConfig {
            post_release: Some(vec!["echo {owner}/{repo}@{tag}".into()]),
            ..HooksConfig::default()
        };
        let results = runner(&tmp, hooks)
            .run(HookPoint::PostRelease, &test_context())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stdout.trim(), "acme/widgets@v1.2.3");
    }

    #[test]
    fn run_in_order_in_root() {
        let tmp = TempDir::new().unwrap();
        let hooks = HooksConfig {
            pre_release: Some(vec![
                "echo one > order.txt".into(),
                "echo two >> order.txt".into(),
            ]),
            ..HooksConfig::default()
        };
        runner(&tmp, hooks)
            .run(HookPoint::PreRelease, &test_context())
            .unwrap();
        let written = std::fs::read_to_string(tmp.path().join("order.txt")).unwrap();
        assert_eq!(written, "one\ntwo\n");
    }

    #[test]
    fn failure_stops_the_list() {
        let tmp = TempDir::new().unwrap();
        let hooks = HooksConfig {
            post_tag: Some(vec![
                "echo oops >&2; exit 4".into(),
                "touch should-not-exist".into(),
            ]),
            ..HooksConfig::default()
        };
        let err = runner(&tmp, hooks)
            .run(HookPoint::PostTag, &test_context())
            .unwrap_err();
        match err {
            HookError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!tmp.path().join("should-not-exist").exists());
    }
}
