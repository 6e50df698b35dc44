//! Git operations for release workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, GPG signing, hooks, and other configuration.
//!
//! Every call runs against an explicit repository root, never the process
//! working directory.

use std::process::Command;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::process::output_within;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[source] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "status").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// `git` did not finish before the deadline.
    #[error("git {command} timed out after {seconds}s")]
    TimedOut {
        /// The git subcommand that timed out.
        command: String,
        /// The deadline that was exceeded.
        seconds: u64,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A git working copy rooted at a fixed directory.
#[derive(Debug, Clone)]
pub struct Git {
    root: Utf8PathBuf,
    timeout: Option<Duration>,
}

impl Git {
    /// Operate on the repository at (or containing) `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: None,
        }
    }

    /// Apply a deadline to commands that reach the network.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The directory commands run in.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Check if the root is inside a git repository.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Top-level directory of the working tree.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn toplevel(&self) -> GitResult<Utf8PathBuf> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        Ok(Utf8PathBuf::from(output.trim()))
    }

    /// Check whether the working tree is clean (no uncommitted changes).
    ///
    /// Returns `true` if both staged and unstaged changes are empty.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn is_clean(&self) -> GitResult<bool> {
        let output = self.run(&["status", "--porcelain"])?;
        let clean = output.trim().is_empty();
        debug!(clean, "working tree status");
        Ok(clean)
    }

    /// Get the current branch name.
    ///
    /// Returns `None` if in a detached HEAD state.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn current_branch(&self) -> GitResult<Option<String>> {
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.trim().to_string();
        if branch == "HEAD" {
            debug!("detached HEAD");
            Ok(None)
        } else {
            debug!(%branch, "current branch");
            Ok(Some(branch))
        }
    }

    /// Detect the release branch by checking for `main` then `master`.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn detect_release_branch(&self) -> GitResult<Option<String>> {
        for candidate in ["main", "master"] {
            if self.run(&["rev-parse", "--verify", "--quiet", candidate]).is_ok() {
                debug!(branch = candidate, "detected release branch");
                return Ok(Some(candidate.to_string()));
            }
        }
        debug!("no main/master branch found");
        Ok(None)
    }

    /// Check whether the local branch is in sync with its upstream.
    ///
    /// Returns `true` when there is no upstream configured.
    #[instrument(skip(self), fields(root = %self.root))]
    #[expect(clippy::literal_string_with_formatting_args)]
    pub fn is_remote_in_sync(&self) -> GitResult<bool> {
        // @{upstream} is a git refspec, not a format arg
        let Ok(upstream) = self.run(&["rev-parse", "--abbrev-ref", "@{upstream}"]) else {
            debug!("no upstream tracking branch");
            return Ok(true);
        };
        let upstream = upstream.trim();

        // Best effort; a failed fetch compares against stale refs.
        let _ = self.run_remote(&["fetch", "--quiet"]);

        let local = self.head()?;
        let remote = self.run(&["rev-parse", upstream])?.trim().to_string();

        let in_sync = local == remote;
        debug!(%local, %remote, in_sync, "remote sync check");
        Ok(in_sync)
    }

    /// Get the remote URL for a named remote.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn remote_url(&self, remote: &str) -> GitResult<Option<String>> {
        match self.run(&["remote", "get-url", remote]) {
            Ok(url) => {
                let url = url.trim().to_string();
                debug!(%remote, %url, "remote URL");
                Ok(Some(url))
            }
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Full commit id of `HEAD`.
    pub fn head(&self) -> GitResult<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Id and message of `HEAD`, or `None` before the first commit.
    pub fn head_commit(&self) -> GitResult<Option<(String, String)>> {
        let id = match self.run(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"]) {
            Ok(id) => id.trim().to_string(),
            Err(GitError::Command { .. } | GitError::NotARepo) => return Ok(None),
            Err(e) => return Err(e),
        };
        let message = self.run(&["log", "-1", "--format=%B", &id])?;
        Ok(Some((id, message.trim_end().to_string())))
    }

    /// Stage `paths` and commit exactly those paths with `message`.
    ///
    /// Returns the new commit id.
    #[instrument(skip(self, message), fields(root = %self.root))]
    pub fn commit_paths(&self, message: &str, paths: &[&str]) -> GitResult<String> {
        let mut add = vec!["add", "--"];
        add.extend_from_slice(paths);
        self.run(&add)?;

        let mut commit = vec!["commit", "--quiet", "-m", message, "--"];
        commit.extend_from_slice(paths);
        self.run(&commit)?;

        let id = self.head()?;
        debug!(commit = %id, "created commit");
        Ok(id)
    }

    /// Whether a tag with this name exists locally.
    pub fn tag_exists(&self, tag: &str) -> GitResult<bool> {
        let refname = format!("refs/tags/{tag}");
        match self.run(&["rev-parse", "--verify", "--quiet", &refname]) {
            Ok(_) => Ok(true),
            Err(GitError::Command { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create an annotated tag at `target`.
    #[instrument(skip(self, message), fields(root = %self.root))]
    pub fn create_annotated_tag(&self, tag: &str, target: &str, message: &str) -> GitResult<()> {
        self.run(&["tag", "--annotate", tag, target, "-m", message])?;
        debug!(%tag, %target, "created annotated tag");
        Ok(())
    }

    /// Delete a local tag.
    pub fn delete_tag(&self, tag: &str) -> GitResult<()> {
        self.run(&["tag", "--delete", tag])?;
        Ok(())
    }

    /// Push the current branch and one tag in a single atomic push.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn push_atomic(&self, remote: &str, tag: &str) -> GitResult<()> {
        let tag_ref = format!("refs/tags/{tag}");
        self.run_remote(&["push", "--atomic", "--quiet", remote, "HEAD", &tag_ref])?;
        debug!(%remote, %tag, "pushed branch and tag");
        Ok(())
    }

    /// Release tags on `remote` as `(commit, tag)` pairs.
    ///
    /// Only tags matching `v*` are listed. Annotated tags report the tagged
    /// commit, not the tag object.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn remote_tags(&self, remote: &str) -> GitResult<Vec<(String, String)>> {
        let output = self.run_remote(&["ls-remote", "--tags", remote, "refs/tags/v*"])?;
        let tags = parse_ls_remote_tags(&output);
        debug!(count = tags.len(), "remote tags");
        Ok(tags)
    }

    /// Committer date of `commit` in strict ISO 8601.
    pub fn commit_date(&self, commit: &str) -> GitResult<String> {
        Ok(self
            .run(&["show", "--no-patch", "--format=%cI", commit])?
            .trim()
            .to_string())
    }

    fn run(&self, args: &[&str]) -> GitResult<String> {
        git(&self.root, args, None)
    }

    fn run_remote(&self, args: &[&str]) -> GitResult<String> {
        git(&self.root, args, self.timeout)
    }
}

/// Parse `git ls-remote --tags` output into `(commit, tag)` pairs.
///
/// Peeled entries (`refs/tags/v1.0.0^{}`) replace the tag object id with
/// the commit id they point to.
fn parse_ls_remote_tags(output: &str) -> Vec<(String, String)> {
    let mut tags: Vec<(String, String)> = Vec::new();
    for line in output.lines() {
        let Some((sha, refname)) = line.split_once('\t') else {
            continue;
        };
        let Some(name) = refname.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        if let Some(peeled) = name.strip_suffix("^{}") {
            if let Some(entry) = tags.iter_mut().find(|(_, tag)| tag == peeled) {
                entry.0 = sha.trim().to_string();
            }
            continue;
        }
        tags.push((sha.trim().to_string(), name.to_string()));
    }
    tags
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
/// - `ssh://git@github.com/owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Run a git command in `root` and return its stdout.
fn git(root: &Utf8Path, args: &[&str], timeout: Option<Duration>) -> GitResult<String> {
    let command = args.first().copied().unwrap_or_default().to_string();
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(root.as_std_path());

    let output = output_within(&mut cmd, timeout).map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            GitError::TimedOut {
                command: command.clone(),
                seconds: timeout.map_or(0, |t| t.as_secs()),
            }
        } else {
            GitError::Exec(e)
        }
    })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command { command, stderr })
    }
}
