//! End-to-end CLI tests.
//!
//! Each test runs the compiled binary in a scratch directory with logs and
//! user config redirected into it, so nothing outside the directory is read
//! or written.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("GHSHIP_LOG_DIR", home.join("logs"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("RUST_LOG");
    cmd
}

fn in_dir(dir: &Path) -> Command {
    let mut cmd = cmd(dir);
    cmd.arg("-C").arg(dir);
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// A fresh repository with a GitHub `origin` remote.
fn github_checkout() -> TempDir {
    let tmp = TempDir::new().unwrap();
    git(tmp.path(), &["init", "-q"]);
    git(
        tmp.path(),
        &["remote", "add", "origin", "git@github.com:acme/widgets.git"],
    );
    tmp
}

fn stdout_json(assert: &assert_cmd::assert::Assert) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_lists_release_commands() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("changelog"))
        .stdout(predicate::str::contains("preflight"));
}

#[test]
fn long_help_documents_environment() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("GHSHIP_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn release_help_lists_bump_kinds() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["release", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("major"))
        .stdout(predicate::str::contains("minor"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("--dry-run"));
}

// =============================================================================
// Argument Errors
// =============================================================================

#[test]
fn release_requires_a_bump_kind() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .arg("release")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<KIND>"));
}

#[test]
fn unknown_bump_kind_is_rejected() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["release", "huge"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value 'huge'"));
}

#[test]
fn no_subcommand_shows_usage() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn chdir_to_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();
    cmd(tmp.path())
        .args(["-C", "/nonexistent/ghship/path", "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to change directory"));
}

// =============================================================================
// Outside a Repository
// =============================================================================

#[test]
fn release_outside_a_repository_fails() {
    let tmp = TempDir::new().unwrap();
    in_dir(tmp.path())
        .args(["release", "patch", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a git repository"));
}

#[test]
fn changelog_outside_a_repository_fails() {
    let tmp = TempDir::new().unwrap();
    in_dir(tmp.path())
        .args(["changelog", "minor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a git repository"));
}

#[test]
fn preflight_outside_a_repository_fails() {
    let tmp = TempDir::new().unwrap();
    let assert = in_dir(tmp.path())
        .args(["--json", "preflight"])
        .assert()
        .failure();
    let report = stdout_json(&assert);
    assert_eq!(report["all_passed"], false);
    assert_eq!(report["checks"][0]["name"], "Git repository");
    assert_eq!(report["checks"][0]["passed"], false);
}

#[test]
fn info_outside_a_repository_has_no_repository() {
    let tmp = TempDir::new().unwrap();
    let assert = in_dir(tmp.path()).args(["info", "--json"]).assert().success();
    let info = stdout_json(&assert);
    assert_eq!(info["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    assert!(info.get("repository").is_none());
}

// =============================================================================
// Inside a Repository
// =============================================================================

#[test]
fn info_reads_repository_and_version() {
    let repo = github_checkout();
    std::fs::write(repo.path().join("VERSION"), "0.1.1\n").unwrap();

    let assert = in_dir(repo.path()).args(["info", "--json"]).assert().success();
    let info = stdout_json(&assert);
    assert_eq!(info["repository"]["slug"], "acme/widgets");
    assert_eq!(info["repository"]["version"]["Ok"], "0.1.1");
}

#[test]
fn info_reports_missing_version_file() {
    let repo = github_checkout();
    let assert = in_dir(repo.path()).args(["info", "--json"]).assert().success();
    let info = stdout_json(&assert);
    assert!(
        info["repository"]["version"]["Err"]
            .as_str()
            .unwrap()
            .contains("no version record")
    );
}

#[test]
fn release_without_version_file_changes_nothing() {
    let repo = github_checkout();
    in_dir(repo.path())
        .args(["release", "patch", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no version record"));
    assert!(!repo.path().join("VERSION").exists());
    assert!(!repo.path().join("CHANGELOG.md").exists());
}

#[test]
fn changelog_without_version_file_fails() {
    let repo = github_checkout();
    in_dir(repo.path())
        .args(["changelog", "patch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to render changelog section"));
}

#[test]
fn remote_without_github_url_needs_config() {
    let tmp = TempDir::new().unwrap();
    git(tmp.path(), &["init", "-q"]);
    in_dir(tmp.path())
        .args(["changelog", "patch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot tell which GitHub repository"));
}

// =============================================================================
// Doctor & Global Flags
// =============================================================================

#[test]
fn doctor_json_lists_environment() {
    let tmp = TempDir::new().unwrap();
    let assert = in_dir(tmp.path())
        .args(["doctor", "--json"])
        .assert()
        .success();
    let report = stdout_json(&assert);
    assert!(report.to_string().contains("GHSHIP_LOG_DIR"));
}

#[test]
fn global_flags_are_accepted() {
    let tmp = TempDir::new().unwrap();
    let cases: [&[&str]; 4] = [
        &["-q"],
        &["-vv"],
        &["--color", "never"],
        &["--color", "always"],
    ];
    for flags in cases {
        in_dir(tmp.path()).args(flags).arg("info").assert().success();
    }
}

#[test]
fn logs_land_in_the_configured_directory() {
    let tmp = TempDir::new().unwrap();
    in_dir(tmp.path()).arg("info").assert().success();
    let logs: Vec<_> = std::fs::read_dir(tmp.path().join("logs"))
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert!(!logs.is_empty());
}
