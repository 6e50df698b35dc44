//! GitHub-backed [`RemoteGateway`].
//!
//! Tags travel over `git` (`ls-remote`, `push --atomic`); issues, pull
//! requests, milestones, and releases go through `gh api`. Both tools bring their own
//! authentication, so there are no tokens to configure here.

use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{IssueRef, PullRequestRef};
use crate::git::{Git, GitError};
use crate::process::output_within;
use crate::remote::{
    ClosedWork, Milestone, ReleaseRef, RemoteError, RemoteGateway, RemoteResult, TagRef,
    highest_release_tag,
};

/// Deadline applied to every network call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A GitHub repository reached through `git` and `gh`.
#[derive(Debug, Clone)]
pub struct GitHubGateway {
    git: Git,
    remote: String,
    owner: String,
    repo: String,
    draft: bool,
    timeout: Duration,
}

impl GitHubGateway {
    /// Gateway for `owner/repo`, pushing tags to the git remote `remote`.
    pub fn new(
        git: Git,
        remote: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            git: git.with_timeout(DEFAULT_TIMEOUT),
            remote: remote.into(),
            owner: owner.into(),
            repo: repo.into(),
            draft: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Publish releases as drafts.
    #[must_use]
    pub const fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Deadline for each `git`/`gh` network call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.git = self.git.with_timeout(timeout);
        self.timeout = timeout;
        self
    }

    /// `https://github.com/<owner>/<repo>`.
    pub fn web_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("repos/{}/{}/{path}", self.owner, self.repo)
    }

    /// When `commit` was made, preferring the local object database.
    fn commit_date(&self, commit: &str) -> RemoteResult<Option<DateTime<Utc>>> {
        let raw = match self.git.commit_date(commit) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(%commit, "commit not available locally, asking GitHub");
                self.api(&[
                    &self.endpoint(&format!("commits/{commit}")),
                    "--jq",
                    ".commit.committer.date",
                ])?
                .trim()
                .to_string()
            }
        };
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|d| d.with_timezone(&Utc)))
    }

    fn api(&self, args: &[&str]) -> Result<String, GhError> {
        let mut cmd = Command::new("gh");
        cmd.arg("api").args(args).current_dir(self.git.root().as_std_path());

        let output = output_within(&mut cmd, Some(self.timeout)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                GhError::Unavailable(format!("gh api timed out after {}s", self.timeout.as_secs()))
            } else {
                GhError::Unavailable(format!("failed to run gh: {e}"))
            }
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GhError::Http {
            status: http_status(&stderr),
            body: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}

impl RemoteGateway for GitHubGateway {
    #[instrument(skip(self), fields(remote = %self.remote))]
    fn latest_tag(&self) -> RemoteResult<Option<TagRef>> {
        let tags = self.git.remote_tags(&self.remote).map_err(unavailable)?;
        let Some(mut latest) = highest_release_tag(tags.into_iter().map(|(commit, name)| TagRef {
            name,
            commit,
            date: None,
        })) else {
            debug!("no release tags on remote");
            return Ok(None);
        };

        latest.date = self.commit_date(&latest.commit)?;
        debug!(tag = %latest.name, date = ?latest.date, "latest release tag");
        Ok(Some(latest))
    }

    #[instrument(skip(self, since), fields(previous = since.map(|t| t.name.as_str())))]
    fn closed_since(&self, since: Option<&TagRef>) -> RemoteResult<ClosedWork> {
        let cutoff = since.and_then(|t| t.date);
        if since.is_some() && cutoff.is_none() {
            warn!("previous tag has no date, listing all closed work");
        }

        let mut query = String::from("issues?state=closed&sort=created&direction=asc&per_page=100");
        if let Some(cutoff) = cutoff {
            query.push_str("&since=");
            query.push_str(&cutoff.format("%Y-%m-%dT%H:%M:%SZ").to_string());
        }

        let output = self.api(&["--paginate", &self.endpoint(&query), "--jq", ".[]"])?;
        let items = parse_issue_stream(&output)
            .map_err(|e| RemoteError::Unavailable(format!("unexpected issues payload: {e}")))?;
        let work = split_closed_work(items, cutoff);
        info!(
            issues = work.issues.len(),
            pull_requests = work.pull_requests.len(),
            "listed closed work"
        );
        Ok(work)
    }

    #[instrument(skip(self, message), fields(remote = %self.remote))]
    fn create_tag(&mut self, name: &str, target: &str, message: &str) -> RemoteResult<TagRef> {
        if self.git.tag_exists(name).map_err(unavailable)? {
            return Err(RemoteError::Conflict(format!("tag {name} already exists locally")));
        }
        let remote_tags = self.git.remote_tags(&self.remote).map_err(unavailable)?;
        if remote_tags.iter().any(|(_, tag)| tag == name) {
            return Err(RemoteError::Conflict(format!(
                "tag {name} already exists on {}",
                self.remote
            )));
        }

        self.git
            .create_annotated_tag(name, target, message)
            .map_err(unavailable)?;

        if let Err(e) = self.git.push_atomic(&self.remote, name) {
            // Leave no local tag behind so a retry can create it again.
            if let Err(cleanup) = self.git.delete_tag(name) {
                warn!(%cleanup, tag = name, "failed to remove local tag after push failure");
            }
            return Err(match e {
                GitError::Command { ref stderr, .. } if stderr.contains("already exists") => {
                    RemoteError::Conflict(format!("tag {name} already exists on {}", self.remote))
                }
                other => unavailable(other),
            });
        }

        info!(tag = name, commit = target, "tag pushed");
        Ok(TagRef {
            name: name.to_string(),
            commit: target.to_string(),
            date: Some(Utc::now()),
        })
    }

    #[instrument(skip(self, body), fields(draft = self.draft))]
    fn create_release(&mut self, tag: &str, title: &str, body: &str) -> RemoteResult<ReleaseRef> {
        let endpoint = self.endpoint("releases");
        let tag_field = format!("tag_name={tag}");
        let name_field = format!("name={title}");
        let body_field = format!("body={body}");
        let draft_field = format!("draft={}", self.draft);

        let result = self.api(&[
            "--method",
            "POST",
            &endpoint,
            "-f",
            &tag_field,
            "-f",
            &name_field,
            "-f",
            &body_field,
            "-F",
            &draft_field,
            "--jq",
            ".html_url",
        ]);

        match result {
            Ok(url) => {
                let url = url.trim().to_string();
                info!(%tag, %url, "release published");
                Ok(ReleaseRef {
                    tag: tag.to_string(),
                    url: (!url.is_empty()).then_some(url),
                })
            }
            Err(GhError::Http {
                status: Some(422),
                ref body,
                ..
            }) if body.contains("already_exists") => Err(RemoteError::Conflict(format!(
                "release for {tag} already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists releases instead of `releases/tags/{tag}`, which hides drafts.
    #[instrument(skip(self))]
    fn find_release(&self, tag: &str) -> RemoteResult<Option<ReleaseRef>> {
        let endpoint = self.endpoint("releases?per_page=100");
        let output = self.api(&["--paginate", &endpoint, "--jq", ".[]"])?;
        let releases = parse_stream::<ApiRelease>(&output)
            .map_err(|e| RemoteError::Unavailable(format!("unexpected releases payload: {e}")))?;
        let found = release_for_tag(releases, tag);
        debug!(%tag, found = found.is_some(), "looked up release");
        Ok(found)
    }

    #[instrument(skip(self))]
    fn version_milestone(&self, tag: &str) -> RemoteResult<Option<Milestone>> {
        let endpoint = self.endpoint("milestones?state=open&per_page=100");
        let output = self.api(&["--paginate", &endpoint, "--jq", ".[]"])?;
        let milestones = parse_stream::<ApiMilestone>(&output)
            .map_err(|e| RemoteError::Unavailable(format!("unexpected milestones payload: {e}")))?;
        Ok(milestone_for_tag(milestones, tag))
    }

    #[instrument(skip(self))]
    fn close_milestone(&mut self, number: u64) -> RemoteResult<()> {
        let endpoint = self.endpoint(&format!("milestones/{number}"));
        self.api(&["--method", "PATCH", &endpoint, "-f", "state=closed", "--silent"])?;
        info!(number, "milestone closed");
        Ok(())
    }
}

// ──────────────────────────────────────────────
// gh plumbing
// ──────────────────────────────────────────────

#[derive(Debug)]
enum GhError {
    Unavailable(String),
    Http {
        status: Option<u16>,
        body: String,
        stderr: String,
    },
}

impl From<GhError> for RemoteError {
    fn from(e: GhError) -> Self {
        match e {
            GhError::Unavailable(msg) => Self::Unavailable(msg),
            GhError::Http {
                status: Some(status),
                stderr,
                ..
            } => Self::Unavailable(format!("GitHub API returned HTTP {status}: {stderr}")),
            GhError::Http { stderr, .. } => Self::Unavailable(stderr),
        }
    }
}

fn unavailable(e: GitError) -> RemoteError {
    RemoteError::Unavailable(e.to_string())
}

/// Extract the status from gh's `gh: Not Found (HTTP 404)` error line.
fn http_status(stderr: &str) -> Option<u16> {
    let start = stderr.rfind("(HTTP ")? + "(HTTP ".len();
    let digits: String = stderr[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    html_url: String,
    closed_at: Option<DateTime<Utc>>,
    pull_request: Option<ApiPullLink>,
}

#[derive(Debug, Deserialize)]
struct ApiPullLink {
    html_url: Option<String>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    html_url: Option<String>,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct ApiMilestone {
    number: u64,
    title: String,
    state: String,
    open_issues: u64,
}

/// Parse a stream of JSON objects (one per item) as printed by `--jq '.[]'`.
fn parse_stream<T: serde::de::DeserializeOwned>(output: &str) -> serde_json::Result<Vec<T>> {
    serde_json::Deserializer::from_str(output)
        .into_iter::<T>()
        .collect()
}

fn parse_issue_stream(output: &str) -> serde_json::Result<Vec<ApiIssue>> {
    parse_stream(output)
}

fn release_for_tag(releases: Vec<ApiRelease>, tag: &str) -> Option<ReleaseRef> {
    releases
        .into_iter()
        .find(|r| r.tag_name == tag)
        .map(|r| {
            if r.draft {
                debug!(%tag, "release exists as a draft");
            }
            ReleaseRef {
                tag: r.tag_name,
                url: r.html_url.filter(|url| !url.is_empty()),
            }
        })
}

fn milestone_for_tag(milestones: Vec<ApiMilestone>, tag: &str) -> Option<Milestone> {
    milestones
        .into_iter()
        .find(|m| m.title == tag && m.state == "open")
        .map(|m| Milestone {
            number: m.number,
            title: m.title,
            open_issues: m.open_issues,
        })
}

/// Separate issues from merged pull requests, dropping anything closed at
/// or before `cutoff` and pull requests closed without merging.
fn split_closed_work(mut items: Vec<ApiIssue>, cutoff: Option<DateTime<Utc>>) -> ClosedWork {
    items.sort_by_key(|item| item.number);
    let after_cutoff = |at: Option<DateTime<Utc>>| match (at, cutoff) {
        (Some(at), Some(cutoff)) => at > cutoff,
        (Some(_), None) => true,
        (None, _) => false,
    };

    let mut work = ClosedWork::default();
    for item in items {
        match item.pull_request {
            Some(pr) => {
                if after_cutoff(pr.merged_at) {
                    work.pull_requests.push(PullRequestRef {
                        id: item.number,
                        title: item.title,
                        url: pr.html_url.unwrap_or(item.html_url),
                    });
                }
            }
            None => {
                if after_cutoff(item.closed_at) {
                    work.issues.push(IssueRef {
                        id: item.number,
                        title: item.title,
                        url: item.html_url,
                    });
                }
            }
        }
    }
    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use tempfile::TempDir;

    const STREAM: &str = r#"
{"number":7,"title":"Fix crash","html_url":"https://github.com/acme/widgets/issues/7","closed_at":"2024-04-10T12:00:00Z","pull_request":null}
{"number":3,"title":"Old bug","html_url":"https://github.com/acme/widgets/issues/3","closed_at":"2024-01-01T00:00:00Z"}
{"number":9,"title":"Add feature","html_url":"https://github.com/acme/widgets/issues/9","closed_at":"2024-04-11T00:00:00Z","pull_request":{"html_url":"https://github.com/acme/widgets/pull/9","merged_at":"2024-04-11T00:00:00Z"}}
{"number":8,"title":"Abandoned","html_url":"https://github.com/acme/widgets/issues/8","closed_at":"2024-04-11T00:00:00Z","pull_request":{"html_url":"https://github.com/acme/widgets/pull/8","merged_at":null}}
{"number":5,"title":"Another fix","html_url":"https://github.com/acme/widgets/issues/5","closed_at":"2024-04-09T00:00:00Z"}
"#;

    fn cutoff() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn http_status_from_gh_stderr() {
        assert_eq!(http_status("gh: Not Found (HTTP 404)"), Some(404));
        assert_eq!(
            http_status("gh: Validation Failed (HTTP 422)\nmore"),
            Some(422)
        );
        assert_eq!(http_status("error connecting to api.github.com"), None);
    }

    #[test]
    fn parses_jq_object_stream() {
        let items = parse_issue_stream(STREAM).unwrap();
        assert_eq!(items.len(), 5);
        assert!(parse_issue_stream("").unwrap().is_empty());
        assert!(parse_issue_stream("{not json").is_err());
    }

    #[test]
    fn split_filters_by_cutoff_and_merge() {
        let work = split_closed_work(parse_issue_stream(STREAM).unwrap(), Some(cutoff()));

        let issues: Vec<u64> = work.issues.iter().map(|i| i.id).collect();
        assert_eq!(issues, vec![5, 7]);

        assert_eq!(work.pull_requests.len(), 1);
        assert_eq!(work.pull_requests[0].id, 9);
        assert_eq!(
            work.pull_requests[0].url,
            "https://github.com/acme/widgets/pull/9"
        );
    }

    #[test]
    fn split_without_cutoff_keeps_everything_closed() {
        let work = split_closed_work(parse_issue_stream(STREAM).unwrap(), None);
        let issues: Vec<u64> = work.issues.iter().map(|i| i.id).collect();
        assert_eq!(issues, vec![3, 5, 7]);
        assert_eq!(work.pull_requests.len(), 1);
    }

    #[test]
    fn draft_releases_are_found_by_tag() {
        let stream = r#"
{"tag_name":"v0.3.0","html_url":"https://github.com/acme/widgets/releases/tag/untagged-1f2e","draft":true}
{"tag_name":"v0.2.0","html_url":"https://github.com/acme/widgets/releases/tag/v0.2.0","draft":false}
"#;
        let draft = release_for_tag(parse_stream(stream).unwrap(), "v0.3.0").unwrap();
        assert_eq!(draft.tag, "v0.3.0");
        assert_eq!(
            draft.url.as_deref(),
            Some("https://github.com/acme/widgets/releases/tag/untagged-1f2e")
        );
        assert!(release_for_tag(parse_stream(stream).unwrap(), "v0.2.0").is_some());
        assert!(release_for_tag(parse_stream(stream).unwrap(), "v0.4.0").is_none());
        assert!(release_for_tag(Vec::new(), "v0.3.0").is_none());
    }

    #[test]
    fn milestone_matches_open_title_only() {
        let stream = r#"
{"number":4,"title":"v0.2.0","state":"closed","open_issues":0}
{"number":6,"title":"v0.2.0","state":"open","open_issues":3}
{"number":7,"title":"Backlog","state":"open","open_issues":40}
"#;
        let milestone = milestone_for_tag(parse_stream(stream).unwrap(), "v0.2.0").unwrap();
        assert_eq!(
            milestone,
            Milestone {
                number: 6,
                title: "v0.2.0".into(),
                open_issues: 3,
            }
        );
        assert!(milestone_for_tag(parse_stream(stream).unwrap(), "v0.3.0").is_none());
    }

    #[test]
    fn gh_errors_become_unavailable() {
        let err: RemoteError = GhError::Http {
            status: Some(502),
            body: String::new(),
            stderr: "gh: Bad Gateway (HTTP 502)".into(),
        }
        .into();
        assert!(matches!(err, RemoteError::Unavailable(ref m) if m.contains("502")));
    }

    #[test]
    fn web_url_from_owner_and_repo() {
        let gw = GitHubGateway::new(Git::new("."), "origin", "acme", "widgets");
        assert_eq!(gw.web_url(), "https://github.com/acme/widgets");
    }

    // ── Tag creation against a local bare remote ──

    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?}: {status:?}");
    }

    fn repo_with_remote() -> (TempDir, Git) {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("origin.git");
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        run(&origin, &["init", "--quiet", "--bare"]);
        run(&work, &["init", "--quiet", "--initial-branch=main"]);
        run(&work, &["config", "user.email", "dev@example.com"]);
        run(&work, &["config", "user.name", "Dev"]);
        run(&work, &["config", "commit.gpgsign", "false"]);
        run(&work, &["config", "tag.gpgsign", "false"]);
        run(&work, &["remote", "add", "origin", origin.to_str().unwrap()]);
        std::fs::write(work.join("VERSION"), "0.1.0\n").unwrap();
        run(&work, &["add", "VERSION"]);
        run(&work, &["commit", "--quiet", "-m", "init"]);

        let git = Git::new(Utf8Path::from_path(&work).unwrap());
        (tmp, git)
    }

    #[test]
    fn create_tag_pushes_and_then_conflicts() {
        let (_tmp, git) = repo_with_remote();
        let head = git.head().unwrap();
        let mut gw = GitHubGateway::new(git.clone(), "origin", "acme", "widgets");

        let tag = gw.create_tag("v0.1.0", &head, "The v0.1.0 release").unwrap();
        assert_eq!(tag.name, "v0.1.0");
        assert_eq!(tag.commit, head);

        let remote = git.remote_tags("origin").unwrap();
        assert_eq!(remote, vec![(head.clone(), "v0.1.0".to_string())]);

        let again = gw.create_tag("v0.1.0", &head, "again").unwrap_err();
        assert!(matches!(again, RemoteError::Conflict(_)));
    }

    #[test]
    fn create_tag_conflicts_with_remote_only_tag() {
        let (_tmp, git) = repo_with_remote();
        let head = git.head().unwrap();
        git.create_annotated_tag("v0.2.0", &head, "elsewhere").unwrap();
        git.push_atomic("origin", "v0.2.0").unwrap();
        git.delete_tag("v0.2.0").unwrap();

        let mut gw = GitHubGateway::new(git.clone(), "origin", "acme", "widgets");
        let err = gw.create_tag("v0.2.0", &head, "mine").unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(ref m) if m.contains("origin")));
        assert!(!git.tag_exists("v0.2.0").unwrap());
    }

    #[test]
    fn unknown_remote_is_unavailable() {
        let (_tmp, git) = repo_with_remote();
        let head = git.head().unwrap();
        let mut gw = GitHubGateway::new(git.clone(), "nowhere", "acme", "widgets");

        let err = gw.create_tag("v0.3.0", &head, "msg").unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert!(!git.tag_exists("v0.3.0").unwrap());
    }

    #[test]
    fn rejected_push_removes_local_tag() {
        use std::os::unix::fs::PermissionsExt;

        let (tmp, git) = repo_with_remote();
        let hook = tmp.path().join("origin.git").join("hooks").join("pre-receive");
        std::fs::write(&hook, "#!/bin/sh\necho denied >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let head = git.head().unwrap();
        let mut gw = GitHubGateway::new(git.clone(), "origin", "acme", "widgets");
        let err = gw.create_tag("v0.3.0", &head, "msg").unwrap_err();

        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert!(!git.tag_exists("v0.3.0").unwrap());
        assert!(git.remote_tags("origin").unwrap().is_empty());
    }

    #[test]
    fn latest_tag_uses_local_commit_date() {
        let (_tmp, git) = repo_with_remote();
        let head = git.head().unwrap();
        let mut gw = GitHubGateway::new(git, "origin", "acme", "widgets");
        gw.create_tag("v0.1.0", &head, "first").unwrap();

        let latest = gw.latest_tag().unwrap().unwrap();
        assert_eq!(latest.name, "v0.1.0");
        assert_eq!(latest.commit, head);
        assert!(latest.date.is_some());
    }
}
