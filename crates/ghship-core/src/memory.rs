//! In-memory collaborators for driving the release orchestrator without a
//! filesystem, git checkout, or network.
//!
//! Each double records what was asked of it and can be told to fail, so a
//! test can stop a release at any stage and inspect what was left behind.

use semver::Version;

use crate::changelog::{IssueRef, PullRequestRef};
use crate::remote::{
    ClosedWork, Milestone, ReleaseRef, RemoteError, RemoteGateway, RemoteResult, TagRef,
    highest_release_tag,
};
use crate::store::{StoreError, StoreResult, VersionStore};
use crate::workspace::{CommitRef, Workspace, WorkspaceError, WorkspaceResult};

const WEB_URL: &str = "https://github.com/acme/widgets";

// ──────────────────────────────────────────────
// Version store
// ──────────────────────────────────────────────

/// A version record held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryVersionStore {
    version: Option<Version>,
    fail_persist: bool,
}

impl MemoryVersionStore {
    /// A store holding `version`.
    pub const fn new(version: Version) -> Self {
        Self {
            version: Some(version),
            fail_persist: false,
        }
    }

    /// A store with no record.
    pub const fn empty() -> Self {
        Self {
            version: None,
            fail_persist: false,
        }
    }

    /// Make every `persist` fail.
    #[must_use]
    pub const fn failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    /// The stored version, if any.
    pub const fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }
}

impl VersionStore for MemoryVersionStore {
    fn current(&self) -> StoreResult<Version> {
        self.version
            .clone()
            .ok_or_else(|| StoreError::NotFound(self.location()))
    }

    fn persist(&mut self, version: &Version) -> StoreResult<()> {
        if self.fail_persist {
            return Err(StoreError::Io {
                path: self.location(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.version = Some(version.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory:VERSION".to_string()
    }
}

// ──────────────────────────────────────────────
// Workspace
// ──────────────────────────────────────────────

/// A commit recorded by [`MemoryWorkspace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    /// Commit id handed back to the caller.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// Paths the commit covered.
    pub paths: Vec<String>,
    /// Changelog contents at commit time.
    pub changelog: String,
}

/// A changelog and commit log held in memory.
#[derive(Debug, Clone)]
pub struct MemoryWorkspace {
    changelog: String,
    commits: Vec<MemoryCommit>,
    fail_commit: bool,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    /// A workspace with no changelog.
    pub const fn new() -> Self {
        Self {
            changelog: String::new(),
            commits: Vec::new(),
            fail_commit: false,
        }
    }

    /// A workspace whose changelog already holds `document`.
    pub fn with_changelog(document: impl Into<String>) -> Self {
        Self {
            changelog: document.into(),
            ..Self::new()
        }
    }

    /// Make every `commit` fail.
    #[must_use]
    pub const fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Current changelog contents.
    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    /// Commits made so far, oldest first.
    pub fn commits(&self) -> &[MemoryCommit] {
        &self.commits
    }
}

impl Workspace for MemoryWorkspace {
    fn read_changelog(&self) -> WorkspaceResult<String> {
        Ok(self.changelog.clone())
    }

    fn write_changelog(&mut self, document: &str) -> WorkspaceResult<()> {
        document.clone_into(&mut self.changelog);
        Ok(())
    }

    fn commit(&mut self, message: &str, paths: &[&str]) -> WorkspaceResult<String> {
        if self.fail_commit {
            return Err(WorkspaceError::Rejected("pre-commit hook failed".into()));
        }
        let id = format!("{:040x}", self.commits.len() + 1);
        self.commits.push(MemoryCommit {
            id: id.clone(),
            message: message.to_string(),
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
            changelog: self.changelog.clone(),
        });
        Ok(id)
    }

    fn head_commit(&self) -> WorkspaceResult<Option<CommitRef>> {
        Ok(self.commits.last().map(|c| CommitRef {
            id: c.id.clone(),
            message: c.message.clone(),
        }))
    }

    fn changelog_path(&self) -> &str {
        "CHANGELOG.md"
    }
}

// ──────────────────────────────────────────────
// Remote
// ──────────────────────────────────────────────

/// A release published to [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRelease {
    /// Tag the release is attached to.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Release body.
    pub body: String,
}

/// A hosting remote held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    tags: Vec<TagRef>,
    work: ClosedWork,
    releases: Vec<MemoryRelease>,
    milestones: Vec<Milestone>,
    closed_milestones: Vec<u64>,
    tag_attempts: Vec<String>,
    unavailable: bool,
    tag_failure: Option<RemoteError>,
    release_failure: Option<RemoteError>,
}

impl MemoryRemote {
    /// An empty remote with no tags, issues, or releases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing tag. A release is not created for it.
    #[must_use]
    pub fn with_tag(mut self, name: &str, commit: &str) -> Self {
        self.tags.push(TagRef {
            name: name.to_string(),
            commit: commit.to_string(),
            date: None,
        });
        self
    }

    /// Add an existing tag with a published release.
    #[must_use]
    pub fn with_released_tag(mut self, name: &str, commit: &str) -> Self {
        self = self.with_tag(name, commit);
        self.releases.push(MemoryRelease {
            tag: name.to_string(),
            title: name.to_string(),
            body: String::new(),
        });
        self
    }

    /// Add a closed issue reported for any `closed_since` query.
    #[must_use]
    pub fn with_issue(mut self, id: u64, title: &str) -> Self {
        self.work.issues.push(IssueRef {
            id,
            title: title.to_string(),
            url: format!("{WEB_URL}/issues/{id}"),
        });
        self
    }

    /// Add a merged pull request reported for any `closed_since` query.
    #[must_use]
    pub fn with_pull_request(mut self, id: u64, title: &str) -> Self {
        self.work.pull_requests.push(PullRequestRef {
            id,
            title: title.to_string(),
            url: format!("{WEB_URL}/pull/{id}"),
        });
        self
    }

    /// Add an open milestone titled `title` with `open_issues` still open.
    #[must_use]
    pub fn with_milestone(mut self, title: &str, open_issues: u64) -> Self {
        let number = self.milestones.len() as u64 + 1;
        self.milestones.push(Milestone {
            number,
            title: title.to_string(),
            open_issues,
        });
        self
    }

    /// Make every call fail with [`RemoteError::Unavailable`].
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Make `create_tag` fail with [`RemoteError::Conflict`], as if another
    /// release raced this one to the tag.
    #[must_use]
    pub fn rejecting_tags(self) -> Self {
        let error = RemoteError::Conflict("tag already exists".into());
        self.failing_tags(error)
    }

    /// Make `create_tag` fail with `error` without creating the tag.
    #[must_use]
    pub fn failing_tags(mut self, error: RemoteError) -> Self {
        self.tag_failure = Some(error);
        self
    }

    /// Make `create_release` fail with `error`.
    #[must_use]
    pub fn failing_releases(mut self, error: RemoteError) -> Self {
        self.release_failure = Some(error);
        self
    }

    /// Stop failing calls after construction-time failure injection.
    pub fn recover(&mut self) {
        self.unavailable = false;
        self.tag_failure = None;
        self.release_failure = None;
    }

    /// Tags currently on the remote.
    pub fn tags(&self) -> &[TagRef] {
        &self.tags
    }

    /// Releases published so far.
    pub fn releases(&self) -> &[MemoryRelease] {
        &self.releases
    }

    /// Numbers of the milestones closed so far.
    pub fn closed_milestones(&self) -> &[u64] {
        &self.closed_milestones
    }

    /// Every tag name passed to `create_tag`, including failed attempts.
    pub fn tag_attempts(&self) -> &[String] {
        &self.tag_attempts
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.unavailable {
            return Err(RemoteError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl RemoteGateway for MemoryRemote {
    fn latest_tag(&self) -> RemoteResult<Option<TagRef>> {
        self.check_available()?;
        Ok(highest_release_tag(self.tags.iter().cloned()))
    }

    fn closed_since(&self, _since: Option<&TagRef>) -> RemoteResult<ClosedWork> {
        self.check_available()?;
        Ok(self.work.clone())
    }

    fn create_tag(&mut self, name: &str, target: &str, _message: &str) -> RemoteResult<TagRef> {
        self.tag_attempts.push(name.to_string());
        self.check_available()?;
        match self.tag_failure {
            Some(RemoteError::Conflict(_)) => {
                return Err(RemoteError::Conflict(format!("tag {name} already exists")));
            }
            Some(ref error) => return Err(error.clone()),
            None => {}
        }
        if self.tags.iter().any(|t| t.name == name) {
            return Err(RemoteError::Conflict(format!("tag {name} already exists")));
        }
        let tag = TagRef {
            name: name.to_string(),
            commit: target.to_string(),
            date: None,
        };
        self.tags.push(tag.clone());
        Ok(tag)
    }

    fn create_release(&mut self, tag: &str, title: &str, body: &str) -> RemoteResult<ReleaseRef> {
        self.check_available()?;
        if let Some(ref error) = self.release_failure {
            return Err(error.clone());
        }
        if self.releases.iter().any(|r| r.tag == tag) {
            return Err(RemoteError::Conflict(format!("release {tag} already exists")));
        }
        self.releases.push(MemoryRelease {
            tag: tag.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(ReleaseRef {
            tag: tag.to_string(),
            url: Some(format!("{WEB_URL}/releases/tag/{tag}")),
        })
    }

    fn find_release(&self, tag: &str) -> RemoteResult<Option<ReleaseRef>> {
        self.check_available()?;
        Ok(self
            .releases
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| ReleaseRef {
                tag: r.tag.clone(),
                url: Some(format!("{WEB_URL}/releases/tag/{}", r.tag)),
            }))
    }

    fn version_milestone(&self, tag: &str) -> RemoteResult<Option<Milestone>> {
        self.check_available()?;
        Ok(self
            .milestones
            .iter()
            .find(|m| m.title == tag && !self.closed_milestones.contains(&m.number))
            .cloned())
    }

    fn close_milestone(&mut self, number: u64) -> RemoteResult<()> {
        self.check_available()?;
        if !self.milestones.iter().any(|m| m.number == number) {
            return Err(RemoteError::Unavailable(format!("milestone {number} not found")));
        }
        self.closed_milestones.push(number);
        Ok(())
    }
}
