//! The remote hosting a repository's tags and releases.
//!
//! [`RemoteGateway`] is the narrow interface the release orchestrator needs
//! from the hosting service. [`crate::github::GitHubGateway`] implements it
//! over `git` and `gh`; [`crate::memory::MemoryRemote`] implements it in
//! memory for tests.
//!
//! Milestones follow a naming convention: the open milestone titled with a
//! release tag (`v1.2.3`) collects the issues planned for that release.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;
use thiserror::Error;

use crate::changelog::{IssueRef, PullRequestRef};
use crate::version::version_from_tag;

/// Errors from the remote.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote could not be reached, timed out, or answered with an error.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The requested tag or release already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RemoteError {
    /// The message without the error kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Unavailable(detail) | Self::Conflict(detail) => detail,
        }
    }
}

/// Result alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A tag on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    /// Tag name (e.g. `v1.2.3`).
    pub name: String,
    /// Commit the tag points to.
    pub commit: String,
    /// When the tagged commit was made, if known.
    pub date: Option<DateTime<Utc>>,
}

impl TagRef {
    /// The release version this tag names, if it is a `vX.Y.Z` tag.
    pub fn version(&self) -> Option<Version> {
        version_from_tag(&self.name)
    }
}

/// A published release entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRef {
    /// Tag the release is attached to.
    pub tag: String,
    /// Web URL of the release page, if the remote reports one.
    pub url: Option<String>,
}

/// An open milestone on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    /// Milestone number, used to close it.
    pub number: u64,
    /// Milestone title (e.g. `v1.2.3`).
    pub title: String,
    /// Issues in the milestone that are still open.
    pub open_issues: u64,
}

/// Issues and pull requests closed since a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClosedWork {
    /// Closed issues, in remote order.
    pub issues: Vec<IssueRef>,
    /// Merged pull requests, in remote order.
    pub pull_requests: Vec<PullRequestRef>,
}

/// Operations against the hosting remote.
pub trait RemoteGateway {
    /// The highest `vX.Y.Z` tag on the remote, or `None` if there are none.
    fn latest_tag(&self) -> RemoteResult<Option<TagRef>>;

    /// Issues closed and pull requests merged after `since`.
    ///
    /// `None` means everything (first release).
    fn closed_since(&self, since: Option<&TagRef>) -> RemoteResult<ClosedWork>;

    /// Create `name` at `target` on the remote.
    ///
    /// Fails with [`RemoteError::Conflict`] if the tag already exists.
    fn create_tag(&mut self, name: &str, target: &str, message: &str) -> RemoteResult<TagRef>;

    /// Publish a release entry for an existing tag.
    fn create_release(&mut self, tag: &str, title: &str, body: &str) -> RemoteResult<ReleaseRef>;

    /// The release entry for `tag`, if one has been published. Drafts count.
    fn find_release(&self, tag: &str) -> RemoteResult<Option<ReleaseRef>>;

    /// The open milestone titled `tag`, if there is one.
    fn version_milestone(&self, tag: &str) -> RemoteResult<Option<Milestone>>;

    /// Close milestone `number`.
    fn close_milestone(&mut self, number: u64) -> RemoteResult<()>;
}

/// Pick the highest release tag from a list of tags.
///
/// Tags that are not `vX.Y.Z` are ignored.
pub fn highest_release_tag<I>(tags: I) -> Option<TagRef>
where
    I: IntoIterator<Item = TagRef>,
{
    tags.into_iter()
        .filter_map(|tag| tag.version().map(|v| (v, tag)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag)
}
