//! The local checkout a release is cut from.
//!
//! A [`Workspace`] owns the changelog document and records the release
//! commit. [`GitWorkspace`] is backed by files in a git working tree.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::git::{Git, GitError};
use crate::store::write_atomic;

/// Errors from the local workspace.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// Reading or writing a workspace file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The commit could not be created.
    #[error("commit failed: {0}")]
    Commit(#[from] GitError),

    /// The workspace refused to record the commit.
    #[error("commit rejected: {0}")]
    Rejected(String),
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// A commit in the local history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    /// Full commit id.
    pub id: String,
    /// Commit message, without trailing newlines.
    pub message: String,
}

/// Local changelog document plus commit access.
pub trait Workspace {
    /// The current changelog. A missing changelog reads as `""`.
    fn read_changelog(&self) -> WorkspaceResult<String>;

    /// Replace the changelog with `document`.
    fn write_changelog(&mut self, document: &str) -> WorkspaceResult<()>;

    /// Commit `paths` with `message` and return the commit id.
    fn commit(&mut self, message: &str, paths: &[&str]) -> WorkspaceResult<String>;

    /// The commit checked out, or `None` when there is none yet.
    fn head_commit(&self) -> WorkspaceResult<Option<CommitRef>>;

    /// Path of the changelog, as committed.
    fn changelog_path(&self) -> &str;
}

/// A workspace backed by a git working tree.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    git: Git,
    changelog: String,
}

impl GitWorkspace {
    /// Use the working tree at `git.root()`, with the changelog at
    /// `changelog` relative to it.
    pub fn new(git: Git, changelog: impl Into<String>) -> Self {
        Self {
            git,
            changelog: changelog.into(),
        }
    }

    /// Absolute path of the changelog file.
    pub fn changelog_file(&self) -> Utf8PathBuf {
        self.git.root().join(&self.changelog)
    }

    /// Root of the working tree.
    pub fn root(&self) -> &Utf8Path {
        self.git.root()
    }
}

impl Workspace for GitWorkspace {
    fn read_changelog(&self) -> WorkspaceResult<String> {
        let path = self.changelog_file();
        match std::fs::read_to_string(&path) {
            Ok(document) => Ok(document),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%path, "no changelog yet");
                Ok(String::new())
            }
            Err(source) => Err(WorkspaceError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }

    #[instrument(skip(self, document), fields(path = %self.changelog, bytes = document.len()))]
    fn write_changelog(&mut self, document: &str) -> WorkspaceResult<()> {
        let path = self.changelog_file();
        write_atomic(&path, document).map_err(|source| WorkspaceError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn commit(&mut self, message: &str, paths: &[&str]) -> WorkspaceResult<String> {
        Ok(self.git.commit_paths(message, paths)?)
    }

    fn head_commit(&self) -> WorkspaceResult<Option<CommitRef>> {
        Ok(self
            .git
            .head_commit()?
            .map(|(id, message)| CommitRef { id, message }))
    }

    fn changelog_path(&self) -> &str {
        &self.changelog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(tmp: &TempDir) -> GitWorkspace {
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        GitWorkspace::new(Git::new(root), "CHANGELOG.md")
    }

    #[test]
    fn missing_changelog_reads_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(workspace(&tmp).read_changelog().unwrap(), "");
    }

    #[test]
    fn write_then_read_changelog() {
        let tmp = TempDir::new().unwrap();
        let mut ws = workspace(&tmp);
        ws.write_changelog("## [v0.1.0]\n").unwrap();
        assert_eq!(ws.read_changelog().unwrap(), "## [v0.1.0]\n");
        assert!(tmp.path().join("CHANGELOG.md").is_file());
    }

    #[test]
    fn changelog_in_subdirectory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let mut ws = GitWorkspace::new(Git::new(root), "docs/CHANGES.md");
        ws.write_changelog("x\n").unwrap();
        assert_eq!(ws.changelog_path(), "docs/CHANGES.md");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("docs/CHANGES.md")).unwrap(),
            "x\n"
        );
    }

    #[test]
    fn no_head_commit_outside_repo() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(workspace(&tmp).head_commit().unwrap(), None);
    }

    #[test]
    fn commit_outside_repo_fails() {
        let tmp = TempDir::new().unwrap();
        let mut ws = workspace(&tmp);
        ws.write_changelog("x\n").unwrap();
        assert!(matches!(
            ws.commit("Release", &["CHANGELOG.md"]),
            Err(WorkspaceError::Commit(_))
        ));
    }
}
