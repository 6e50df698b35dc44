//! Command implementations

pub mod changelog;

pub mod doctor;

pub mod info;

pub mod preflight;

pub mod release;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use tracing::debug;

use ghship_core::config::Config;
use ghship_core::git::{Git, parse_owner_repo};
use ghship_core::github::GitHubGateway;
use ghship_core::hooks::HookRunner;
use ghship_core::release::{ReleaseOrchestrator, ReleaseSettings};
use ghship_core::store::FileVersionStore;
use ghship_core::workspace::GitWorkspace;

/// A release orchestrator wired to the local checkout and GitHub.
pub type GitHubRelease = ReleaseOrchestrator<FileVersionStore, GitWorkspace, GitHubGateway>;

/// The repository a command operates on.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Git access rooted at the top of the working tree.
    pub git: Git,
    /// Git remote releases are pushed to.
    pub remote: String,
    /// GitHub owner.
    pub owner: String,
    /// GitHub repository name.
    pub name: String,
}

impl Repository {
    /// Locate the working tree containing `cwd` and work out where it is
    /// hosted. Config values win over what the remote URL says.
    pub fn discover(config: &Config, cwd: &Utf8Path) -> anyhow::Result<Self> {
        let root = Git::new(cwd)
            .toplevel()
            .context("not inside a git repository")?;
        let git = Git::new(root);
        let remote = config.remote_name().to_string();

        let parsed = git
            .remote_url(&remote)
            .context("failed to read git remote")?
            .as_deref()
            .and_then(parse_owner_repo);
        let owner = config
            .owner()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().map(|(owner, _)| owner.clone()));
        let name = config
            .repo_name()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().map(|(_, name)| name.clone()));

        let (Some(owner), Some(name)) = (owner, name) else {
            bail!(
                "cannot tell which GitHub repository to release to; \
                 add a '{remote}' remote or set [repository] owner and name"
            );
        };
        debug!(root = %git.root(), %owner, %name, %remote, "repository resolved");

        Ok(Self {
            git,
            remote,
            owner,
            name,
        })
    }

    /// Root of the working tree.
    pub fn root(&self) -> &Utf8Path {
        self.git.root()
    }

    /// Absolute path of the version file.
    pub fn version_file(&self, config: &Config) -> Utf8PathBuf {
        self.root().join(config.version_file())
    }
}

/// Release settings from config, dated today, with an optional
/// description override from the command line.
pub fn release_settings(
    config: &Config,
    repository: &Repository,
    description: Option<String>,
) -> ReleaseSettings {
    let mut settings = ReleaseSettings::new(
        &repository.owner,
        &repository.name,
        Utc::now().date_naive(),
    );
    if let Some(url) = config.web_url() {
        settings.web_url = url.to_string();
    }
    if let Some(release) = config.release.as_ref() {
        if let Some(ref title) = release.title {
            settings.title.clone_from(title);
        }
        if let Some(ref description) = release.description {
            settings.description.clone_from(description);
        }
        if let Some(ref message) = release.commit_message {
            settings.commit_message.clone_from(message);
        }
    }
    if let Some(description) = description {
        settings.description = description;
    }
    settings
}

/// Wire an orchestrator to the version file, the changelog, GitHub, and
/// the configured hooks.
pub fn github_release(
    config: &Config,
    repository: &Repository,
    description: Option<String>,
) -> GitHubRelease {
    let store = FileVersionStore::new(repository.version_file(config));
    let workspace = GitWorkspace::new(repository.git.clone(), config.changelog_file().as_str());
    let gateway = GitHubGateway::new(
        repository.git.clone(),
        &repository.remote,
        &repository.owner,
        &repository.name,
    )
    .with_draft(config.draft())
    .with_timeout(config.timeout());
    let hooks = HookRunner::new(config.hooks(), repository.root());

    ReleaseOrchestrator::new(
        release_settings(config, repository, description),
        store,
        workspace,
        gateway,
    )
    .with_hooks(hooks)
}
