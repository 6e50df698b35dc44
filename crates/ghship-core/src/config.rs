//! Layered configuration.
//!
//! Settings are merged from, lowest precedence first:
//! 1. built-in defaults
//! 2. the user config, `~/.config/ghship/config.<ext>`
//! 3. the project config, `.ghship.<ext>` or `ghship.<ext>` in the working
//!    directory or a parent, stopping at the repository root
//! 4. files passed explicitly (`--config`)
//!
//! `<ext>` is one of `toml`, `yaml`, `yml`, `json`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use ghship_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();
//! let config = ConfigLoader::new().with_project_search(&cwd).load().unwrap();
//! println!("releasing from {}", config.remote_name());
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
pub use crate::hooks::HooksConfig;

/// Default git remote releases are pushed to.
pub const DEFAULT_REMOTE: &str = "origin";
/// Default version file, relative to the repository root.
pub const DEFAULT_VERSION_FILE: &str = "VERSION";
/// Default changelog file, relative to the repository root.
pub const DEFAULT_CHANGELOG_FILE: &str = "CHANGELOG.md";
/// Default limit for a single remote call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The configuration for ghship.
///
/// Every section is optional. Repository coordinates fall back to what the
/// git remote URL says.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level (`debug`, `info`, `warn`, `error`).
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Where the repository lives.
    pub repository: Option<RepositoryConfig>,
    /// How releases are made.
    pub release: Option<ReleaseConfig>,
    /// Shell commands per hook point.
    pub hooks: Option<HooksConfig>,
}

/// Repository coordinates.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// GitHub owner (user or organisation).
    pub owner: Option<String>,
    /// GitHub repository name.
    pub name: Option<String>,
    /// Git remote to push to (default: `origin`).
    pub remote: Option<String>,
    /// Base URL for changelog links (default: `https://github.com/<owner>/<name>`).
    pub web_url: Option<String>,
    /// Branch releases are cut from (default: auto-detect `main` or `master`).
    pub release_branch: Option<String>,
}

/// Release settings.
///
/// `title`, `description` and `commit_message` are templates supporting
/// `{version}`, `{prev_version}`, `{tag}`, `{owner}` and `{repo}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Version file (default: `VERSION`).
    pub version_file: Option<Utf8PathBuf>,
    /// Changelog file (default: `CHANGELOG.md`).
    pub changelog_file: Option<Utf8PathBuf>,
    /// Description written under the changelog heading and into the tag message.
    pub description: Option<String>,
    /// Release entry title (default: the bare version).
    pub title: Option<String>,
    /// Commit message for the release commit.
    pub commit_message: Option<String>,
    /// Publish the release entry as a draft (default: `false`).
    pub draft: Option<bool>,
    /// Ask before making any change (default: `true`).
    ///
    /// The `--yes` flag overrides this at runtime.
    pub confirm: Option<bool>,
    /// Seconds before a remote call is abandoned (default: 60).
    pub timeout_secs: Option<u64>,
}

impl Config {
    fn repository_field<'a>(
        &'a self,
        pick: impl Fn(&'a RepositoryConfig) -> Option<&'a String>,
    ) -> Option<&'a str> {
        self.repository.as_ref().and_then(pick).map(String::as_str)
    }

    fn release_field<'a, T>(
        &'a self,
        pick: impl Fn(&'a ReleaseConfig) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.release.as_ref().and_then(pick)
    }

    /// Configured repository owner.
    pub fn owner(&self) -> Option<&str> {
        self.repository_field(|r| r.owner.as_ref())
    }

    /// Configured repository name.
    pub fn repo_name(&self) -> Option<&str> {
        self.repository_field(|r| r.name.as_ref())
    }

    /// Configured web URL for changelog links.
    pub fn web_url(&self) -> Option<&str> {
        self.repository_field(|r| r.web_url.as_ref())
    }

    /// Configured release branch.
    pub fn release_branch(&self) -> Option<&str> {
        self.repository_field(|r| r.release_branch.as_ref())
    }

    /// Git remote name.
    pub fn remote_name(&self) -> &str {
        self.repository_field(|r| r.remote.as_ref())
            .unwrap_or(DEFAULT_REMOTE)
    }

    /// Version file, relative to the repository root.
    pub fn version_file(&self) -> &Utf8Path {
        self.release_field(|r| r.version_file.as_ref())
            .map_or(Utf8Path::new(DEFAULT_VERSION_FILE), Utf8PathBuf::as_path)
    }

    /// Changelog file, relative to the repository root.
    pub fn changelog_file(&self) -> &Utf8Path {
        self.release_field(|r| r.changelog_file.as_ref())
            .map_or(Utf8Path::new(DEFAULT_CHANGELOG_FILE), Utf8PathBuf::as_path)
    }

    /// Whether to publish drafts.
    pub fn draft(&self) -> bool {
        self.release_field(|r| r.draft.as_ref()).copied().unwrap_or(false)
    }

    /// Whether to ask before releasing.
    pub fn confirm(&self) -> bool {
        self.release_field(|r| r.confirm.as_ref()).copied().unwrap_or(true)
    }

    /// Limit for a single remote call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.release_field(|r| r.timeout_secs.as_ref())
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Configured hooks, or none.
    pub fn hooks(&self) -> HooksConfig {
        self.hooks.clone().unwrap_or_default()
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// File extensions tried, in order.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Name used for config files and platform directories.
const APP_NAME: &str = "ghship";

/// Builder that discovers and merges configuration sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// A loader that reads the user config and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Look for a project config in `path` and its parents.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Include or skip `~/.config/ghship/config.<ext>`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the upward search at the first parent containing `marker`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Merge `path` after every discovered file. Later calls win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Merge every source into a [`Config`].
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let sources = self
            .include_user_config
            .then(find_user_config)
            .flatten()
            .into_iter()
            .chain(
                self.project_search_root
                    .as_deref()
                    .and_then(|root| self.find_project_config(root)),
            )
            .chain(self.explicit_files.iter().cloned());

        let figment = sources.fold(
            Figment::new().merge(Serialized::defaults(Config::default())),
            |figment, path| {
                tracing::debug!(%path, "merging config file");
                merge_file(figment, &path)
            },
        );

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            remote = config.remote_name(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Like [`load`](Self::load), but fails with [`ConfigError::NotFound`]
    /// when no file at all was found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let found = !self.explicit_files.is_empty()
            || (self.include_user_config && find_user_config().is_some())
            || self
                .project_search_root
                .as_deref()
                .and_then(|root| self.find_project_config(root))
                .is_some();

        if !found {
            return Err(ConfigError::NotFound);
        }
        self.load()
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
                [
                    dir.join(format!(".{APP_NAME}.{ext}")),
                    dir.join(format!("{APP_NAME}.{ext}")),
                ]
                .into_iter()
                .find(|candidate| candidate.is_file())
            });
            if found.is_some() {
                return found;
            }
            // The directory holding the marker is the last one searched.
            if let Some(marker) = &self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }
        }
        None
    }
}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// The project config [`ConfigLoader::load`] would pick up for `start`.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Platform config directory (`~/.config/ghship` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.config_dir().to_path_buf()).ok()
}

/// Machine-local data directory (`~/.local/share/ghship` on Linux).
///
/// Log files go here when nothing else is configured.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn load(path: &Utf8Path) -> Config {
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(path)
            .load()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.repository.is_none());
        assert_eq!(config.remote_name(), "origin");
        assert_eq!(config.version_file().as_str(), "VERSION");
        assert_eq!(config.changelog_file().as_str(), "CHANGELOG.md");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.confirm());
        assert!(!config.draft());
    }

    #[test]
    fn loads_with_no_files() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write(&tmp, "base.toml", r#"log_level = "warn""#);
        let over = write(&tmp, "override.toml", r#"log_level = "error""#);

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base)
            .with_file(&over)
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn project_config_found_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("project").join("src").join("deep");
        fs::create_dir_all(&deep).unwrap();
        fs::write(
            tmp.path().join("project").join(".ghship.toml"),
            "[repository]\nremote = \"upstream\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(Utf8PathBuf::try_from(deep).unwrap())
            .load()
            .unwrap();
        assert_eq!(config.remote_name(), "upstream");
    }

    #[test]
    fn boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir(child.join(".git")).unwrap();
        fs::write(parent.join("ghship.toml"), r#"log_level = "warn""#).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(Utf8PathBuf::try_from(work).unwrap())
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn config_at_repository_root_is_found_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        write(&tmp, ".ghship.toml", r#"log_level = "debug""#);

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(Utf8PathBuf::try_from(src).unwrap())
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn explicit_file_beats_project_config() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, ".ghship.toml", r#"log_level = "warn""#);
        let over = write(&tmp, "override.toml", r#"log_level = "error""#);

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap())
            .with_file(&over)
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn load_or_error_without_any_file() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn repository_section() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "config.toml",
            r#"
[repository]
owner = "acme"
name = "widgets"
web_url = "https://git.example.com/acme/widgets"
release_branch = "trunk"
"#,
        );
        let config = load(&path);
        assert_eq!(config.owner(), Some("acme"));
        assert_eq!(config.repo_name(), Some("widgets"));
        assert_eq!(config.web_url(), Some("https://git.example.com/acme/widgets"));
        assert_eq!(config.release_branch(), Some("trunk"));
        assert_eq!(config.remote_name(), "origin");
    }

    #[test]
    fn release_section() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "config.toml",
            r#"
[release]
version_file = "meta/VERSION"
changelog_file = "docs/CHANGES.md"
title = "{repo} {tag}"
draft = true
confirm = false
timeout_secs = 5
"#,
        );
        let config = load(&path);
        assert_eq!(config.version_file().as_str(), "meta/VERSION");
        assert_eq!(config.changelog_file().as_str(), "docs/CHANGES.md");
        assert_eq!(
            config.release.as_ref().and_then(|r| r.title.as_deref()),
            Some("{repo} {tag}")
        );
        assert!(config.draft());
        assert!(!config.confirm());
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn hooks_section() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "config.toml",
            r#"
[hooks]
post_changelog = ["npx prettier --write {changelog_path}"]
post_release = ["echo one", "echo two"]
"#,
        );
        let hooks = load(&path).hooks();
        assert_eq!(hooks.post_release.as_ref().map(Vec::len), Some(2));
        assert!(hooks.pre_release.is_none());
    }

    #[test]
    fn yaml_and_json_files() {
        let tmp = TempDir::new().unwrap();
        let yaml = write(&tmp, "config.yaml", "repository:\n  remote: fork\n");
        assert_eq!(load(&yaml).remote_name(), "fork");

        let json = write(&tmp, "config.json", r#"{"release": {"draft": true}}"#);
        assert!(load(&json).draft());
    }

    #[test]
    fn invalid_value_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "config.toml", r#"log_level = "loud""#);
        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&path)
            .load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn user_config_dir_names_the_app() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("ghship"));
        }
    }
}
