//! Release orchestrator: the state machine behind `ghship release`.
//!
//! A release walks through five stages, each one entered only after the
//! previous has completed:
//!
//! ```text
//! Idle → VersionResolved → ChangelogRendered → LocalCommitted → TagCreated → ReleasePublished
//! ```
//!
//! Any stage can end in `Failed(stage, cause)`. Nothing is rolled back: a
//! failure after `LocalCommitted` leaves the commit in place, and a failure
//! while publishing leaves the tag on the remote.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`ReleaseOrchestrator::plan`]) reads the version record and
//!    the remote and renders the changelog. Nothing is written, so a plan
//!    doubles as a dry run.
//! 2. **Execute** ([`ReleaseOrchestrator::execute`]) persists, commits,
//!    tags, and publishes, reporting progress through a callback.
//!
//! # Resuming
//!
//! A run that stops after `LocalCommitted` leaves `HEAD` at the release
//! commit for the stored version. Planning recognizes that commit by its
//! message and by the version's section in the changelog, and produces a
//! resume plan instead of bumping again:
//!
//! - tag missing on the remote: tag the existing commit, then publish;
//! - tag on the remote at `HEAD` with no release entry: publish only.
//!
//! Any other repository state plans the requested bump.
//!
//! # Milestones
//!
//! An open milestone titled with the new tag must have no open issues
//! before a release starts. It is linked from the changelog section and
//! closed after publishing.

use chrono::NaiveDate;
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{ChangelogBuilder, ChangelogEntry, compared_tag, find_section};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::remote::{Milestone, RemoteError, RemoteGateway, TagRef};
use crate::store::VersionStore;
use crate::version::{BumpKind, tag_name, version_from_tag};
use crate::workspace::Workspace;

// ──────────────────────────────────────────────
// Stages, states, and failures
// ──────────────────────────────────────────────

/// Stages of a release, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    /// The next version is known.
    VersionResolved,
    /// The new changelog section is rendered.
    ChangelogRendered,
    /// Version record and changelog are committed locally.
    LocalCommitted,
    /// The release tag exists on the remote.
    TagCreated,
    /// The release entry is published.
    ReleasePublished,
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionResolved => write!(f, "version_resolved"),
            Self::ChangelogRendered => write!(f, "changelog_rendered"),
            Self::LocalCommitted => write!(f, "local_committed"),
            Self::TagCreated => write!(f, "tag_created"),
            Self::ReleasePublished => write!(f, "release_published"),
        }
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// There is no usable version record to bump.
    NoVersionRecord,
    /// The remote could not be reached or timed out.
    RemoteUnavailable,
    /// The tag already exists on the remote.
    Conflict,
    /// The existing changelog could not be read.
    ChangelogUnreadable,
    /// Persisting the version, writing the changelog, or committing failed.
    LocalCommitFailed,
    /// The release entry could not be published.
    ReleasePublishFailed,
    /// A configured hook command failed.
    HookFailed,
    /// The milestone for the new version still has open issues.
    MilestoneOpen,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoVersionRecord => write!(f, "no version record"),
            Self::RemoteUnavailable => write!(f, "remote unavailable"),
            Self::Conflict => write!(f, "conflict"),
            Self::ChangelogUnreadable => write!(f, "changelog unreadable"),
            Self::LocalCommitFailed => write!(f, "local commit failed"),
            Self::ReleasePublishFailed => write!(f, "release publish failed"),
            Self::HookFailed => write!(f, "hook failed"),
            Self::MilestoneOpen => write!(f, "milestone open"),
        }
    }
}

/// Where the state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ReleaseState {
    /// Nothing has happened yet.
    Idle,
    /// The given stage completed.
    Reached {
        /// The last completed stage.
        stage: ReleaseStage,
    },
    /// The given stage failed.
    Failed {
        /// The stage that was being attempted.
        stage: ReleaseStage,
        /// Why it failed.
        cause: FailureCause,
    },
}

/// A failed release: which stage stopped it, and why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {cause}: {detail}")]
pub struct ReleaseError {
    /// The stage that was being attempted.
    pub stage: ReleaseStage,
    /// Failure category.
    pub cause: FailureCause,
    /// What went wrong, from the collaborator that failed.
    pub detail: String,
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Events and outcomes
// ──────────────────────────────────────────────

/// Events emitted during execution for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A stage has started.
    StageStarted(ReleaseStage),
    /// A stage has completed.
    StageCompleted(ReleaseStage, StageOutcome),
    /// Hook commands are about to run.
    HooksStarted {
        /// Which hook point is running.
        point: HookPoint,
        /// The hook commands, with interpolation applied.
        commands: Vec<String>,
    },
    /// Hook commands have finished.
    HooksCompleted {
        /// Which hook point ran.
        point: HookPoint,
        /// Number of commands that ran.
        count: usize,
    },
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// Stage completed.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Stage was already done by an earlier run.
    Skipped {
        /// Why the stage was skipped.
        reason: String,
    },
}

impl StageOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Summary of a completed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// Version before this release.
    pub previous_version: Version,
    /// The released version.
    pub version: Version,
    /// The release tag.
    pub tag: String,
    /// The release commit.
    pub commit: Option<String>,
    /// Web URL of the published release, if reported.
    pub release_url: Option<String>,
    /// Title of the milestone this run closed.
    pub closed_milestone: Option<String>,
    /// Every stage in order with its outcome.
    pub stages: Vec<(ReleaseStage, StageOutcome)>,
    /// Whether this run finished a release an earlier run started.
    pub resumed: bool,
    /// Number of hook commands executed.
    pub hooks_run: usize,
}

// ──────────────────────────────────────────────
// Settings and plan
// ──────────────────────────────────────────────

/// Per-repository release settings.
///
/// `title`, `description`, and `commit_message` are templates supporting
/// the same `{var}` placeholders as hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSettings {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Web URL used as the changelog link base.
    pub web_url: String,
    /// Release date written into the changelog heading.
    pub date: NaiveDate,
    /// Release entry title.
    pub title: String,
    /// Release description. Empty for none.
    pub description: String,
    /// Message for the release commit.
    pub commit_message: String,
}

impl ReleaseSettings {
    /// Default title template.
    pub const DEFAULT_TITLE: &str = "{version}";
    /// Default description template.
    pub const DEFAULT_DESCRIPTION: &str = "The {tag} release of {repo}";
    /// Default commit message template.
    pub const DEFAULT_COMMIT_MESSAGE: &str = "Release {tag}";

    /// Settings for `https://github.com/<owner>/<repo>` with default templates.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, date: NaiveDate) -> Self {
        let owner = owner.into();
        let repo = repo.into();
        Self {
            web_url: format!("https://github.com/{owner}/{repo}"),
            owner,
            repo,
            date,
            title: Self::DEFAULT_TITLE.to_string(),
            description: Self::DEFAULT_DESCRIPTION.to_string(),
            commit_message: Self::DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}

/// Everything decided before any mutation.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    /// Version currently recorded.
    pub previous_version: Version,
    /// Version to release.
    pub version: Version,
    /// Tag to create (or resume publishing for).
    pub tag: String,
    /// Tag of the release before this one.
    pub previous_tag: Option<String>,
    /// Requested bump. `None` when resuming.
    pub bump: Option<BumpKind>,
    /// Whether this plan resumes an interrupted release.
    pub resume: bool,
    /// Last stage an interrupted run completed, when resuming.
    pub resumed_after: Option<ReleaseStage>,
    /// The existing release commit, when resuming.
    pub commit: Option<String>,
    /// Release entry title.
    pub title: String,
    /// Release description (also the annotated tag message).
    pub description: String,
    /// Commit message for the release commit.
    pub commit_message: String,
    /// Number of closed issues in the section.
    pub closed_issues: usize,
    /// Number of merged pull requests in the section.
    pub merged_pull_requests: usize,
    /// The rendered changelog section (the release body).
    pub section: String,
    /// Open milestone for the release, closed once it is published.
    pub milestone: Option<Milestone>,
    #[serde(skip)]
    document: Option<String>,
    #[serde(skip)]
    hook_context: HookContext,
}

// ──────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────

/// Drives one release across the version store, workspace, and remote.
#[derive(Debug)]
pub struct ReleaseOrchestrator<S, W, R> {
    settings: ReleaseSettings,
    store: S,
    workspace: W,
    remote: R,
    hooks: Option<HookRunner>,
    state: ReleaseState,
}

impl<S, W, R> ReleaseOrchestrator<S, W, R>
where
    S: VersionStore,
    W: Workspace,
    R: RemoteGateway,
{
    /// Create an orchestrator in the `Idle` state.
    pub const fn new(settings: ReleaseSettings, store: S, workspace: W, remote: R) -> Self {
        Self {
            settings,
            store,
            workspace,
            remote,
            hooks: None,
            state: ReleaseState::Idle,
        }
    }

    /// Run `hooks` at stage boundaries.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookRunner) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Current state.
    pub const fn state(&self) -> ReleaseState {
        self.state
    }

    /// Release settings.
    pub const fn settings(&self) -> &ReleaseSettings {
        &self.settings
    }

    /// The version store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The workspace.
    pub const fn workspace(&self) -> &W {
        &self.workspace
    }

    /// The remote gateway.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Plan and execute a release in one call.
    pub fn run(
        &mut self,
        bump: BumpKind,
        on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let plan = self.plan(bump)?;
        self.execute(plan, on_event)
    }

    /// Resolve the next version and render its changelog section.
    ///
    /// Reads only: the version store, workspace, and remote are left as they
    /// were, whatever the result.
    #[instrument(skip(self))]
    pub fn plan(&mut self, bump: BumpKind) -> ReleaseResult<ReleasePlan> {
        self.state = ReleaseState::Idle;

        // Idle → VersionResolved
        let current = self.store.current().map_err(|e| {
            self.fail(
                ReleaseStage::VersionResolved,
                FailureCause::NoVersionRecord,
                e,
            )
        })?;
        let current_tag = tag_name(&current);
        debug!(%current, "read current version");

        let latest = self.remote.latest_tag().map_err(|e| {
            self.fail(
                ReleaseStage::ChangelogRendered,
                FailureCause::RemoteUnavailable,
                e.detail(),
            )
        })?;

        if let Some(plan) = self.plan_resume(&current, &current_tag, latest.as_ref())? {
            return Ok(plan);
        }

        let next = bump.apply(&current).map_err(|e| {
            self.fail(
                ReleaseStage::VersionResolved,
                FailureCause::NoVersionRecord,
                e,
            )
        })?;
        let tag = tag_name(&next);
        let milestone = self.milestone(&tag, ReleaseStage::VersionResolved)?;
        if let Some(ref m) = milestone
            && m.open_issues > 0
        {
            return Err(self.fail(
                ReleaseStage::VersionResolved,
                FailureCause::MilestoneOpen,
                format!("milestone {} has {} open issues", m.title, m.open_issues),
            ));
        }
        self.state = ReleaseState::Reached {
            stage: ReleaseStage::VersionResolved,
        };
        info!(%current, %next, "resolved next version");

        // VersionResolved → ChangelogRendered
        let work = self
            .remote
            .closed_since(latest.as_ref())
            .map_err(|e| {
                self.fail(
                    ReleaseStage::ChangelogRendered,
                    FailureCause::RemoteUnavailable,
                    e.detail(),
                )
            })?;
        let existing = self.workspace.read_changelog().map_err(|e| {
            self.fail(
                ReleaseStage::ChangelogRendered,
                FailureCause::ChangelogUnreadable,
                e,
            )
        })?;

        let previous_tag = latest.map(|t| t.name);
        let hook_context = self.hook_context(&current, &next, &tag);
        let description = hook_context.interpolate(&self.settings.description);

        let mut entry = ChangelogEntry::new(next.clone(), self.settings.date, previous_tag.clone());
        entry.description = (!description.trim().is_empty()).then(|| description.clone());
        entry.milestone = milestone.as_ref().map(|m| m.title.clone());
        entry.closed_issues = work.issues;
        entry.merged_pull_requests = work.pull_requests;

        let builder = ChangelogBuilder::new(&self.settings.web_url);
        let section = builder.render_section(&entry);
        let document = builder.render(&entry, &existing);

        self.state = ReleaseState::Reached {
            stage: ReleaseStage::ChangelogRendered,
        };
        info!(
            %tag,
            issues = entry.closed_issues.len(),
            pull_requests = entry.merged_pull_requests.len(),
            "rendered changelog section"
        );

        Ok(ReleasePlan {
            previous_version: current,
            version: next,
            tag,
            previous_tag,
            bump: Some(bump),
            resume: false,
            resumed_after: None,
            commit: None,
            title: hook_context.interpolate(&self.settings.title),
            description,
            commit_message: hook_context.interpolate(&self.settings.commit_message),
            closed_issues: entry.closed_issues.len(),
            merged_pull_requests: entry.merged_pull_requests.len(),
            section,
            milestone,
            document: Some(document),
            hook_context,
        })
    }

    /// Build a plan that finishes an interrupted run for `tag`.
    ///
    /// `HEAD` must be the release commit for `tag` and the changelog must
    /// hold its section. When the remote has no such tag yet, tagging and
    /// publishing are left. When it has the tag at `HEAD` but no release
    /// entry, only publishing is left. Anything else is not an interrupted
    /// run and gets a fresh release.
    fn plan_resume(
        &mut self,
        current: &Version,
        tag: &str,
        latest: Option<&TagRef>,
    ) -> ReleaseResult<Option<ReleasePlan>> {
        let head = self.workspace.head_commit().map_err(|e| {
            self.fail(
                ReleaseStage::VersionResolved,
                FailureCause::LocalCommitFailed,
                e,
            )
        })?;
        let Some(head) = head else {
            return Ok(None);
        };

        let document = self.workspace.read_changelog().map_err(|e| {
            self.fail(
                ReleaseStage::ChangelogRendered,
                FailureCause::ChangelogUnreadable,
                e,
            )
        })?;
        let Some(section) = find_section(&document, tag) else {
            return Ok(None);
        };

        let previous_tag = compared_tag(section).map(str::to_string);
        let previous = previous_tag
            .as_deref()
            .and_then(version_from_tag)
            .unwrap_or_else(|| current.clone());
        let hook_context = self.hook_context(&previous, current, tag);
        let commit_message = hook_context.interpolate(&self.settings.commit_message);
        if head.message.trim() != commit_message.trim() {
            debug!(%tag, head = %head.id, "HEAD is not the release commit");
            return Ok(None);
        }

        let resumed_after = match latest {
            Some(latest) if latest.name == tag => {
                if latest.commit != head.id {
                    warn!(%tag, tagged = %latest.commit, head = %head.id, "tag points at another commit");
                    return Ok(None);
                }
                let release = self.remote.find_release(tag).map_err(|e| {
                    self.fail(
                        ReleaseStage::ChangelogRendered,
                        FailureCause::RemoteUnavailable,
                        e.detail(),
                    )
                })?;
                if release.is_some() {
                    debug!(%tag, "latest tag already released");
                    return Ok(None);
                }
                ReleaseStage::TagCreated
            }
            Some(latest) if latest.version().is_some_and(|v| v > *current) => {
                warn!(%tag, latest = %latest.name, "remote is ahead of the release commit");
                return Ok(None);
            }
            _ => ReleaseStage::LocalCommitted,
        };

        let milestone = self.milestone(tag, ReleaseStage::ChangelogRendered)?;
        let description = hook_context.interpolate(&self.settings.description);

        self.state = ReleaseState::Reached {
            stage: resumed_after,
        };
        info!(%tag, after = %resumed_after, "resuming interrupted release");

        Ok(Some(ReleasePlan {
            previous_version: previous,
            version: current.clone(),
            tag: tag.to_string(),
            previous_tag,
            bump: None,
            resume: true,
            resumed_after: Some(resumed_after),
            commit: Some(head.id),
            title: hook_context.interpolate(&self.settings.title),
            description,
            commit_message,
            closed_issues: section.matches("/issues/").count(),
            merged_pull_requests: section.matches("/pull/").count(),
            section: format!("{section}\n"),
            milestone,
            document: None,
            hook_context,
        }))
    }

    /// Commit, tag, and publish a planned release.
    #[instrument(skip(self, plan, on_event), fields(tag = %plan.tag, resume = plan.resume))]
    pub fn execute(
        &mut self,
        plan: ReleasePlan,
        mut on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let mut stages = Vec::new();
        let mut hooks_run = 0;

        let commit = if plan.resume {
            stages.push((
                ReleaseStage::VersionResolved,
                StageOutcome::skipped(format!("{} already recorded", plan.version)),
            ));
            stages.push((
                ReleaseStage::ChangelogRendered,
                StageOutcome::skipped(format!("reusing committed section for {}", plan.tag)),
            ));
            stages.push((
                ReleaseStage::LocalCommitted,
                StageOutcome::skipped("already committed"),
            ));
            let Some(ref id) = plan.commit else {
                return Err(self.fail(
                    ReleaseStage::LocalCommitted,
                    FailureCause::LocalCommitFailed,
                    "resume plan carries no release commit",
                ));
            };
            id.clone()
        } else {
            stages.push((
                ReleaseStage::VersionResolved,
                StageOutcome::success(format!(
                    "{} → {}",
                    plan.previous_version, plan.version
                )),
            ));
            stages.push((
                ReleaseStage::ChangelogRendered,
                StageOutcome::success(format!(
                    "{} issues, {} pull requests",
                    plan.closed_issues, plan.merged_pull_requests
                )),
            ));

            // ChangelogRendered → LocalCommitted
            let stage = ReleaseStage::LocalCommitted;
            on_event(ReleaseEvent::StageStarted(stage));
            hooks_run += self.run_hooks(HookPoint::PreRelease, stage, &plan, &mut on_event)?;
            let id = self.commit_release(&plan, &mut on_event, &mut hooks_run)?;
            self.state = ReleaseState::Reached { stage };
            let outcome = StageOutcome::success(format!("committed {}", short(&id)));
            on_event(ReleaseEvent::StageCompleted(stage, outcome.clone()));
            stages.push((stage, outcome));
            id
        };

        // LocalCommitted → TagCreated
        let stage = ReleaseStage::TagCreated;
        if plan.resumed_after == Some(stage) {
            stages.push((
                stage,
                StageOutcome::skipped(format!("{} already on remote", plan.tag)),
            ));
        } else {
            on_event(ReleaseEvent::StageStarted(stage));
            self.remote
                .create_tag(&plan.tag, &commit, &plan.description)
                .map_err(|e| {
                    let cause = match e {
                        RemoteError::Conflict(_) => FailureCause::Conflict,
                        RemoteError::Unavailable(_) => FailureCause::RemoteUnavailable,
                    };
                    self.fail(stage, cause, e.detail())
                })?;
            hooks_run += self.run_hooks(HookPoint::PostTag, stage, &plan, &mut on_event)?;
            self.state = ReleaseState::Reached { stage };
            let outcome = StageOutcome::success(format!("created {}", plan.tag));
            on_event(ReleaseEvent::StageCompleted(stage, outcome.clone()));
            stages.push((stage, outcome));
        }

        // TagCreated → ReleasePublished
        let stage = ReleaseStage::ReleasePublished;
        on_event(ReleaseEvent::StageStarted(stage));
        let release = self
            .remote
            .create_release(&plan.tag, &plan.title, &plan.section)
            .map_err(|e| self.fail(stage, FailureCause::ReleasePublishFailed, e))?;
        let closed_milestone = self.close_milestone(&plan);
        hooks_run += self.run_hooks(HookPoint::PostRelease, stage, &plan, &mut on_event)?;
        self.state = ReleaseState::Reached { stage };
        let outcome = StageOutcome::success(
            release
                .url
                .as_ref()
                .map_or_else(|| format!("published {}", plan.tag), |url| format!("published {url}")),
        );
        on_event(ReleaseEvent::StageCompleted(stage, outcome.clone()));
        stages.push((stage, outcome));

        info!(
            version = %plan.version,
            resumed = plan.resume,
            hooks_run,
            "release complete"
        );

        Ok(ReleaseOutcome {
            previous_version: plan.previous_version,
            version: plan.version,
            tag: plan.tag,
            commit: Some(commit),
            release_url: release.url,
            closed_milestone,
            stages,
            resumed: plan.resume,
            hooks_run,
        })
    }

    /// The open milestone for `tag`, read while working on `stage`.
    fn milestone(&mut self, tag: &str, stage: ReleaseStage) -> ReleaseResult<Option<Milestone>> {
        self.remote
            .version_milestone(tag)
            .map_err(|e| self.fail(stage, FailureCause::RemoteUnavailable, e.detail()))
    }

    /// Close the release's milestone. The release is already public, so a
    /// failure here is logged and reported as `None`.
    fn close_milestone(&mut self, plan: &ReleasePlan) -> Option<String> {
        let milestone = plan.milestone.as_ref()?;
        match self.remote.close_milestone(milestone.number) {
            Ok(()) => {
                info!(milestone = %milestone.title, "closed milestone");
                Some(milestone.title.clone())
            }
            Err(error) => {
                warn!(%error, milestone = %milestone.title, "could not close milestone");
                None
            }
        }
    }

    /// Persist the version, write the changelog, and commit both.
    fn commit_release(
        &mut self,
        plan: &ReleasePlan,
        on_event: &mut impl FnMut(ReleaseEvent),
        hooks_run: &mut usize,
    ) -> ReleaseResult<String> {
        let stage = ReleaseStage::LocalCommitted;
        let failed = FailureCause::LocalCommitFailed;

        let Some(ref document) = plan.document else {
            return Err(self.fail(stage, failed, "plan carries no changelog document"));
        };

        self.store
            .persist(&plan.version)
            .map_err(|e| self.fail(stage, failed, e))?;
        self.workspace
            .write_changelog(document)
            .map_err(|e| self.fail(stage, failed, e))?;
        *hooks_run += self.run_hooks(HookPoint::PostChangelog, stage, plan, on_event)?;

        let version_path = self.store.location();
        let changelog_path = self.workspace.changelog_path().to_string();
        let id = self
            .workspace
            .commit(&plan.commit_message, &[&version_path, &changelog_path])
            .map_err(|e| self.fail(stage, failed, e))?;
        debug!(commit = %id, "release commit created");
        Ok(id)
    }

    fn run_hooks(
        &mut self,
        point: HookPoint,
        stage: ReleaseStage,
        plan: &ReleasePlan,
        on_event: &mut impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<usize> {
        let Some(ref hooks) = self.hooks else {
            return Ok(0);
        };
        let count = hooks.count(point);
        if count == 0 {
            return Ok(0);
        }

        let commands = hooks.commands(point, &plan.hook_context);
        on_event(ReleaseEvent::HooksStarted { point, commands });
        let result = hooks.run(point, &plan.hook_context);
        if let Err(e) = result {
            return Err(self.fail(stage, FailureCause::HookFailed, e));
        }
        on_event(ReleaseEvent::HooksCompleted { point, count });
        Ok(count)
    }

    fn hook_context(&self, previous: &Version, version: &Version, tag: &str) -> HookContext {
        HookContext {
            version: version.to_string(),
            prev_version: previous.to_string(),
            tag: tag.to_string(),
            changelog_path: self.workspace.changelog_path().to_string(),
            owner: self.settings.owner.clone(),
            repo: self.settings.repo.clone(),
        }
    }

    fn fail(
        &mut self,
        stage: ReleaseStage,
        cause: FailureCause,
        detail: impl std::fmt::Display,
    ) -> ReleaseError {
        self.state = ReleaseState::Failed { stage, cause };
        let error = ReleaseError {
            stage,
            cause,
            detail: detail.to_string(),
        };
        warn!(%error, "release stopped");
        error
    }
}

fn short(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(ReleaseStage::TagCreated.to_string(), "tag_created");
        assert_eq!(
            serde_json::to_string(&ReleaseStage::ReleasePublished).unwrap(),
            "\"release_published\""
        );
    }

    #[test]
    fn stages_are_ordered() {
        assert!(ReleaseStage::VersionResolved < ReleaseStage::ChangelogRendered);
        assert!(ReleaseStage::TagCreated < ReleaseStage::ReleasePublished);
    }

    #[test]
    fn error_message_names_stage_and_cause() {
        let err = ReleaseError {
            stage: ReleaseStage::TagCreated,
            cause: FailureCause::Conflict,
            detail: "tag v0.2.0 already exists".into(),
        };
        assert_eq!(
            err.to_string(),
            "tag_created failed: conflict: tag v0.2.0 already exists"
        );
    }

    #[test]
    fn state_serializes_with_tag() {
        let state = ReleaseState::Failed {
            stage: ReleaseStage::LocalCommitted,
            cause: FailureCause::LocalCommitFailed,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("\"cause\":\"local_commit_failed\""));
    }

    #[test]
    fn default_settings_link_to_github() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let settings = ReleaseSettings::new("acme", "widgets", date);
        assert_eq!(settings.web_url, "https://github.com/acme/widgets");
        assert_eq!(settings.title, "{version}");
    }

    #[test]
    fn short_commit_ids() {
        assert_eq!(short("0123456789abcdef"), "0123456");
        assert_eq!(short("abc"), "abc");
    }
}
