//! Changelog section rendering.
//!
//! Each release gets one Markdown section, prepended to the existing
//! document so the newest release comes first:
//!
//! ```text
//! ## [v0.2.0](https://github.com/owner/repo/tree/v0.2.0) (2024-05-01)
//! [Full Changelog](https://github.com/owner/repo/compare/v0.1.1...v0.2.0)
//!
//! **Closed issues:**
//!
//!   - Crash on empty input [\#12](https://github.com/owner/repo/issues/12)
//!
//! **Merged pull requests:**
//!
//! _None_
//! ```
//!
//! Rendering is pure: identical inputs always produce identical text.

use std::fmt::Write;

use chrono::NaiveDate;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::version::tag_name;

/// Placeholder rendered for an empty subsection.
pub const EMPTY_PLACEHOLDER: &str = "_None_";

const HEADING_PREFIX: &str = "## [";

/// A closed issue, as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    /// Issue number.
    pub id: u64,
    /// Issue title.
    pub title: String,
    /// Web URL of the issue.
    pub url: String,
}

/// A merged pull request, as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Pull request number.
    pub id: u64,
    /// Pull request title.
    pub title: String,
    /// Web URL of the pull request.
    pub url: String,
}

/// Everything needed to render one release section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    /// The version being released.
    pub version: Version,
    /// Release date.
    pub date: NaiveDate,
    /// Tag of the previous release, if there was one.
    pub previous_tag: Option<String>,
    /// Tag of this release.
    pub tag: String,
    /// Free-form description placed under the heading.
    pub description: Option<String>,
    /// Title of the milestone planned for this release, linked next to the
    /// compare link.
    pub milestone: Option<String>,
    /// Issues closed since the previous release, in remote order.
    pub closed_issues: Vec<IssueRef>,
    /// Pull requests merged since the previous release, in remote order.
    pub merged_pull_requests: Vec<PullRequestRef>,
}

impl ChangelogEntry {
    /// Build an entry whose tag is derived from `version`.
    pub fn new(version: Version, date: NaiveDate, previous_tag: Option<String>) -> Self {
        let tag = tag_name(&version);
        Self {
            version,
            date,
            previous_tag,
            tag,
            description: None,
            milestone: None,
            closed_issues: Vec::new(),
            merged_pull_requests: Vec::new(),
        }
    }
}

/// Renders changelog sections with links into a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogBuilder {
    web_url: String,
}

impl ChangelogBuilder {
    /// Create a builder linking into `web_url` (e.g. `https://github.com/owner/repo`).
    pub fn new(web_url: impl Into<String>) -> Self {
        let web_url = web_url.into().trim_end_matches('/').to_string();
        Self { web_url }
    }

    /// Repository web URL used as the link base.
    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    /// Render `entry` as a new section followed by `existing` unchanged.
    ///
    /// A changelog that does not exist yet is passed as `""`.
    pub fn render(&self, entry: &ChangelogEntry, existing: &str) -> String {
        let mut document = self.render_section(entry);
        document.push_str(existing);
        document
    }

    /// Render just the section for `entry`.
    pub fn render_section(&self, entry: &ChangelogEntry) -> String {
        let base = &self.web_url;
        let tag = &entry.tag;
        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "## [{tag}]({base}/tree/{tag}) ({})", entry.date.format("%Y-%m-%d"));
        match entry.previous_tag {
            Some(ref previous) => {
                let _ = write!(out, "[Full Changelog]({base}/compare/{previous}...{tag})");
            }
            None => {
                let _ = write!(out, "[Full Changelog]({base}/commits/{tag})");
            }
        }
        if let Some(ref milestone) = entry.milestone {
            let _ = write!(out, " [Milestone]({base}/issues?q=milestone%3A{milestone}+is%3Aall)");
        }
        out.push_str("\n\n");

        if let Some(description) = entry.description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            out.push_str(description);
            out.push_str("\n\n");
        }

        out.push_str("**Closed issues:**\n\n");
        push_items(
            &mut out,
            entry
                .closed_issues
                .iter()
                .map(|i| (i.id, i.title.as_str(), i.url.as_str())),
        );

        out.push_str("**Merged pull requests:**\n\n");
        push_items(
            &mut out,
            entry
                .merged_pull_requests
                .iter()
                .map(|p| (p.id, p.title.as_str(), p.url.as_str())),
        );

        out
    }
}

fn push_items<'a>(out: &mut String, items: impl Iterator<Item = (u64, &'a str, &'a str)>) {
    let mut empty = true;
    for (id, title, url) in items {
        empty = false;
        let _ = writeln!(out, "  - {} [\\#{id}]({url})", title.trim());
    }
    if empty {
        out.push_str(EMPTY_PLACEHOLDER);
        out.push('\n');
    }
    out.push('\n');
}

/// Find the section for `tag` in a rendered document.
///
/// Returns the section text from its heading up to (not including) the next
/// release heading, with trailing blank lines removed.
pub fn find_section<'a>(document: &'a str, tag: &str) -> Option<&'a str> {
    let heading = format!("{HEADING_PREFIX}{tag}]");
    let mut offset = 0;
    let mut start = None;

    for line in document.split_inclusive('\n') {
        if let Some(begin) = start {
            if line.starts_with(HEADING_PREFIX) {
                return Some(document[begin..offset].trim_end());
            }
        } else if line.starts_with(&heading) {
            start = Some(offset);
        }
        offset += line.len();
    }

    start.map(|begin| document[begin..].trim_end())
}

/// The previous tag named in a section's `[Full Changelog]` compare link.
///
/// Returns `None` for a first release, which links to commits instead.
pub fn compared_tag(section: &str) -> Option<&str> {
    let line = section
        .lines()
        .find(|line| line.starts_with("[Full Changelog]("))?;
    let range = line.split("/compare/").nth(1)?;
    let (previous, _) = range.split_once("...")?;
    (!previous.is_empty()).then_some(previous)
}
