//! Core library for ghship.
//!
//! Everything needed to cut a GitHub release of a repository that keeps its
//! version in a plain-text file and a Markdown changelog: bump the version,
//! prepend a changelog section listing closed issues and merged pull
//! requests, commit both, tag, and publish a release entry.
//!
//! # Modules
//!
//! - [`version`] - Three-component versions, bump kinds and tag names
//! - [`store`] - Where the current version is kept
//! - [`changelog`] - Changelog section rendering
//! - [`remote`] - The hosting remote interface
//! - [`workspace`] - The local changelog and release commit
//! - [`release`] - The release state machine
//! - [`git`] - Git plumbing
//! - [`github`] - A remote backed by `git` and `gh`
//! - [`memory`] - In-memory stores, workspaces and remotes
//! - [`hooks`] - User commands at stage boundaries
//! - [`preflight`] - Release readiness checks
//! - [`config`] - Configuration loading
//! - [`error`] - Configuration errors
//!
//! # Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use ghship_core::memory::{MemoryRemote, MemoryVersionStore, MemoryWorkspace};
//! use ghship_core::release::{ReleaseOrchestrator, ReleaseSettings};
//! use ghship_core::version::BumpKind;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let mut orchestrator = ReleaseOrchestrator::new(
//!     ReleaseSettings::new("acme", "widgets", date),
//!     MemoryVersionStore::new(ghship_core::semver::Version::new(0, 1, 1)),
//!     MemoryWorkspace::new(),
//!     MemoryRemote::new(),
//! );
//! let outcome = orchestrator.run(BumpKind::Minor, |_| {}).unwrap();
//! assert_eq!(outcome.tag, "v0.2.0");
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod error;

pub mod git;

pub mod github;

pub mod hooks;

pub mod memory;

pub mod preflight;

mod process;

pub mod release;

pub mod remote;

pub mod store;

pub mod version;

pub mod workspace;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use release::{ReleaseError, ReleaseOrchestrator, ReleaseOutcome, ReleaseSettings};

pub use version::BumpKind;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
