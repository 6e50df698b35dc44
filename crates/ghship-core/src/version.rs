//! Semantic versions and bump kinds.
//!
//! Releases use plain three-component versions (`major.minor.patch`).
//! Pre-release and build metadata are rejected at parse time so every
//! version maps to exactly one `vX.Y.Z` tag.

use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix prepended to a version to form its tag name.
pub const TAG_PREFIX: &str = "v";

/// Errors from version parsing.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// The version carries pre-release or build metadata.
    #[error("{0} is not a plain major.minor.patch version")]
    NotPlain(String),

    /// The bumped component would exceed `u64::MAX`.
    #[error("cannot apply a {kind} bump to {version}: component overflows")]
    Overflow {
        /// The bump that was requested.
        kind: BumpKind,
        /// The version that cannot be bumped.
        version: Version,
    },

    /// The bump kind is not one of `major`, `minor`, `patch`.
    #[error("unknown bump kind '{0}' (expected major, minor or patch)")]
    UnknownBumpKind(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Major release (X.0.0).
    Major,
    /// Minor release (x.Y.0).
    Minor,
    /// Patch release (x.y.Z).
    Patch,
}

impl BumpKind {
    /// Apply this bump to `current`.
    pub fn apply(self, current: &Version) -> VersionResult<Version> {
        let next = match self {
            Self::Major => current
                .major
                .checked_add(1)
                .map(|major| Version::new(major, 0, 0)),
            Self::Minor => current
                .minor
                .checked_add(1)
                .map(|minor| Version::new(current.major, minor, 0)),
            Self::Patch => current
                .patch
                .checked_add(1)
                .map(|patch| Version::new(current.major, current.minor, patch)),
        };
        next.ok_or_else(|| VersionError::Overflow {
            kind: self,
            version: current.clone(),
        })
    }
}

impl std::fmt::Display for BumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for BumpKind {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(VersionError::UnknownBumpKind(other.to_string())),
        }
    }
}

/// Parse a version string, stripping an optional `v` prefix.
///
/// Only `major.minor.patch` is accepted.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.trim();
    let s = s.strip_prefix(TAG_PREFIX).unwrap_or(s);
    let version = Version::parse(s)?;
    if !version.pre.is_empty() || !version.build.is_empty() {
        return Err(VersionError::NotPlain(s.to_string()));
    }
    Ok(version)
}

/// Tag name for a version (`1.2.3` → `v1.2.3`).
pub fn tag_name(version: &Version) -> String {
    format!("{TAG_PREFIX}{version}")
}

/// Parse a tag name back into a version, if it is a release tag.
pub fn version_from_tag(tag: &str) -> Option<Version> {
    let rest = tag.strip_prefix(TAG_PREFIX)?;
    parse_version(rest).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_table() {
        let v = Version::new(1, 2, 2);
        assert_eq!(BumpKind::Minor.apply(&v).unwrap(), Version::new(1, 3, 0));
        assert_eq!(BumpKind::Major.apply(&v).unwrap(), Version::new(2, 0, 0));
        assert_eq!(BumpKind::Patch.apply(&v).unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn bump_from_zero() {
        let v = Version::new(0, 0, 0);
        assert_eq!(BumpKind::Patch.apply(&v).unwrap(), Version::new(0, 0, 1));
        assert_eq!(BumpKind::Minor.apply(&v).unwrap(), Version::new(0, 1, 0));
        assert_eq!(BumpKind::Major.apply(&v).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn bump_resets_lower_components() {
        let v = Version::new(3, 9, 14);
        assert_eq!(BumpKind::Major.apply(&v).unwrap(), Version::new(4, 0, 0));
        assert_eq!(BumpKind::Minor.apply(&v).unwrap(), Version::new(3, 10, 0));
    }

    #[test]
    fn bump_past_u64_max_is_an_error() {
        let v = Version::new(1, u64::MAX, 7);
        assert!(matches!(
            BumpKind::Minor.apply(&v),
            Err(VersionError::Overflow {
                kind: BumpKind::Minor,
                ..
            })
        ));
        assert_eq!(BumpKind::Major.apply(&v).unwrap(), Version::new(2, 0, 0));
        assert_eq!(
            BumpKind::Patch.apply(&v).unwrap(),
            Version::new(1, u64::MAX, 8)
        );
    }

    #[test]
    fn bump_kind_parses_only_known_literals() {
        assert_eq!("major".parse::<BumpKind>().unwrap(), BumpKind::Major);
        assert_eq!("minor".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!("patch".parse::<BumpKind>().unwrap(), BumpKind::Patch);
        assert!("Major".parse::<BumpKind>().is_err());
        assert!("micro".parse::<BumpKind>().is_err());
        assert!("".parse::<BumpKind>().is_err());
    }

    #[test]
    fn bump_kind_display_round_trips() {
        for kind in [BumpKind::Major, BumpKind::Minor, BumpKind::Patch] {
            assert_eq!(kind.to_string().parse::<BumpKind>().unwrap(), kind);
        }
    }

    #[test]
    fn parse_with_and_without_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("1.2.3\n").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn parse_rejects_prerelease_and_build() {
        assert!(matches!(
            parse_version("1.2.3-rc.1"),
            Err(VersionError::NotPlain(_))
        ));
        assert!(matches!(
            parse_version("1.2.3+build5"),
            Err(VersionError::NotPlain(_))
        ));
    }

    #[test]
    fn parse_invalid() {
        assert!(parse_version("not-a-version").is_err());
        assert!(parse_version("1.2").is_err());
    }

    #[test]
    fn tag_names() {
        assert_eq!(tag_name(&Version::new(0, 2, 0)), "v0.2.0");
        assert_eq!(version_from_tag("v0.2.0"), Some(Version::new(0, 2, 0)));
        assert_eq!(version_from_tag("release-1"), None);
        assert_eq!(version_from_tag("v1.0.0-beta"), None);
    }

    #[test]
    fn versions_order_lexicographically() {
        assert!(Version::new(1, 2, 3) < Version::new(1, 3, 0));
        assert!(Version::new(1, 10, 0) > Version::new(1, 9, 9));
        assert!(Version::new(2, 0, 0) > Version::new(1, 99, 99));
    }
}
