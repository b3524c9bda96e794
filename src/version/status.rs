//! Per-package status classification.

use serde::Serialize;
use std::fmt;

use super::compare::Comparator;

/// Suffixes marking recipes that build from a VCS checkout.
pub const VCS_SUFFIXES: &[&str] = &["-git", "-svn", "-hg", "-bzr", "-darcs", "-fossil"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Ok,
    Update,
    Manual,
    Skip,
    NoFeed,
    Unknown,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Ok => "OK",
            PackageStatus::Update => "UPDATE",
            PackageStatus::Manual => "MANUAL",
            PackageStatus::Skip => "SKIP",
            PackageStatus::NoFeed => "NO_FEED",
            PackageStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the classifier looks at for one package.
#[derive(Debug, Clone, Default)]
pub struct StatusInput<'a> {
    /// Recipe `pkgver`, empty when unknown
    pub current_local: &'a str,
    /// Upstream version after the full pipeline, empty when unresolved
    pub upstream: &'a str,
    pub has_feed: bool,
    pub is_vcs: bool,
    pub is_manual: bool,
}

/// Whether a package name follows the VCS recipe naming convention.
pub fn is_vcs_name(name: &str) -> bool {
    VCS_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Decide the status of one package. Rules are checked in order:
///
/// 1. no feed: `NO_FEED`
/// 2. manual feed: `MANUAL`
/// 3. VCS package: `SKIP`
/// 4. upstream unresolved: `UNKNOWN`
/// 5. local version unknown, or upstream newer: `UPDATE`
/// 6. otherwise `OK`
pub fn classify(input: &StatusInput<'_>, comparator: &Comparator) -> PackageStatus {
    if !input.has_feed {
        return PackageStatus::NoFeed;
    }
    if input.is_manual {
        return PackageStatus::Manual;
    }
    if input.is_vcs {
        return PackageStatus::Skip;
    }
    if input.upstream.is_empty() {
        return PackageStatus::Unknown;
    }
    if input.current_local.is_empty() || comparator.is_newer(input.upstream, input.current_local) {
        return PackageStatus::Update;
    }
    PackageStatus::Ok
}
