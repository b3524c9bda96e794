//! Release providers: code hosting APIs queried for tags and releases.

mod github;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use github::{DEFAULT_API_URL, GitHubProvider};

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format '{}'. Expected 'owner/repo'.", s)
        } else {
            Ok(RepoId {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}

/// A release as listed by the provider, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Release {
    /// Version tag (e.g., "v1.0.0")
    pub tag: String,
    /// Whether this is a pre-release
    pub prerelease: bool,
}

/// Operations needed from a code hosting platform to discover versions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    /// Get the API base URL.
    fn api_url(&self) -> &str;

    /// The most recent published releases (drafts excluded), newest first.
    async fn recent_releases(&self, repo: &RepoId, limit: usize) -> Result<Vec<Release>>;

    /// The most recent tag names, in whatever order the platform returns them.
    async fn recent_tags(&self, repo: &RepoId, limit: usize) -> Result<Vec<String>>;
}
