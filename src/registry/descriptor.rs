//! Typed feed descriptors.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::provider::RepoId;
use crate::version::Extraction;

/// Which releases of a GitHub project count as "latest".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Any,
    Prerelease,
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Channel::Stable),
            "any" => Ok(Channel::Any),
            "prerelease" => Ok(Channel::Prerelease),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Stable => "stable",
            Channel::Any => "any",
            Channel::Prerelease => "prerelease",
        })
    }
}

/// Vendor-specific upstream shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorAdapter {
    /// JSON document keyed by release channel
    ChannelJson { url: String, channel: Channel },
    /// JSON document naming a single latest version
    LatestJson { url: String },
    /// Debian-style apt repository (`Release` + `Packages.gz`)
    DebRepository { url: String, package: String },
    /// HTML or text page scraped with a pattern
    PageScrape { url: String, pattern: String },
}

impl VendorAdapter {
    pub fn kind(&self) -> &'static str {
        match self {
            VendorAdapter::ChannelJson { .. } => "channel-json",
            VendorAdapter::LatestJson { .. } => "latest-json",
            VendorAdapter::DebRepository { .. } => "deb-repository",
            VendorAdapter::PageScrape { .. } => "page-scrape",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            VendorAdapter::ChannelJson { url, .. }
            | VendorAdapter::LatestJson { url }
            | VendorAdapter::DebRepository { url, .. }
            | VendorAdapter::PageScrape { url, .. } => url,
        }
    }
}

/// Where a package's upstream version comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    GithubRelease {
        repo: RepoId,
        channel: Channel,
    },
    GithubReleaseFiltered {
        repo: RepoId,
        channel: Channel,
        tag_pattern: String,
    },
    GithubTagsFiltered {
        repo: RepoId,
        tag_pattern: Option<String>,
    },
    /// Informational only; never drives a bump.
    Vcs {
        repo: Option<RepoId>,
    },
    Vendor(VendorAdapter),
    Manual,
}

impl FeedSource {
    /// The registry `type` string for this source.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedSource::GithubRelease { .. } => "github-release",
            FeedSource::GithubReleaseFiltered { .. } => "github-release-filtered",
            FeedSource::GithubTagsFiltered { .. } => "github-tags-filtered",
            FeedSource::Vcs { .. } => "vcs",
            FeedSource::Vendor(adapter) => adapter.kind(),
            FeedSource::Manual => "manual",
        }
    }
}

/// One package entry of the feed registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub name: String,
    pub schema_version: u64,
    /// `None` when the entry declares no `type`
    pub source: Option<FeedSource>,
    pub extraction: Option<Extraction>,
}

impl FeedDescriptor {
    pub fn has_feed(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.source, Some(FeedSource::Manual))
    }

    pub fn is_vcs_feed(&self) -> bool {
        matches!(self.source, Some(FeedSource::Vcs { .. }))
    }

    /// Feed type for reports, `-` when there is none.
    pub fn kind(&self) -> &'static str {
        self.source.as_ref().map_or("-", FeedSource::kind)
    }
}
