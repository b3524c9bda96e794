//! Strategies backed by the GitHub releases and tags APIs.

use log::debug;
use regex::Regex;

use crate::provider::{Release, ReleaseProvider, RepoId};
use crate::registry::Channel;
use crate::version::{Comparator, ExtractError, Extraction, apply_compiled, normalize};

use super::{FetchError, RELEASE_WINDOW, RawVersion, TAG_WINDOW};

fn compile(pattern: &str) -> Result<Regex, FetchError> {
    Regex::new(pattern).map_err(|e| {
        FetchError::Extract(ExtractError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    })
}

/// Pick the release a channel refers to from a newest-first list.
pub(crate) fn select_release<'a>(
    releases: &'a [Release],
    channel: Channel,
    tag_filter: Option<&Regex>,
) -> Option<&'a Release> {
    let mut candidates = releases
        .iter()
        .filter(|r| tag_filter.is_none_or(|re| re.is_match(&r.tag)));

    match channel {
        Channel::Stable => candidates.find(|r| !r.prerelease),
        Channel::Prerelease => candidates.find(|r| r.prerelease),
        Channel::Any => candidates.next(),
    }
}

pub(crate) async fn latest_release<P: ReleaseProvider>(
    provider: &P,
    repo: &RepoId,
    channel: Channel,
    tag_pattern: Option<&str>,
) -> Result<RawVersion, FetchError> {
    let filter = tag_pattern.map(compile).transpose()?;
    let releases = provider
        .recent_releases(repo, RELEASE_WINDOW)
        .await
        .map_err(FetchError::request)?;

    debug!("{}: {} recent releases", repo, releases.len());

    select_release(&releases, channel, filter.as_ref())
        .map(|r| RawVersion::new(r.tag.clone()))
        .ok_or_else(|| {
            FetchError::NotFound(format!(
                "no {} release among the latest {} of {}",
                channel, RELEASE_WINDOW, repo
            ))
        })
}

/// Highest version among recent tags.
///
/// Tags are filtered by `tag_pattern` and turned into versions: the feed's
/// extraction rule runs on the raw tag (tags it does not match are dropped)
/// and its result goes through `normalize`. The comparator then picks the
/// highest; the API order of tags is never trusted.
pub(crate) async fn highest_tag<P: ReleaseProvider>(
    provider: &P,
    comparator: &Comparator,
    repo: &RepoId,
    tag_pattern: Option<&str>,
    extraction: Option<&Extraction>,
) -> Result<RawVersion, FetchError> {
    let filter = tag_pattern.map(compile).transpose()?;
    let extractor = extraction
        .map(|e| compile(&e.pattern).map(|re| (re, e.format.as_str())))
        .transpose()?;

    let tags = provider
        .recent_tags(repo, TAG_WINDOW)
        .await
        .map_err(FetchError::request)?;

    let versions: Vec<String> = tags
        .iter()
        .filter(|tag| filter.as_ref().is_none_or(|re| re.is_match(tag)))
        .filter_map(|tag| match &extractor {
            Some((re, format)) => apply_compiled(re, tag.trim(), format)
                .ok()
                .map(|v| normalize(&v)),
            None => Some(normalize(tag)),
        })
        .filter(|v| !v.is_empty())
        .collect();

    debug!("{}: {} of {} tags usable", repo, versions.len(), tags.len());

    let best = comparator
        .pick_max(&versions)
        .ok_or_else(|| FetchError::NotFound(format!("no matching tag in {}", repo)))?;

    Ok(if extractor.is_some() {
        RawVersion::extracted(best)
    } else {
        RawVersion::new(best)
    })
}

/// Highest digit-leading tag of a VCS package's repository.
pub(crate) async fn vcs_tag<P: ReleaseProvider>(
    provider: &P,
    comparator: &Comparator,
    repo: &RepoId,
) -> Result<RawVersion, FetchError> {
    let tags = provider
        .recent_tags(repo, TAG_WINDOW)
        .await
        .map_err(FetchError::request)?;

    let versions = tags
        .iter()
        .map(|t| normalize(t))
        .filter(|v| v.starts_with(|c: char| c.is_ascii_digit()));

    Ok(comparator
        .pick_max(versions)
        .map(RawVersion::new)
        .unwrap_or_default())
}
