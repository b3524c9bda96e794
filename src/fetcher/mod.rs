//! Upstream version fetchers.
//!
//! [`UpstreamFetcher`] resolves a [`FeedDescriptor`] to a raw upstream
//! version with one exhaustive match over [`FeedSource`]. Every lookup is
//! bounded by a timeout and every failure is returned as a [`FetchError`]
//! that only affects the package being resolved.

mod github;
mod vendor;

use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use crate::http::HttpClient;
use crate::provider::ReleaseProvider;
use crate::registry::{FeedDescriptor, FeedSource};
use crate::version::{Comparator, ExtractError, normalize, to_pkgver};

/// Timeout applied to one package's lookup unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How many recent releases the release strategies look at.
pub const RELEASE_WINDOW: usize = 30;

/// How many recent tags the tag strategies look at.
pub const TAG_WINDOW: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("no version found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl FetchError {
    pub(crate) fn request(err: anyhow::Error) -> Self {
        FetchError::Request(format!("{:#}", err))
    }
}

/// A fetcher's answer before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVersion {
    pub value: String,
    /// The feed's extraction rule has already been applied
    pub extracted: bool,
}

impl RawVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            extracted: false,
        }
    }

    pub fn extracted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            extracted: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    /// Discover the latest upstream version for one package.
    /// Manual feeds and entries without a feed resolve to an empty version.
    async fn resolve(&self, descriptor: &FeedDescriptor) -> Result<RawVersion, FetchError>;
}

/// Turn a raw upstream answer into the version compared against the recipe.
///
/// The feed's extraction rule sees the trimmed raw value (the tag exactly as
/// published) unless the strategy already applied it; the result is then
/// normalized and made a valid `pkgver`.
pub fn upstream_version(
    raw: &RawVersion,
    descriptor: &FeedDescriptor,
) -> Result<String, ExtractError> {
    let value = raw.value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    let version = match &descriptor.extraction {
        Some(extraction) if !raw.extracted => normalize(&extraction.apply(value)?),
        _ => normalize(value),
    };

    Ok(to_pkgver(&version))
}

/// The fetcher used by the CLI.
pub struct UpstreamFetcher<P: ReleaseProvider> {
    provider: P,
    http: HttpClient,
    comparator: Comparator,
    timeout: Duration,
}

impl<P: ReleaseProvider> UpstreamFetcher<P> {
    pub fn new(provider: P, http: HttpClient, comparator: Comparator) -> Self {
        Self {
            provider,
            http,
            comparator,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dispatch(
        &self,
        descriptor: &FeedDescriptor,
        source: &FeedSource,
    ) -> Result<RawVersion, FetchError> {
        match source {
            FeedSource::GithubRelease { repo, channel } => {
                github::latest_release(&self.provider, repo, *channel, None).await
            }
            FeedSource::GithubReleaseFiltered {
                repo,
                channel,
                tag_pattern,
            } => github::latest_release(&self.provider, repo, *channel, Some(tag_pattern)).await,
            FeedSource::GithubTagsFiltered { repo, tag_pattern } => {
                github::highest_tag(
                    &self.provider,
                    &self.comparator,
                    repo,
                    tag_pattern.as_deref(),
                    descriptor.extraction.as_ref(),
                )
                .await
            }
            FeedSource::Vcs { repo: Some(repo) } => {
                github::vcs_tag(&self.provider, &self.comparator, repo).await
            }
            FeedSource::Vcs { repo: None } | FeedSource::Manual => Ok(RawVersion::default()),
            FeedSource::Vendor(adapter) => {
                vendor::resolve(&self.http, &self.comparator, adapter).await
            }
        }
    }
}

#[async_trait]
impl<P: ReleaseProvider> VersionFetcher for UpstreamFetcher<P> {
    #[tracing::instrument(skip(self, descriptor), fields(package = %descriptor.name))]
    async fn resolve(&self, descriptor: &FeedDescriptor) -> Result<RawVersion, FetchError> {
        let Some(source) = &descriptor.source else {
            return Ok(RawVersion::default());
        };

        debug!("Resolving {} via {}", descriptor.name, source.kind());
        let raw = tokio::time::timeout(self.timeout, self.dispatch(descriptor, source))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        debug!("{}: upstream reports '{}'", descriptor.name, raw.value);
        Ok(raw)
    }
}
