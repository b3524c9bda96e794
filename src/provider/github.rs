//! GitHub provider implementation.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;

use super::{Release, ReleaseProvider, RepoId};

/// Default base URL for the GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub API response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Release {
        pub tag_name: String,
        #[serde(default)]
        pub prerelease: bool,
        #[serde(default)]
        pub draft: bool,
    }

    #[derive(Deserialize, Debug)]
    pub struct Tag {
        pub name: String,
    }
}

/// GitHub provider implementation.
pub struct GitHubProvider {
    http_client: HttpClient,
    api_url: String,
}

impl GitHubProvider {
    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, api_url: &str) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReleaseProvider for GitHubProvider {
    fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn recent_releases(&self, repo: &RepoId, limit: usize) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{}/{}/releases", self.api_url, repo.owner, repo.repo);
        debug!("Fetching releases from {}...", url);

        // One page is enough: only the newest releases are ever considered
        let per_page = limit.clamp(1, 100).to_string();
        let parsed: Vec<api::Release> = self
            .http_client
            .get_json_with_query(&url, &[("per_page", &per_page)])
            .await?;

        Ok(parsed
            .into_iter()
            .filter(|r| !r.draft)
            .take(limit)
            .map(Release::from)
            .collect())
    }

    async fn recent_tags(&self, repo: &RepoId, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/repos/{}/{}/tags", self.api_url, repo.owner, repo.repo);
        debug!("Fetching tags from {}...", url);

        let per_page = limit.clamp(1, 100).to_string();
        let parsed: Vec<api::Tag> = self
            .http_client
            .get_json_with_query(&url, &[("per_page", &per_page)])
            .await?;

        Ok(parsed.into_iter().take(limit).map(|t| t.name).collect())
    }
}

impl From<api::Release> for Release {
    fn from(r: api::Release) -> Self {
        Release {
            tag: r.tag_name,
            prerelease: r.prerelease,
        }
    }
}
