//! Service factory for building command dependencies.
//!
//! Services are built from configuration values but are not part of the
//! configuration itself.

use std::time::Duration;

use anyhow::Result;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};

use crate::{
    fetcher::UpstreamFetcher,
    http::HttpClient,
    provider::GitHubProvider,
};

use super::config::Config;

/// Build an HTTP client with optional authentication token
pub fn build_http_client(token: Option<&str>, timeout: Duration) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("HTTP client configured with authentication");
    }

    let client = Client::builder()
        .user_agent(concat!("pkgfeed/", env!("PKGFEED_VERSION")))
        .default_headers(headers)
        .timeout(timeout)
        .build()?;

    Ok(HttpClient::new(client))
}

/// Build the upstream fetcher (GitHub provider plus vendor adapters)
pub fn build_fetcher(config: &Config) -> Result<UpstreamFetcher<GitHubProvider>> {
    let http = build_http_client(config.token.as_deref(), config.timeout)?
        .with_attempts(config.attempts);
    let provider = GitHubProvider::from_http_client(http.clone(), &config.api_url);
    Ok(UpstreamFetcher::new(provider, http, config.comparator()).with_timeout(config.timeout))
}
