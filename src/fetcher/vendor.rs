//! Adapters for vendor-specific upstream formats.

use flate2::read::GzDecoder;
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::io::Read;

use crate::http::HttpClient;
use crate::registry::{Channel, VendorAdapter};
use crate::version::{Comparator, ExtractError, normalize};

use super::{FetchError, RawVersion};

/// Keys checked, in order, by the `latest-json` adapter.
const LATEST_KEYS: &[&str] = &["version", "latest_version", "latest", "tag_name"];

/// Package index listed in a Debian `Release` file.
const DEB_INDEX_SUFFIX: &str = "binary-amd64/Packages.gz";

pub(crate) async fn resolve(
    http: &HttpClient,
    comparator: &Comparator,
    adapter: &VendorAdapter,
) -> Result<RawVersion, FetchError> {
    match adapter {
        VendorAdapter::ChannelJson { url, channel } => {
            let doc: Value = http.get_json(url).await.map_err(FetchError::request)?;
            channel_version(&doc, *channel).map(RawVersion::new)
        }
        VendorAdapter::LatestJson { url } => {
            let doc: Value = http.get_json(url).await.map_err(FetchError::request)?;
            latest_version(&doc).map(RawVersion::new)
        }
        VendorAdapter::DebRepository { url, package } => {
            deb_repository(http, comparator, url, package).await
        }
        VendorAdapter::PageScrape { url, pattern } => {
            let page = http.get_text(url).await.map_err(FetchError::request)?;
            scrape(&page, pattern, comparator).map(RawVersion::new)
        }
    }
}

fn as_version(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn object_version(value: &Value) -> Option<String> {
    as_version(value).or_else(|| value.get("version").and_then(as_version))
}

/// Version published on `channel` by a release-channel document.
///
/// Accepted shapes: `{"stable": "1.2"}`, `{"stable": {"version": "1.2"}}`
/// and `[{"channel": "stable", "version": "1.2"}]`. `any` takes the first entry.
pub(crate) fn channel_version(doc: &Value, channel: Channel) -> Result<String, FetchError> {
    let key = channel.to_string();
    let found = match doc {
        Value::Object(map) => match channel {
            Channel::Any => map.values().next().and_then(object_version),
            _ => map.get(&key).and_then(object_version),
        },
        Value::Array(entries) => entries
            .iter()
            .find(|entry| {
                channel == Channel::Any
                    || entry.get("channel").and_then(Value::as_str) == Some(key.as_str())
            })
            .and_then(object_version),
        _ => {
            return Err(FetchError::Malformed(
                "expected a JSON object or array".to_string(),
            ));
        }
    };

    found.ok_or_else(|| FetchError::NotFound(format!("channel '{}' is not published", key)))
}

/// First version-like field of a single-release document.
pub(crate) fn latest_version(doc: &Value) -> Result<String, FetchError> {
    if !doc.is_object() {
        return Err(FetchError::Malformed("expected a JSON object".to_string()));
    }

    LATEST_KEYS
        .iter()
        .find_map(|key| doc.get(key).and_then(as_version))
        .ok_or_else(|| FetchError::NotFound(format!("none of {:?} present", LATEST_KEYS)))
}

/// Highest candidate captured by `pattern` anywhere in `page`.
pub(crate) fn scrape(
    page: &str,
    pattern: &str,
    comparator: &Comparator,
) -> Result<String, FetchError> {
    let re = Regex::new(pattern).map_err(|e| ExtractError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let candidates: Vec<String> = re
        .captures_iter(page)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| normalize(m.as_str()))
        .filter(|v| !v.is_empty())
        .collect();

    comparator
        .pick_max(&candidates)
        .ok_or_else(|| FetchError::NotFound(format!("'{}' matched nothing", pattern)))
}

async fn deb_repository(
    http: &HttpClient,
    comparator: &Comparator,
    url: &str,
    package: &str,
) -> Result<RawVersion, FetchError> {
    let base = url.trim_end_matches('/');
    let release = http
        .get_text(&format!("{}/Release", base))
        .await
        .map_err(FetchError::request)?;

    let index = packages_index(&release).ok_or_else(|| {
        FetchError::Malformed(format!("Release file lists no {}", DEB_INDEX_SUFFIX))
    })?;
    debug!("Using package index {}", index);

    let compressed = http
        .get_bytes(&format!("{}/{}", base, index))
        .await
        .map_err(FetchError::request)?;

    let mut packages = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut packages)
        .map_err(|e| FetchError::Malformed(format!("cannot decompress {}: {}", index, e)))?;

    let versions = package_versions(&packages, package);
    comparator
        .pick_max(&versions)
        .map(RawVersion::new)
        .ok_or_else(|| FetchError::NotFound(format!("package '{}' not in {}", package, index)))
}

/// Path of the amd64 package index named in a `Release` file.
pub(crate) fn packages_index(release: &str) -> Option<String> {
    release
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .find(|path| path.ends_with(DEB_INDEX_SUFFIX))
        .map(str::to_string)
}

/// Upstream versions of every stanza for `package` in a `Packages` file.
///
/// The Debian epoch and revision are dropped: only the upstream part is
/// comparable with a recipe version.
pub(crate) fn package_versions(packages: &str, package: &str) -> Vec<String> {
    packages
        .split("\n\n")
        .filter(|stanza| {
            stanza
                .lines()
                .any(|l| l.strip_prefix("Package:").map(str::trim) == Some(package))
        })
        .filter_map(|stanza| {
            stanza
                .lines()
                .find_map(|l| l.strip_prefix("Version:"))
                .map(|v| debian_upstream(v.trim()).to_string())
        })
        .filter(|v| !v.is_empty())
        .collect()
}

fn debian_upstream(version: &str) -> &str {
    let without_epoch = match version.split_once(':') {
        Some((epoch, rest)) if epoch.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => version,
    };
    match without_epoch.rsplit_once('-') {
        Some((upstream, _revision)) => upstream,
        None => without_epoch,
    }
}
