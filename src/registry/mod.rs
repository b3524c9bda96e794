//! Feed registry: the declarative list of packages and their version sources.
//!
//! The registry file is JSON with a top-level `schemaVersion` and an ordered
//! `packages` array. Schema 1 keeps feed fields under a `feed` object, schema 2
//! puts them directly on the package. Lookups try the schema's own location
//! first and then the other one, so both shapes load to the same descriptors.

mod descriptor;

use log::debug;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::provider::RepoId;
use crate::runtime::Runtime;
use crate::version::Extraction;

pub use descriptor::{Channel, FeedDescriptor, FeedSource, VendorAdapter};

/// Schema assumed when the file does not declare one.
pub const DEFAULT_SCHEMA: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read feed registry {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("feed registry is not valid: {0}")]
    Malformed(String),

    #[error("unsupported registry schemaVersion {0}")]
    UnsupportedSchema(u64),

    #[error("package entry #{0} has no name")]
    MissingName(usize),

    #[error("package '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("package '{name}': unknown feed type '{kind}'")]
    UnknownType { name: String, kind: String },

    #[error("package '{name}': unknown channel '{channel}'")]
    UnknownChannel { name: String, channel: String },

    #[error("package '{name}': feed type '{kind}' requires '{field}'")]
    MissingField {
        name: String,
        kind: String,
        field: &'static str,
    },

    #[error("package '{name}': '{repo}' is not an owner/repo name")]
    InvalidRepo { name: String, repo: String },

    #[error("package '{name}': invalid {field} '{pattern}': {message}")]
    InvalidPattern {
        name: String,
        field: &'static str,
        pattern: String,
        message: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    #[serde(default = "default_schema")]
    schema_version: u64,
    packages: Vec<Map<String, Value>>,
}

fn default_schema() -> u64 {
    DEFAULT_SCHEMA
}

#[derive(Debug)]
struct Entry {
    raw: Map<String, Value>,
    descriptor: FeedDescriptor,
}

/// Immutable snapshot of the feed registry, loaded once per run.
#[derive(Debug)]
pub struct FeedRegistry {
    schema_version: u64,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl FeedRegistry {
    /// Load and validate the registry file at `path`.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self, LoadError> {
        debug!("Loading feed registry from {:?}", path);
        let content = runtime
            .read_to_string(path)
            .map_err(|e| LoadError::Unreadable {
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            })?;
        Self::from_json(&content)
    }

    /// Parse and validate registry JSON.
    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        let file: RegistryFile =
            serde_json::from_str(content).map_err(|e| LoadError::Malformed(e.to_string()))?;

        if !(1..=2).contains(&file.schema_version) {
            return Err(LoadError::UnsupportedSchema(file.schema_version));
        }

        let mut entries = Vec::with_capacity(file.packages.len());
        let mut index = HashMap::new();

        for (position, raw) in file.packages.into_iter().enumerate() {
            let fields = Fields {
                schema: file.schema_version,
                raw: &raw,
            };
            let name = fields
                .get("name")
                .filter(|n| !n.trim().is_empty())
                .ok_or(LoadError::MissingName(position))?;

            if index.contains_key(&name) {
                return Err(LoadError::DuplicateName(name));
            }

            let descriptor = build_descriptor(name.clone(), &fields)?;
            index.insert(name, entries.len());
            entries.push(Entry { raw, descriptor });
        }

        debug!(
            "Loaded {} registry entries (schema {})",
            entries.len(),
            file.schema_version
        );

        Ok(Self {
            schema_version: file.schema_version,
            entries,
            index,
        })
    }

    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Package names in registry order.
    pub fn list_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&FeedDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    /// Descriptors in registry order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FeedDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Raw field lookup independent of the schema shape.
    pub fn get_field(&self, name: &str, field: &str) -> Option<String> {
        let &i = self.index.get(name)?;
        Fields {
            schema: self.schema_version,
            raw: &self.entries[i].raw,
        }
        .get(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Field view over one raw package object.
struct Fields<'a> {
    schema: u64,
    raw: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn get(&self, field: &str) -> Option<String> {
        let nested = || {
            self.raw
                .get("feed")
                .and_then(Value::as_object)
                .and_then(|feed| feed.get(field))
        };
        let flat = || self.raw.get(field);

        let value = if self.schema >= 2 {
            flat().or_else(nested)
        } else {
            nested().or_else(flat)
        };

        match value? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn build_descriptor(name: String, fields: &Fields<'_>) -> Result<FeedDescriptor, LoadError> {
    let source = build_source(&name, fields)?;

    let extraction = match fields.get("versionRegex") {
        Some(pattern) => {
            validate_pattern(&name, "versionRegex", &pattern)?;
            Some(Extraction::new(pattern, fields.get("versionFormat")))
        }
        None => None,
    };

    Ok(FeedDescriptor {
        name,
        schema_version: fields.schema,
        source,
        extraction,
    })
}

fn build_source(name: &str, fields: &Fields<'_>) -> Result<Option<FeedSource>, LoadError> {
    let Some(kind) = fields.get("type") else {
        return Ok(None);
    };

    let require = |field: &'static str| {
        fields.get(field).ok_or_else(|| LoadError::MissingField {
            name: name.to_string(),
            kind: kind.clone(),
            field,
        })
    };
    let repo = |value: String| {
        value.parse::<RepoId>().map_err(|_| LoadError::InvalidRepo {
            name: name.to_string(),
            repo: value,
        })
    };
    let channel = || match fields.get("channel") {
        Some(value) => value.parse::<Channel>().map_err(|channel| LoadError::UnknownChannel {
            name: name.to_string(),
            channel,
        }),
        None => Ok(Channel::default()),
    };
    let pattern = |field: &'static str| -> Result<String, LoadError> {
        let value = require(field)?;
        validate_pattern(name, field, &value)?;
        Ok(value)
    };

    let source = match kind.as_str() {
        "github-release" => FeedSource::GithubRelease {
            repo: repo(require("repo")?)?,
            channel: channel()?,
        },
        "github-release-filtered" => FeedSource::GithubReleaseFiltered {
            repo: repo(require("repo")?)?,
            channel: channel()?,
            tag_pattern: pattern("tagRegex")?,
        },
        "github-tags-filtered" => FeedSource::GithubTagsFiltered {
            repo: repo(require("repo")?)?,
            tag_pattern: match fields.get("tagRegex") {
                Some(_) => Some(pattern("tagRegex")?),
                None => None,
            },
        },
        "vcs" => FeedSource::Vcs {
            repo: fields.get("repo").map(repo).transpose()?,
        },
        "manual" => FeedSource::Manual,
        "channel-json" => FeedSource::Vendor(VendorAdapter::ChannelJson {
            url: require("url")?,
            channel: channel()?,
        }),
        "latest-json" => FeedSource::Vendor(VendorAdapter::LatestJson {
            url: require("url")?,
        }),
        "deb-repository" => FeedSource::Vendor(VendorAdapter::DebRepository {
            url: require("url")?,
            package: fields.get("repo").unwrap_or_else(|| name.to_string()),
        }),
        "page-scrape" => FeedSource::Vendor(VendorAdapter::PageScrape {
            url: require("url")?,
            pattern: pattern("tagRegex")?,
        }),
        _ => {
            return Err(LoadError::UnknownType {
                name: name.to_string(),
                kind: kind.clone(),
            });
        }
    };

    Ok(Some(source))
}

fn validate_pattern(name: &str, field: &'static str, pattern: &str) -> Result<(), LoadError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| LoadError::InvalidPattern {
            name: name.to_string(),
            field,
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}
