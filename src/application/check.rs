//! Check action - resolves upstream versions and classifies every package.

use anyhow::{Result, bail};
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::fetcher::{VersionFetcher, upstream_version};
use crate::recipe::{PKGBUILD, Recipe};
use crate::registry::FeedRegistry;
use crate::runtime::Runtime;
use crate::version::{Comparator, PackageStatus, StatusInput, classify, is_vcs_name};

use super::{Cancellation, recipe_dirs};

/// A registered package whose recipe is missing.
#[derive(Debug, thiserror::Error)]
#[error("package '{name}': {reason}")]
pub struct ValidationError {
    pub name: String,
    pub reason: String,
}

/// One line of the check report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub status: PackageStatus,
    /// Recipe `pkgver`, empty when there is no readable recipe
    pub current: String,
    pub upstream: String,
    /// Feed type, `-` when the package has none
    pub feed: String,
    pub error: Option<String>,
}

impl CheckEntry {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Restrict to these packages; all when empty
    pub packages: Vec<String>,
    /// Concurrent upstream lookups
    pub jobs: usize,
    /// Missing recipes are fatal
    pub strict: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            jobs: 1,
            strict: false,
        }
    }
}

/// Check action - compares recipes against their upstream feeds
pub struct CheckAction<'a, R: Runtime, F: VersionFetcher> {
    runtime: &'a R,
    registry: &'a FeedRegistry,
    fetcher: &'a F,
    comparator: Comparator,
    root: PathBuf,
}

impl<'a, R: Runtime, F: VersionFetcher> CheckAction<'a, R, F> {
    pub fn new(
        runtime: &'a R,
        registry: &'a FeedRegistry,
        fetcher: &'a F,
        comparator: Comparator,
        root: PathBuf,
    ) -> Self {
        Self {
            runtime,
            registry,
            fetcher,
            comparator,
            root,
        }
    }

    /// Packages to check: registry order, then unregistered recipe
    /// directories alphabetically, optionally narrowed to `packages`.
    pub fn select(&self, packages: &[String]) -> Result<Vec<String>> {
        let mut names = self.registry.list_names();
        let unregistered: Vec<String> = if self.runtime.is_dir(&self.root) {
            recipe_dirs(self.runtime, &self.root)?
                .into_iter()
                .filter(|n| !self.registry.has(n))
                .collect()
        } else {
            Vec::new()
        };
        names.extend(unregistered);

        if packages.is_empty() {
            return Ok(names);
        }

        for requested in packages {
            if !names.contains(requested) {
                bail!(
                    "Unknown package '{}': not in the registry and no recipe directory",
                    requested
                );
            }
        }
        Ok(names.into_iter().filter(|n| packages.contains(n)).collect())
    }

    /// Registered packages without a recipe are warnings, or errors when strict.
    pub fn validate(&self, names: &[String], strict: bool) -> Result<()> {
        for name in names.iter().filter(|n| self.registry.has(n)) {
            let pkgbuild = self.root.join(name).join(PKGBUILD);
            if self.runtime.exists(&pkgbuild) {
                continue;
            }
            let err = ValidationError {
                name: name.clone(),
                reason: format!("no recipe at {:?}", pkgbuild),
            };
            if strict {
                return Err(err.into());
            }
            warn!("{}", err);
        }
        Ok(())
    }

    /// Check the selected packages. Report order follows selection order.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(
        &self,
        options: &CheckOptions,
        cancel: &Cancellation,
    ) -> Result<Vec<CheckEntry>> {
        let names = self.select(&options.packages)?;
        self.validate(&names, options.strict)?;
        debug!("Checking {} package(s) with {} job(s)", names.len(), options.jobs);

        let entries = stream::iter(names)
            .map(|name| async move {
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(self.check_one(&name).await)
                }
            })
            .buffered(options.jobs.max(1))
            .filter_map(|entry| async move { entry })
            .collect::<Vec<_>>()
            .await;

        Ok(entries)
    }

    /// Resolve and classify a single package. Failures end up in the entry.
    pub async fn check_one(&self, name: &str) -> CheckEntry {
        let descriptor = self.registry.descriptor(name);
        let recipe = self.read_recipe(name);

        let current = recipe
            .as_ref()
            .map(|r| r.pkgver.clone())
            .unwrap_or_default();
        let is_vcs = is_vcs_name(name)
            || descriptor.is_some_and(|d| d.is_vcs_feed())
            || recipe.as_ref().is_some_and(Recipe::is_vcs);

        let (upstream, error) = match descriptor.filter(|d| d.has_feed()) {
            None => (String::new(), None),
            Some(d) => match self.fetcher.resolve(d).await {
                Ok(raw) => match upstream_version(&raw, d) {
                    Ok(version) => (version, None),
                    Err(e) => (String::new(), Some(e.to_string())),
                },
                Err(e) => (String::new(), Some(e.to_string())),
            },
        };

        // A VCS package is never compared, so its tag lookup is informational
        let error = match error {
            Some(err) if is_vcs => {
                info!("{}: no upstream tag for VCS package: {}", name, err);
                None
            }
            other => other,
        };

        if let Some(err) = &error {
            warn!("{}: {}", name, err);
        }

        let status = classify(
            &StatusInput {
                current_local: &current,
                upstream: &upstream,
                has_feed: descriptor.is_some_and(|d| d.has_feed()),
                is_vcs,
                is_manual: descriptor.is_some_and(|d| d.is_manual()),
            },
            &self.comparator,
        );

        CheckEntry {
            name: name.to_string(),
            status,
            current,
            upstream,
            feed: descriptor.map_or("-", |d| d.kind()).to_string(),
            error,
        }
    }

    fn read_recipe(&self, name: &str) -> Option<Recipe> {
        let dir = self.root.join(name);
        if !self.runtime.exists(&dir.join(PKGBUILD)) {
            return None;
        }
        match Recipe::read(self.runtime, &dir) {
            Ok(recipe) => Some(recipe),
            Err(e) => {
                warn!("{}: cannot read recipe: {:#}", name, e);
                None
            }
        }
    }
}
