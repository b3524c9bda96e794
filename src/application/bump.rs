//! Bump action - moves recipes classified `UPDATE` to their upstream version.
//!
//! Each bump runs under a [`RecipeBackup`]: either the version change, the
//! checksum refresh, the build and the optional install all succeed, or the
//! recipe files are written back as they were.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::prompt::ConfirmGate;
use crate::recipe::{PKGBUILD, RecipeBackup, set_version};
use crate::runtime::Runtime;
use crate::tools::{ArtifactName, BuildTool, PackageManager};
use crate::version::PackageStatus;

use super::{Cancellation, CheckEntry};

#[derive(Debug, Clone, Default)]
pub struct BumpOptions {
    /// Report planned bumps only
    pub dry_run: bool,
    /// Install the rebuilt packages that were installed before
    pub install: bool,
    /// Clean the build directory before building
    pub clean: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpOutcome {
    Planned,
    Bumped,
    Declined,
    /// Not reached because the run was stopped
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpResult {
    pub name: String,
    pub from: String,
    pub to: String,
    pub outcome: BumpOutcome,
}

impl BumpResult {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, BumpOutcome::Failed(_))
    }
}

pub struct BumpAction<'a, R: Runtime, B: BuildTool, P: PackageManager> {
    runtime: &'a R,
    build: &'a B,
    packages: &'a P,
    root: PathBuf,
}

impl<'a, R: Runtime, B: BuildTool, P: PackageManager> BumpAction<'a, R, B, P> {
    pub fn new(runtime: &'a R, build: &'a B, packages: &'a P, root: PathBuf) -> Self {
        Self {
            runtime,
            build,
            packages,
            root,
        }
    }

    /// Bump every `UPDATE` entry of a check report, in report order.
    #[tracing::instrument(skip(self, entries, gate, cancel))]
    pub fn run(
        &self,
        entries: &[CheckEntry],
        options: &BumpOptions,
        gate: &mut ConfirmGate<'_, R>,
        cancel: &Cancellation,
    ) -> Vec<BumpResult> {
        let mut results = Vec::new();
        let mut stopped = false;

        for entry in entries.iter().filter(|e| e.status == PackageStatus::Update) {
            let mut result = BumpResult {
                name: entry.name.clone(),
                from: entry.current.clone(),
                to: entry.upstream.clone(),
                outcome: BumpOutcome::Skipped,
            };

            if !stopped && (cancel.is_cancelled() || gate.is_aborted()) {
                warn!("Stopping before {}", entry.name);
                stopped = true;
            }
            if stopped {
                results.push(result);
                continue;
            }

            result.outcome = if options.dry_run {
                BumpOutcome::Planned
            } else {
                self.confirm_and_bump(&result, options, gate)
            };
            if let BumpOutcome::Failed(reason) = &result.outcome {
                warn!("{}: {}", result.name, reason);
            }
            results.push(result);
        }

        results
    }

    fn confirm_and_bump(
        &self,
        plan: &BumpResult,
        options: &BumpOptions,
        gate: &mut ConfirmGate<'_, R>,
    ) -> BumpOutcome {
        let question = format!("Bump {} {} -> {}?", plan.name, plan.from, plan.to);
        match gate.ask(&question) {
            Ok(answer) if answer.proceeds() => {}
            Ok(_) => return BumpOutcome::Declined,
            Err(e) => return BumpOutcome::Failed(format!("{:#}", e)),
        }

        match self.bump_one(&self.root.join(&plan.name), &plan.to, options) {
            Ok(()) => {
                info!("{}: bumped to {}", plan.name, plan.to);
                BumpOutcome::Bumped
            }
            Err(e) => BumpOutcome::Failed(format!("{:#}", e)),
        }
    }

    /// Rewrite, rebuild and optionally reinstall one recipe.
    pub fn bump_one(&self, dir: &Path, pkgver: &str, options: &BumpOptions) -> Result<()> {
        let backup = RecipeBackup::new(self.runtime, dir)?;

        let pkgbuild = dir.join(PKGBUILD);
        let content = self.runtime.read_to_string(&pkgbuild)?;
        let updated = set_version(&content, pkgver)
            .with_context(|| format!("Cannot set pkgver in {:?}", pkgbuild))?;
        self.runtime.write(&pkgbuild, updated.as_bytes())?;

        self.build.refresh_checksums(dir)?;
        self.build.write_srcinfo(dir)?;

        // Recorded before the build so a fresh install never sneaks in
        let reinstall = if options.install {
            self.installed_names(dir)?
        } else {
            Vec::new()
        };

        self.build
            .build(dir, options.clean)
            .with_context(|| format!("Failed to build {:?}", dir))?;

        if !reinstall.is_empty() {
            let artifacts = self.build.artifact_paths(dir)?;
            let paths: Vec<PathBuf> = artifacts
                .into_iter()
                .filter(|p| {
                    ArtifactName::parse(p).is_some_and(|a| reinstall.contains(&a.name))
                })
                .collect();
            if paths.is_empty() {
                anyhow::bail!("Build produced no artifacts for {}", reinstall.join(", "));
            }
            self.packages.install(&paths)?;
        }

        backup.commit();
        Ok(())
    }

    fn installed_names(&self, dir: &Path) -> Result<Vec<String>> {
        let mut installed = Vec::new();
        for name in self.build.package_names(dir)? {
            if self.packages.installed_version(&name)?.is_some() {
                installed.push(name);
            }
        }
        debug!("Installed from {:?}: {:?}", dir, installed);
        Ok(installed)
    }
}
