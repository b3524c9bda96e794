//! Reconcile action - brings installed packages in line with their recipes.
//!
//! For each recipe directory the installed versions of its produced packages
//! are compared with the recipe version, and the directory gets exactly one
//! [`Decision`]. Only packages that are already installed are ever touched.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::prompt::ConfirmGate;
use crate::recipe::Recipe;
use crate::runtime::Runtime;
use crate::tools::{ArtifactName, BuildTool, PackageManager};
use crate::version::Comparator;

use super::{Cancellation, recipe_dirs};

/// What is known about one produced package during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackageState {
    pub name: String,
    pub installed_version: Option<String>,
    pub local_recipe_version: String,
    pub produced_artifact_paths: Vec<PathBuf>,
}

/// The action chosen for one recipe directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// None of the produced packages is installed
    NotInstalled,
    /// Something installed is newer than the recipe; nothing is done
    NewerInstalled { names: Vec<String> },
    /// Artifacts for every outdated installed package already exist
    InstallArtifacts { paths: Vec<PathBuf> },
    /// Build first, then install the installed subset
    BuildAndInstall { names: Vec<String> },
    UpToDate,
}

impl Decision {
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            Decision::InstallArtifacts { .. } | Decision::BuildAndInstall { .. }
        )
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NotInstalled => write!(f, "not installed"),
            Decision::NewerInstalled { names } => {
                write!(f, "newer version installed ({})", names.join(", "))
            }
            Decision::InstallArtifacts { paths } => {
                write!(f, "install {} existing artifact(s)", paths.len())
            }
            Decision::BuildAndInstall { names } => {
                write!(f, "build and install {}", names.join(", "))
            }
            Decision::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Choose the action for one directory.
///
/// A newer installed package wins over an older one, so a split package is
/// never partially downgraded. `artifact_exists` decides whether the expected
/// artifacts are already on disk.
pub fn decide(
    states: &[InstalledPackageState],
    comparator: &Comparator,
    artifact_exists: impl Fn(&Path) -> bool,
) -> Decision {
    let installed: Vec<(&InstalledPackageState, &str)> = states
        .iter()
        .filter_map(|s| s.installed_version.as_deref().map(|v| (s, v)))
        .collect();

    if installed.is_empty() {
        return Decision::NotInstalled;
    }

    let ordering =
        |s: &InstalledPackageState, v: &str| comparator.ordering(v, &s.local_recipe_version);

    let newer: Vec<String> = installed
        .iter()
        .filter(|&&(s, v)| ordering(s, v) == Ordering::Greater)
        .map(|&(s, _)| s.name.clone())
        .collect();
    if !newer.is_empty() {
        return Decision::NewerInstalled { names: newer };
    }

    if installed
        .iter()
        .all(|&(s, v)| ordering(s, v) == Ordering::Equal)
    {
        return Decision::UpToDate;
    }

    let ready = installed.iter().all(|&(s, _)| {
        !s.produced_artifact_paths.is_empty()
            && s.produced_artifact_paths.iter().all(|p| artifact_exists(p))
    });

    if ready {
        Decision::InstallArtifacts {
            paths: installed
                .iter()
                .flat_map(|&(s, _)| s.produced_artifact_paths.iter().cloned())
                .collect(),
        }
    } else {
        Decision::BuildAndInstall {
            names: installed.iter().map(|&(s, _)| s.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Restrict to these recipe directories; all when empty
    pub dirs: Vec<String>,
    pub dry_run: bool,
    /// Clean the build directory before building
    pub clean: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do, or dry run
    Unchanged,
    Updated,
    Declined,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ReconcileEntry {
    pub dir: String,
    pub decision: Option<Decision>,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub entries: Vec<ReconcileEntry>,
}

impl ReconcileReport {
    pub fn checked(&self) -> usize {
        self.entries.len()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| *o == ReconcileOutcome::Updated)
    }

    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.outcome {
                ReconcileOutcome::Failed(reason) => Some((e.dir.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ReconcileOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Reconcile action - installs or rebuilds outdated installed packages
pub struct ReconcileAction<'a, R: Runtime, B: BuildTool, P: PackageManager> {
    runtime: &'a R,
    build: &'a B,
    packages: &'a P,
    comparator: Comparator,
    root: PathBuf,
}

impl<'a, R: Runtime, B: BuildTool, P: PackageManager> ReconcileAction<'a, R, B, P> {
    pub fn new(
        runtime: &'a R,
        build: &'a B,
        packages: &'a P,
        comparator: Comparator,
        root: PathBuf,
    ) -> Self {
        Self {
            runtime,
            build,
            packages,
            comparator,
            root,
        }
    }

    /// Collect the state of every package a directory produces.
    pub fn states(&self, dir: &Path) -> Result<Vec<InstalledPackageState>> {
        let recipe = Recipe::read(self.runtime, dir)?;
        let recipe_version = recipe.version().to_string();
        let names = self.build.package_names(dir)?;
        let artifacts = self.build.artifact_paths(dir)?;

        names
            .into_iter()
            .map(|name| {
                let installed_version = self.packages.installed_version(&name)?;
                let produced_artifact_paths = artifacts_for(&artifacts, &name);
                Ok::<_, anyhow::Error>(InstalledPackageState {
                    name,
                    installed_version,
                    local_recipe_version: recipe_version.clone(),
                    produced_artifact_paths,
                })
            })
            .collect()
    }

    pub fn plan(&self, dir: &Path) -> Result<Decision> {
        let states = self.states(dir)?;
        Ok(decide(&states, &self.comparator, |p| self.runtime.exists(p)))
    }

    #[tracing::instrument(skip(self, gate, cancel))]
    pub fn run(
        &self,
        options: &ReconcileOptions,
        gate: &mut ConfirmGate<'_, R>,
        cancel: &Cancellation,
    ) -> Result<ReconcileReport> {
        let dirs = if options.dirs.is_empty() {
            recipe_dirs(self.runtime, &self.root)?
        } else {
            options.dirs.clone()
        };

        let mut report = ReconcileReport::default();
        for name in dirs {
            if cancel.is_cancelled() || gate.is_aborted() {
                warn!("Stopping before {}", name);
                break;
            }

            let dir = self.root.join(&name);
            let decision = match self.plan(&dir) {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("{}: {:#}", name, e);
                    report.entries.push(ReconcileEntry {
                        dir: name,
                        decision: None,
                        outcome: ReconcileOutcome::Failed(format!("{:#}", e)),
                    });
                    continue;
                }
            };
            debug!("{}: {}", name, decision);

            if let Decision::NewerInstalled { names } = &decision {
                warn!(
                    "{}: installed {} newer than the recipe; leaving as is",
                    name,
                    names.join(", ")
                );
            }

            let outcome = if options.dry_run || !decision.is_action() {
                ReconcileOutcome::Unchanged
            } else {
                self.apply(&name, &dir, &decision, options.clean, gate)
            };

            if let ReconcileOutcome::Failed(reason) = &outcome {
                warn!("{}: {}", name, reason);
            }
            report.entries.push(ReconcileEntry {
                dir: name,
                decision: Some(decision),
                outcome,
            });
        }

        Ok(report)
    }

    fn apply(
        &self,
        name: &str,
        dir: &Path,
        decision: &Decision,
        clean: bool,
        gate: &mut ConfirmGate<'_, R>,
    ) -> ReconcileOutcome {
        let answer = match gate.ask(&format!("{}: {}?", name, decision)) {
            Ok(answer) => answer,
            Err(e) => return ReconcileOutcome::Failed(format!("{:#}", e)),
        };
        if !answer.proceeds() {
            return ReconcileOutcome::Declined;
        }

        let result = match decision {
            Decision::InstallArtifacts { paths } => self.install(paths),
            Decision::BuildAndInstall { names } => self.build_and_install(dir, names, clean),
            _ => Ok(()),
        };

        match result {
            Ok(()) => {
                info!("{}: updated", name);
                ReconcileOutcome::Updated
            }
            Err(e) => ReconcileOutcome::Failed(format!("{:#}", e)),
        }
    }

    fn install(&self, paths: &[PathBuf]) -> Result<()> {
        self.packages.install(paths)?;
        Ok(())
    }

    fn build_and_install(&self, dir: &Path, names: &[String], clean: bool) -> Result<()> {
        self.build
            .build(dir, clean)
            .with_context(|| format!("Failed to build {:?}", dir))?;

        // Paths can change with the build (pkgver() functions), so ask again
        let artifacts = self.build.artifact_paths(dir)?;
        let paths: Vec<PathBuf> = names
            .iter()
            .flat_map(|n| artifacts_for(&artifacts, n))
            .collect();

        if let Some(missing) = paths.iter().find(|p| !self.runtime.exists(p)) {
            anyhow::bail!("Build did not produce {:?}", missing);
        }
        if paths.is_empty() {
            anyhow::bail!("Build produced no artifacts for {}", names.join(", "));
        }
        self.install(&paths)
    }
}

fn artifacts_for(artifacts: &[PathBuf], name: &str) -> Vec<PathBuf> {
    artifacts
        .iter()
        .filter(|p| ArtifactName::parse(p).is_some_and(|a| a.name == name))
        .cloned()
        .collect()
}
