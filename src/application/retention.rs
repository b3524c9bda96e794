//! Retention and orphan policy over the local package repository.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::prompt::ConfirmGate;
use crate::registry::FeedRegistry;
use crate::runtime::Runtime;
use crate::tools::{ArtifactName, RepoIndex};

/// A package file in the repository directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoArtifact {
    pub path: PathBuf,
    pub name: String,
    pub modified: SystemTime,
}

/// Every `*.pkg.tar*` artifact in `repo_dir`; signatures are not artifacts.
pub fn list_artifacts<R: Runtime>(runtime: &R, repo_dir: &Path) -> Result<Vec<RepoArtifact>> {
    let dir = repo_dir
        .to_str()
        .with_context(|| format!("Repository path {:?} is not valid UTF-8", repo_dir))?;
    let pattern = format!("{}/*.pkg.tar*", glob::Pattern::escape(dir.trim_end_matches('/')));

    let mut artifacts = Vec::new();
    for path in runtime.glob(&pattern)? {
        let Some(parsed) = ArtifactName::parse(&path) else {
            continue;
        };
        let modified = runtime.modified(&path)?;
        artifacts.push(RepoArtifact {
            path,
            name: parsed.name,
            modified,
        });
    }
    debug!("{} artifact(s) in {:?}", artifacts.len(), repo_dir);
    Ok(artifacts)
}

/// Artifacts beyond the `keep` most recent of each package, oldest last.
pub fn select_expired(artifacts: &[RepoArtifact], keep: usize) -> Vec<PathBuf> {
    let mut by_name: BTreeMap<&str, Vec<&RepoArtifact>> = BTreeMap::new();
    for artifact in artifacts {
        by_name.entry(&artifact.name).or_default().push(artifact);
    }

    by_name
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(|a, b| b.modified.cmp(&a.modified));
            group.into_iter().skip(keep).map(|a| a.path.clone())
        })
        .collect()
}

/// Package names present in the repository but absent from the registry.
pub fn find_orphans(artifacts: &[RepoArtifact], registry: &FeedRegistry) -> Vec<String> {
    artifacts
        .iter()
        .map(|a| a.name.as_str())
        .filter(|name| !registry.has(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub expired: Vec<PathBuf>,
    pub removed: usize,
    /// Artifacts or signatures that could not be deleted.
    pub failed: usize,
    pub declined: bool,
}

#[derive(Debug, Default)]
pub struct OrphanReport {
    pub orphans: Vec<String>,
    /// Artifacts belonging to the orphaned packages.
    pub candidates: usize,
    pub removed: usize,
    pub failed: usize,
    pub declined: bool,
}

/// Outcome of deleting a batch of artifacts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Removal {
    removed: usize,
    failed: usize,
}

/// Retention action - keeps the repository directory and its index tidy
pub struct RetentionAction<'a, R: Runtime, I: RepoIndex> {
    runtime: &'a R,
    index: &'a I,
    repo_dir: PathBuf,
}

impl<'a, R: Runtime, I: RepoIndex> RetentionAction<'a, R, I> {
    pub fn new(runtime: &'a R, index: &'a I, repo_dir: PathBuf) -> Self {
        Self {
            runtime,
            index,
            repo_dir,
        }
    }

    /// Remove all but the `keep` newest artifacts of every package.
    #[tracing::instrument(skip(self, gate))]
    pub fn prune(
        &self,
        keep: usize,
        dry_run: bool,
        gate: &mut ConfirmGate<'_, R>,
    ) -> Result<PruneReport> {
        let artifacts = list_artifacts(self.runtime, &self.repo_dir)?;
        let expired = select_expired(&artifacts, keep);
        let mut report = PruneReport {
            expired,
            ..Default::default()
        };

        if report.expired.is_empty() || dry_run {
            return Ok(report);
        }

        let question = format!("Remove {} old artifact(s)?", report.expired.len());
        if !gate.ask(&question)?.proceeds() {
            report.declined = true;
            return Ok(report);
        }

        let removal = self.remove_and_reindex(&report.expired)?;
        report.removed = removal.removed;
        report.failed = removal.failed;
        Ok(report)
    }

    /// Report, and with `remove` delete, artifacts of unregistered packages.
    #[tracing::instrument(skip(self, registry, gate))]
    pub fn orphans(
        &self,
        registry: &FeedRegistry,
        remove: bool,
        dry_run: bool,
        gate: &mut ConfirmGate<'_, R>,
    ) -> Result<OrphanReport> {
        let artifacts = list_artifacts(self.runtime, &self.repo_dir)?;
        let orphans = find_orphans(&artifacts, registry);
        let doomed: Vec<PathBuf> = artifacts
            .iter()
            .filter(|a| orphans.contains(&a.name))
            .map(|a| a.path.clone())
            .collect();
        let mut report = OrphanReport {
            orphans,
            candidates: doomed.len(),
            ..Default::default()
        };

        if !remove || dry_run || report.orphans.is_empty() {
            return Ok(report);
        }

        let question = format!("Remove {} orphaned package(s)?", report.orphans.len());
        if !gate.ask(&question)?.proceeds() {
            report.declined = true;
            return Ok(report);
        }

        let removal = self.remove_and_reindex(&doomed)?;
        report.removed = removal.removed;
        report.failed = removal.failed;
        Ok(report)
    }

    /// Delete `doomed` and their signatures, then rebuild the index from
    /// whatever is left, even when some deletions failed.
    fn remove_and_reindex(&self, doomed: &[PathBuf]) -> Result<Removal> {
        let mut removal = Removal::default();
        for path in doomed {
            match self.runtime.remove_file(path) {
                Ok(()) => {
                    info!("Removed {:?}", path);
                    removal.removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove {:?}: {:#}", path, e);
                    removal.failed += 1;
                    continue;
                }
            }

            let mut sig = path.clone().into_os_string();
            sig.push(".sig");
            let sig = PathBuf::from(sig);
            if self.runtime.exists(&sig)
                && let Err(e) = self.runtime.remove_file(&sig)
            {
                warn!("Failed to remove signature {:?}: {:#}", sig, e);
                removal.failed += 1;
            }
        }

        let remaining: Vec<PathBuf> = list_artifacts(self.runtime, &self.repo_dir)?
            .into_iter()
            .map(|a| a.path)
            .collect();
        self.index.regenerate(&remaining)?;
        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::tools::MockRepoIndex;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn artifact(file: &str, age_secs: u64) -> RepoArtifact {
        let path = PathBuf::from("/repo").join(file);
        RepoArtifact {
            name: ArtifactName::parse(&path).unwrap().name,
            path,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 - age_secs),
        }
    }

    #[test]
    fn test_select_expired_keeps_newest_per_package() {
        let artifacts = vec![
            artifact("tool-1.0-1-x86_64.pkg.tar.zst", 300),
            artifact("tool-1.2-1-x86_64.pkg.tar.zst", 100),
            artifact("tool-1.1-1-x86_64.pkg.tar.zst", 200),
            artifact("other-3.0-1-any.pkg.tar.zst", 900),
        ];

        let expired = select_expired(&artifacts, 2);
        assert_eq!(expired, vec![PathBuf::from("/repo/tool-1.0-1-x86_64.pkg.tar.zst")]);

        let expired = select_expired(&artifacts, 1);
        assert_eq!(expired.len(), 2);
        assert!(!expired.contains(&PathBuf::from("/repo/tool-1.2-1-x86_64.pkg.tar.zst")));
        assert!(select_expired(&artifacts, 5).is_empty());
    }

    #[test]
    fn test_select_expired_keeps_two_of_five() {
        let artifacts = vec![
            artifact("tool-1.3-1-x86_64.pkg.tar.zst", 200),
            artifact("tool-1.0-1-x86_64.pkg.tar.zst", 500),
            artifact("tool-1.4-1-x86_64.pkg.tar.zst", 100),
            artifact("tool-1.2-1-x86_64.pkg.tar.zst", 300),
            artifact("tool-1.1-1-x86_64.pkg.tar.zst", 400),
        ];

        let mut expired = select_expired(&artifacts, 2);
        expired.sort();
        assert_eq!(
            expired,
            vec![
                PathBuf::from("/repo/tool-1.0-1-x86_64.pkg.tar.zst"),
                PathBuf::from("/repo/tool-1.1-1-x86_64.pkg.tar.zst"),
                PathBuf::from("/repo/tool-1.2-1-x86_64.pkg.tar.zst"),
            ]
        );
    }

    #[test]
    fn test_find_orphans_is_a_sorted_set() {
        let registry =
            FeedRegistry::from_json(r#"{"packages": [{"name": "tool"}]}"#).unwrap();
        let artifacts = vec![
            artifact("zeta-1-1-any.pkg.tar.zst", 1),
            artifact("tool-1.0-1-x86_64.pkg.tar.zst", 1),
            artifact("alpha-2-1-any.pkg.tar.zst", 2),
            artifact("alpha-1-1-any.pkg.tar.zst", 3),
        ];
        assert_eq!(find_orphans(&artifacts, &registry), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_list_artifacts_skips_signatures_and_databases() {
        let dir = tempdir().unwrap();
        for file in [
            "tool-1.0-1-x86_64.pkg.tar.zst",
            "tool-1.0-1-x86_64.pkg.tar.zst.sig",
            "local.db.tar.gz",
            "notes.txt",
        ] {
            fs::write(dir.path().join(file), "x").unwrap();
        }

        let artifacts = list_artifacts(&RealRuntime, dir.path()).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "tool");
    }

    #[test]
    fn test_prune_removes_expired_with_signatures_and_reindexes() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("tool-1.0-1-x86_64.pkg.tar.zst");
        let new = dir.path().join("tool-1.1-1-x86_64.pkg.tar.zst");
        fs::write(&old, "old").unwrap();
        fs::write(dir.path().join("tool-1.0-1-x86_64.pkg.tar.zst.sig"), "sig").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&new, "new").unwrap();

        let mut index = MockRepoIndex::new();
        let expected = new.clone();
        index
            .expect_regenerate()
            .withf(move |paths| paths == [expected.clone()])
            .times(1)
            .returning(|_| Ok(()));

        let runtime = RealRuntime;
        let action = RetentionAction::new(&runtime, &index, dir.path().to_path_buf());
        let mut gate = ConfirmGate::new(&runtime, true);
        let report = action.prune(1, false, &mut gate).unwrap();

        assert_eq!(report.removed, 1);
        assert!(!old.exists());
        assert!(!dir.path().join("tool-1.0-1-x86_64.pkg.tar.zst.sig").exists());
        assert!(new.exists());
    }

    #[test]
    fn test_signature_failure_still_reindexes() {
        let old = PathBuf::from("/repo/tool-1.0-1-x86_64.pkg.tar.zst");
        let new = PathBuf::from("/repo/tool-1.1-1-x86_64.pkg.tar.zst");
        let removed = Arc::new(AtomicBool::new(false));

        let mut runtime = MockRuntime::new();
        let listing = removed.clone();
        let (listed_old, listed_new) = (old.clone(), new.clone());
        runtime.expect_glob().returning(move |_| {
            if listing.load(Ordering::SeqCst) {
                Ok(vec![listed_new.clone()])
            } else {
                Ok(vec![listed_old.clone(), listed_new.clone()])
            }
        });
        runtime.expect_modified().returning(|p| {
            let age = if p.to_string_lossy().contains("1.0-1") { 10 } else { 0 };
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(100 - age))
        });
        runtime.expect_exists().returning(|_| true);
        let on_remove = removed.clone();
        runtime.expect_remove_file().returning(move |p| {
            if p.extension().is_some_and(|ext| ext == "sig") {
                anyhow::bail!("Permission denied")
            }
            on_remove.store(true, Ordering::SeqCst);
            Ok(())
        });

        let mut index = MockRepoIndex::new();
        let expected = new.clone();
        index
            .expect_regenerate()
            .withf(move |paths| paths == [expected.clone()])
            .times(1)
            .returning(|_| Ok(()));

        let action = RetentionAction::new(&runtime, &index, PathBuf::from("/repo"));
        let mut gate = ConfirmGate::new(&runtime, true);
        let report = action.prune(1, false, &mut gate).unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_prune_dry_run_touches_nothing() {
        let mut runtime = MockRuntime::new();
        runtime.expect_glob().returning(|_| {
            Ok(vec![
                PathBuf::from("/repo/tool-1.0-1-x86_64.pkg.tar.zst"),
                PathBuf::from("/repo/tool-1.1-1-x86_64.pkg.tar.zst"),
            ])
        });
        runtime.expect_modified().returning(|p| {
            let age = if p.to_string_lossy().contains("1.0-1") { 10 } else { 0 };
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(100 - age))
        });
        runtime.expect_is_interactive().returning(|| true);
        runtime.expect_remove_file().never();
        let mut index = MockRepoIndex::new();
        index.expect_regenerate().never();

        let action = RetentionAction::new(&runtime, &index, PathBuf::from("/repo"));
        let mut gate = ConfirmGate::new(&runtime, false);
        let report = action.prune(1, true, &mut gate).unwrap();

        assert_eq!(
            report.expired,
            vec![PathBuf::from("/repo/tool-1.0-1-x86_64.pkg.tar.zst")]
        );
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn test_orphans_removed_only_on_request() {
        let dir = tempdir().unwrap();
        let orphan = dir.path().join("gone-1.0-1-any.pkg.tar.zst");
        let kept = dir.path().join("tool-1.0-1-any.pkg.tar.zst");
        fs::write(&orphan, "x").unwrap();
        fs::write(&kept, "x").unwrap();
        let registry =
            FeedRegistry::from_json(r#"{"packages": [{"name": "tool"}]}"#).unwrap();

        let runtime = RealRuntime;
        let mut index = MockRepoIndex::new();
        index.expect_regenerate().times(1).returning(|_| Ok(()));
        let action = RetentionAction::new(&runtime, &index, dir.path().to_path_buf());
        let mut gate = ConfirmGate::new(&runtime, true);

        let report = action.orphans(&registry, false, false, &mut gate).unwrap();
        assert_eq!(report.orphans, vec!["gone"]);
        assert!(orphan.exists());

        let report = action.orphans(&registry, true, false, &mut gate).unwrap();
        assert_eq!(report.candidates, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!orphan.exists());
        assert!(kept.exists());
    }
}
