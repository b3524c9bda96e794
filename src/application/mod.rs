//! Application layer - use cases over the registry, the recipe tree and the
//! local repository.
//!
//! Actions take their collaborators by reference and return reports; the
//! CLI handlers in `commands` decide how to print them.

mod bump;
mod check;
mod reconcile;
mod retention;

pub use bump::{BumpAction, BumpOptions, BumpOutcome, BumpResult};
pub use check::{CheckAction, CheckEntry, CheckOptions, ValidationError};
pub use reconcile::{
    Decision, InstalledPackageState, ReconcileAction, ReconcileEntry, ReconcileOptions,
    ReconcileOutcome, ReconcileReport, decide,
};
pub use retention::{
    OrphanReport, PruneReport, RepoArtifact, RetentionAction, find_orphans, list_artifacts,
    select_expired,
};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::recipe::PKGBUILD;
use crate::runtime::Runtime;

/// Set once the user interrupts the run; checked between packages.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Names of the directories under `root` that contain a PKGBUILD, sorted.
pub fn recipe_dirs<R: Runtime>(runtime: &R, root: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = runtime
        .read_dir(root)?
        .into_iter()
        .filter(|p| runtime.is_dir(p) && runtime.exists(&p.join(PKGBUILD)))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}
