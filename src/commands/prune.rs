use anyhow::Result;
use log::debug;

use crate::{
    application::RetentionAction,
    lock::RunLock,
    prompt::ConfirmGate,
    registry::FeedRegistry,
    runtime::Runtime,
    tools::RepoAdd,
};

use super::{RunStatus, config::Config};

/// Keep the `keep` newest artifacts of every package in the repository.
#[tracing::instrument(skip(runtime, config))]
pub fn prune<R: Runtime>(
    runtime: R,
    config: Config,
    keep: usize,
    dry_run: bool,
    assume_yes: bool,
) -> Result<RunStatus> {
    let _lock = if dry_run {
        None
    } else {
        Some(RunLock::acquire(&config.lock_file)?)
    };

    let index = RepoAdd::new(&runtime, config.repo_db.clone());
    let action = RetentionAction::new(&runtime, &index, config.repo_dir.clone());
    let mut gate = ConfirmGate::new(&runtime, assume_yes);
    let report = action.prune(keep, dry_run, &mut gate)?;

    if report.expired.is_empty() {
        println!("Nothing to prune.");
        return Ok(RunStatus::Clean);
    }
    for path in &report.expired {
        println!("{}", path.display());
    }
    if dry_run {
        println!("Would remove {} artifact(s)", report.expired.len());
    } else if report.declined {
        println!("Left {} artifact(s) in place", report.expired.len());
    } else {
        println!("Removed {} of {} artifact(s)", report.removed, report.expired.len());
    }

    Ok(status(report.failed, dry_run || report.declined))
}

/// Report, and with `remove` delete, repository packages missing from the registry.
#[tracing::instrument(skip(runtime, config))]
pub fn orphans<R: Runtime>(
    runtime: R,
    config: Config,
    remove: bool,
    dry_run: bool,
    assume_yes: bool,
) -> Result<RunStatus> {
    let _lock = if remove && !dry_run {
        Some(RunLock::acquire(&config.lock_file)?)
    } else {
        None
    };

    let registry = FeedRegistry::load(&runtime, &config.registry)?;
    debug!("Comparing {:?} against {} feed(s)", config.repo_dir, registry.len());

    let index = RepoAdd::new(&runtime, config.repo_db.clone());
    let action = RetentionAction::new(&runtime, &index, config.repo_dir.clone());
    let mut gate = ConfirmGate::new(&runtime, assume_yes);
    let report = action.orphans(&registry, remove, dry_run, &mut gate)?;

    if report.orphans.is_empty() {
        println!("No orphaned packages.");
        return Ok(RunStatus::Clean);
    }
    for name in &report.orphans {
        println!("{}", name);
    }
    if !remove || dry_run || report.declined {
        return Ok(RunStatus::Clean);
    }

    println!("Removed {} of {} artifact(s)", report.removed, report.candidates);
    Ok(status(report.failed, false))
}

/// Removals that did not happen count as failures unless nothing was attempted.
fn status(failed: usize, skipped: bool) -> RunStatus {
    if skipped || failed == 0 {
        RunStatus::Clean
    } else {
        RunStatus::Failures
    }
}
