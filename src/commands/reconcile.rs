use anyhow::Result;

use crate::{
    application::{
        Cancellation, ReconcileAction, ReconcileOptions, ReconcileOutcome, ReconcileReport,
    },
    lock::RunLock,
    prompt::ConfirmGate,
    runtime::Runtime,
    tools::{Makepkg, Pacman},
};

use super::{RunStatus, config::Config};

/// Bring installed packages in line with their recipes.
#[tracing::instrument(skip(runtime, config, options, cancel))]
pub fn reconcile<R: Runtime>(
    runtime: R,
    config: Config,
    options: ReconcileOptions,
    assume_yes: bool,
    cancel: &Cancellation,
) -> Result<RunStatus> {
    let _lock = if options.dry_run {
        None
    } else {
        Some(RunLock::acquire(&config.lock_file)?)
    };

    let build = Makepkg::new(&runtime);
    let packages = Pacman::new(&runtime);
    let action = ReconcileAction::new(
        &runtime,
        &build,
        &packages,
        config.comparator(),
        config.root.clone(),
    );
    let mut gate = ConfirmGate::new(&runtime, assume_yes);
    let report = action.run(&options, &mut gate, cancel)?;

    print_report(&report, options.dry_run);
    Ok(summarize(&report))
}

fn print_report(report: &ReconcileReport, dry_run: bool) {
    for entry in &report.entries {
        let decision = entry
            .decision
            .as_ref()
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let outcome = match &entry.outcome {
            ReconcileOutcome::Unchanged if dry_run => "planned",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Declined => "declined",
            ReconcileOutcome::Failed(_) => "failed",
        };
        println!("{}: {} ({})", entry.dir, decision, outcome);
    }
}

fn summarize(report: &ReconcileReport) -> RunStatus {
    let failed = report.failed();
    println!(
        "Checked {}, updated {}, failed {}",
        report.checked(),
        report.updated(),
        failed.len()
    );
    if failed.is_empty() {
        return RunStatus::Clean;
    }
    for (dir, reason) in &failed {
        eprintln!("Failed: {}: {}", dir, reason);
    }
    RunStatus::Failures
}
