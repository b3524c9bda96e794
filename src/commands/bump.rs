use anyhow::Result;
use log::info;

use crate::{
    application::{
        BumpAction, BumpOptions, BumpOutcome, BumpResult, Cancellation, CheckAction, CheckOptions,
    },
    lock::RunLock,
    prompt::ConfirmGate,
    registry::FeedRegistry,
    runtime::Runtime,
    tools::{Makepkg, Pacman},
};

use super::{RunStatus, check::report_failures, config::Config, services::build_fetcher};

/// Check, then bump every outdated recipe.
#[tracing::instrument(skip(runtime, config, check_options, options, cancel))]
pub async fn bump<R: Runtime>(
    runtime: R,
    config: Config,
    check_options: CheckOptions,
    options: BumpOptions,
    assume_yes: bool,
    cancel: &Cancellation,
) -> Result<RunStatus> {
    let _lock = if options.dry_run {
        None
    } else {
        Some(RunLock::acquire(&config.lock_file)?)
    };

    let registry = FeedRegistry::load(&runtime, &config.registry)?;
    let fetcher = build_fetcher(&config)?;
    let entries = CheckAction::new(
        &runtime,
        &registry,
        &fetcher,
        config.comparator(),
        config.root.clone(),
    )
    .run(&check_options, cancel)
    .await?;
    let check_status = report_failures(&entries);

    let build = Makepkg::new(&runtime);
    let packages = Pacman::new(&runtime);
    let action = BumpAction::new(&runtime, &build, &packages, config.root.clone());
    let mut gate = ConfirmGate::new(&runtime, assume_yes);
    let results = action.run(&entries, &options, &mut gate, cancel);

    if results.is_empty() {
        println!("Nothing to bump.");
    }
    for result in &results {
        println!("{}", describe(result));
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| r.failed())
        .map(|r| r.name.as_str())
        .collect();
    info!("{} bump(s), {} failed", results.len(), failed.len());
    if !failed.is_empty() {
        eprintln!("Failed: {}", failed.join(", "));
        return Ok(RunStatus::Failures);
    }
    Ok(check_status)
}

fn describe(result: &BumpResult) -> String {
    let state = match &result.outcome {
        BumpOutcome::Planned => "planned".to_string(),
        BumpOutcome::Bumped => "bumped".to_string(),
        BumpOutcome::Declined => "declined".to_string(),
        BumpOutcome::Skipped => "skipped".to_string(),
        BumpOutcome::Failed(reason) => format!("failed: {}", reason),
    };
    format!("{} {} -> {}: {}", result.name, result.from, result.to, state)
}
