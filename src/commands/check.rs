use anyhow::{Context, Result};
use log::debug;

use crate::{
    application::{Cancellation, CheckAction, CheckEntry, CheckOptions},
    registry::FeedRegistry,
    runtime::Runtime,
};

use super::{RunStatus, config::Config, services::build_fetcher};

/// How `check` presents its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckOutput {
    #[default]
    Table,
    Json,
    /// Registry names and feed types only; nothing is fetched
    List,
}

#[tracing::instrument(skip(runtime, config, options, cancel))]
pub async fn check<R: Runtime>(
    runtime: R,
    config: Config,
    options: CheckOptions,
    output: CheckOutput,
    cancel: &Cancellation,
) -> Result<RunStatus> {
    let registry = FeedRegistry::load(&runtime, &config.registry)?;
    debug!("Loaded {} feed(s) from {:?}", registry.len(), config.registry);

    if output == CheckOutput::List {
        for descriptor in registry.descriptors() {
            println!("{}\t{}", descriptor.name, descriptor.kind());
        }
        return Ok(RunStatus::Clean);
    }

    let fetcher = build_fetcher(&config)?;
    let action = CheckAction::new(
        &runtime,
        &registry,
        &fetcher,
        config.comparator(),
        config.root.clone(),
    );
    let entries = action.run(&options, cancel).await?;

    match output {
        CheckOutput::Json => {
            let json = serde_json::to_string_pretty(&entries)
                .context("Failed to serialize check report")?;
            println!("{}", json);
        }
        _ => {
            for line in render_table(&entries) {
                println!("{}", line);
            }
        }
    }

    Ok(report_failures(&entries))
}

/// Print one warning per failed lookup and the failed-items list.
pub(crate) fn report_failures(entries: &[CheckEntry]) -> RunStatus {
    let failed: Vec<&CheckEntry> = entries.iter().filter(|e| e.failed()).collect();
    if failed.is_empty() {
        return RunStatus::Clean;
    }

    for entry in &failed {
        if let Some(error) = &entry.error {
            eprintln!("Warning: {}: {}", entry.name, error);
        }
    }
    eprintln!(
        "Failed: {}",
        failed.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    RunStatus::Failures
}

/// Aligned report rows, header first.
pub(crate) fn render_table(entries: &[CheckEntry]) -> Vec<String> {
    let header = ["PACKAGE", "STATUS", "CURRENT", "UPSTREAM", "FEED"];
    let rows: Vec<[String; 5]> = entries
        .iter()
        .map(|e| {
            [
                e.name.clone(),
                e.status.to_string(),
                dash_if_empty(&e.current),
                dash_if_empty(&e.upstream),
                e.feed.clone(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    std::iter::once(header.map(str::to_string))
        .chain(rows)
        .map(|row| {
            row.iter()
                .zip(widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect()
}

fn dash_if_empty(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}
