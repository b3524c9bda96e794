use anyhow::Result;

use crate::lock::RunLock;

use super::{RunStatus, config::Config};

/// Remove a stale run lock; refuses while a live run holds it.
#[tracing::instrument(skip(config))]
pub fn unlock(config: &Config) -> Result<RunStatus> {
    if RunLock::remove_stale(&config.lock_file)? {
        println!("Removed stale lock {}", config.lock_file.display());
    } else {
        println!("No lock at {}", config.lock_file.display());
    }
    Ok(RunStatus::Clean)
}
