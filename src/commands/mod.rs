//! CLI command handlers.
//!
//! Each handler builds its collaborators from a resolved [`Config`], runs
//! the matching application action and prints the result. Handlers return
//! a [`RunStatus`]; fatal problems are errors.

mod bump;
mod check;
pub mod config;
mod prune;
mod reconcile;
pub mod services;
mod unlock;

pub use bump::bump;
pub use check::{CheckOutput, check};
pub use config::{Config, ConfigOverrides};
pub use prune::{orphans, prune};
pub use reconcile::reconcile;
pub use unlock::unlock;

/// Whether every item a command touched finished without failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    /// At least one package or artifact failed; the rest were processed
    Failures,
}
