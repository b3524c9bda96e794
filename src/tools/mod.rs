//! External collaborators: the build tool, the package manager and the
//! repository index generator.
//!
//! The engine only talks to these through the traits below. The real
//! implementations shell out via the [`Runtime`](crate::runtime::Runtime).

mod makepkg;
mod pacman;
mod repo_add;

use std::path::{Path, PathBuf};

use crate::runtime::CommandOutput;

pub use makepkg::Makepkg;
pub use pacman::Pacman;
pub use repo_add::RepoAdd;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("cannot run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {status}{detail}")]
    Failed {
        program: String,
        status: String,
        detail: String,
    },

    #[error("unexpected output from {program}: {message}")]
    Output { program: String, message: String },
}

impl ToolError {
    pub(crate) fn spawn(program: &str, err: anyhow::Error) -> Self {
        ToolError::Spawn {
            program: program.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn failed(program: &str, output: &CommandOutput) -> Self {
        let status = match output.code {
            Some(code) => format!("status {}", code),
            None => "a signal".to_string(),
        };
        let stderr = output.stderr.trim();
        ToolError::Failed {
            program: program.to_string(),
            status,
            detail: if stderr.is_empty() {
                String::new()
            } else {
                format!(": {}", stderr)
            },
        }
    }
}

/// Check a finished command and turn a non-zero exit into an error.
pub(crate) fn check(
    program: &str,
    result: anyhow::Result<CommandOutput>,
) -> Result<CommandOutput, ToolError> {
    let output = result.map_err(|e| ToolError::spawn(program, e))?;
    if output.success() {
        Ok(output)
    } else {
        Err(ToolError::failed(program, &output))
    }
}

/// Recipe build tool.
#[cfg_attr(test, mockall::automock)]
pub trait BuildTool: Send + Sync {
    /// Package names a recipe directory produces.
    fn package_names(&self, dir: &Path) -> Result<Vec<String>, ToolError>;

    /// Artifact files a build of the recipe produces (whether built yet or not).
    fn artifact_paths(&self, dir: &Path) -> Result<Vec<PathBuf>, ToolError>;

    /// Build the recipe, replacing existing artifacts.
    fn build(&self, dir: &Path, clean: bool) -> Result<(), ToolError>;

    /// Recompute the source checksums declared in the PKGBUILD.
    fn refresh_checksums(&self, dir: &Path) -> Result<(), ToolError>;

    /// Regenerate `.SRCINFO` from the PKGBUILD.
    fn write_srcinfo(&self, dir: &Path) -> Result<(), ToolError>;
}

/// System package manager.
#[cfg_attr(test, mockall::automock)]
pub trait PackageManager: Send + Sync {
    /// Installed `[epoch:]pkgver-pkgrel` of `name`, `None` when not installed.
    fn installed_version(&self, name: &str) -> Result<Option<String>, ToolError>;

    /// Install artifact files in a single transaction.
    fn install(&self, artifacts: &[PathBuf]) -> Result<(), ToolError>;
}

/// Local repository database.
#[cfg_attr(test, mockall::automock)]
pub trait RepoIndex: Send + Sync {
    /// Rebuild the index so it lists exactly `artifacts`.
    fn regenerate(&self, artifacts: &[PathBuf]) -> Result<(), ToolError>;
}

/// Parts of an artifact file name: `name-pkgver-pkgrel-arch.pkg.tar.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub name: String,
    /// `[epoch:]pkgver-pkgrel`
    pub version: String,
    pub arch: String,
}

impl ArtifactName {
    pub fn parse(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.ends_with(".sig") {
            return None;
        }
        let (stem, _) = file_name.split_once(".pkg.tar")?;

        let mut parts = stem.rsplitn(4, '-');
        let arch = parts.next()?;
        let pkgrel = parts.next()?;
        let pkgver = parts.next()?;
        let name = parts.next()?;
        if name.is_empty() || pkgver.is_empty() || pkgrel.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            version: format!("{}-{}", pkgver, pkgrel),
            arch: arch.to_string(),
        })
    }
}

pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}
