//! Subprocess execution for the external build, install and repository tools.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

use super::RealRuntime;

/// Result of running an external program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convenience constructor for a successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Convenience constructor for a failed run.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_captured_impl(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandOutput> {
        debug!("Running {} {:?} in {}", program, args, cwd.display());
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}. Is it installed?", program))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn run_inherited_impl(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandOutput> {
        debug!("Running {} {:?} in {}", program, args, cwd.display());
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .status()
            .with_context(|| format!("Failed to run {}. Is it installed?", program))?;

        Ok(CommandOutput {
            code: status.code(),
            ..Default::default()
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_run_captured_collects_stdout_and_code() {
        let runtime = RealRuntime;
        let cwd = std::env::temp_dir();

        let output = runtime
            .run_captured("sh", &["-c".into(), "echo hello; exit 3".into()], &cwd)
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_missing_program_is_an_error() {
        let runtime = RealRuntime;
        let cwd = std::env::temp_dir();

        let result = runtime.run_captured("pkgfeed-no-such-program", &[], &cwd);
        assert!(result.is_err());
    }
}
