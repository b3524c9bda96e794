use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::{PackageManager, ToolError, args, check};

const PACMAN: &str = "pacman";
const SUDO: &str = "sudo";

/// `pacman`-backed package manager.
pub struct Pacman<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> Pacman<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime> PackageManager for Pacman<'_, R> {
    fn installed_version(&self, name: &str) -> Result<Option<String>, ToolError> {
        let output = self
            .runtime
            .run_captured(PACMAN, &args(["-Q", name]), Path::new("/"))
            .map_err(|e| ToolError::spawn(PACMAN, e))?;

        // `pacman -Q` exits non-zero for packages that are not installed
        if !output.success() {
            debug!("{} is not installed", name);
            return Ok(None);
        }

        let mut fields = output.stdout.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(_), Some(version)) => Ok(Some(version.to_string())),
            _ => Err(ToolError::Output {
                program: PACMAN.to_string(),
                message: format!("cannot read version from '{}'", output.stdout.trim()),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    fn install(&self, artifacts: &[PathBuf]) -> Result<(), ToolError> {
        let mut pacman_args = args(["-U", "--noconfirm"]);
        pacman_args.extend(artifacts.iter().map(|p| p.display().to_string()));

        let (program, program_args) = if self.runtime.is_privileged() {
            (PACMAN, pacman_args)
        } else {
            let mut sudo_args = vec![PACMAN.to_string()];
            sudo_args.extend(pacman_args);
            (SUDO, sudo_args)
        };

        info!("Installing {} package(s)", artifacts.len());
        check(
            program,
            self.runtime
                .run_inherited(program, &program_args, Path::new("/")),
        )?;
        Ok(())
    }
}
