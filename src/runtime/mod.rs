//! Runtime abstraction for system operations.
//!
//! Everything that touches the machine (files, environment, subprocesses,
//! the terminal) goes through the [`Runtime`] trait so the engine can be
//! exercised against a `MockRuntime` in tests.
//!
//! # Structure
//!
//! - `env` - Environment variables and system information
//! - `fs` - File system operations (read, write, list, metadata)
//! - `process` - Running external tools (makepkg, pacman, repo-add)
//! - `user` - User interaction (line prompts)

mod env;
mod fs;
mod process;
mod user;

use anyhow::Result;
use async_trait::async_trait;
use std::env as std_env;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use process::CommandOutput;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Expand a glob pattern into the matching paths, sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Last modification time of a file.
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    // Directories
    fn cache_dir(&self) -> Option<PathBuf>;

    // Privilege
    fn is_privileged(&self) -> bool;

    // Processes
    /// Run a program to completion, capturing stdout and stderr.
    fn run_captured(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput>;

    /// Run a program with the terminal attached (build output stays visible).
    /// The returned output carries only the exit status.
    fn run_inherited(&self, program: &str, args: &[String], cwd: &Path)
    -> Result<CommandOutput>;

    // User interaction
    /// Whether stdin is attached to a terminal.
    fn is_interactive(&self) -> bool;

    /// Print `message` and read one line of input.
    /// Returns `None` at end of input.
    fn prompt(&self, message: &str) -> Result<Option<String>>;
}

pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.glob_impl(pattern)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        self.modified_impl(path)
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir_impl()
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn run_captured(&self, program: &str, args: &[String], cwd: &Path) -> Result<CommandOutput> {
        self.run_captured_impl(program, args, cwd)
    }

    fn run_inherited(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandOutput> {
        self.run_inherited_impl(program, args, cwd)
    }

    fn is_interactive(&self) -> bool {
        self.is_interactive_impl()
    }

    fn prompt(&self, message: &str) -> Result<Option<String>> {
        self.prompt_impl(message)
    }
}
