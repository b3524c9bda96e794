use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::{PKGBUILD, SRCINFO};

/// Snapshot of a recipe's files that is written back on drop
/// unless the change is committed.
pub struct RecipeBackup<'a, R: Runtime> {
    runtime: &'a R,
    saved: Vec<(PathBuf, Option<String>)>,
    committed: bool,
}

impl<'a, R: Runtime> RecipeBackup<'a, R> {
    /// Save `PKGBUILD` and `.SRCINFO` of `dir`.
    pub fn new(runtime: &'a R, dir: &Path) -> Result<Self> {
        let mut saved = Vec::new();
        for file in [PKGBUILD, SRCINFO] {
            let path = dir.join(file);
            let content = if runtime.exists(&path) {
                Some(runtime.read_to_string(&path)?)
            } else {
                None
            };
            saved.push((path, content));
        }
        Ok(Self {
            runtime,
            saved,
            committed: false,
        })
    }

    /// Keep the modified files.
    pub fn commit(mut self) {
        self.committed = true;
    }

    fn restore(&self) {
        for (path, content) in &self.saved {
            let result = match content {
                Some(text) => self.runtime.write(path, text.as_bytes()),
                None if self.runtime.exists(path) => self.runtime.remove_file(path),
                None => Ok(()),
            };
            match result {
                Ok(()) => debug!("Restored {:?}", path),
                Err(e) => warn!("Failed to restore {:?}: {:#}", path, e),
            }
        }
    }
}

impl<R: Runtime> Drop for RecipeBackup<'_, R> {
    fn drop(&mut self) {
        if !self.committed {
            self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_restores_on_drop() {
        let dir = tempdir().unwrap();
        let pkgbuild = dir.path().join(PKGBUILD);
        fs::write(&pkgbuild, "pkgver=1.0\n").unwrap();

        {
            let _backup = RecipeBackup::new(&RealRuntime, dir.path()).unwrap();
            fs::write(&pkgbuild, "pkgver=2.0\n").unwrap();
            fs::write(dir.path().join(SRCINFO), "generated").unwrap();
        }

        assert_eq!(fs::read_to_string(&pkgbuild).unwrap(), "pkgver=1.0\n");
        assert!(!dir.path().join(SRCINFO).exists());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let dir = tempdir().unwrap();
        let pkgbuild = dir.path().join(PKGBUILD);
        fs::write(&pkgbuild, "pkgver=1.0\n").unwrap();

        let backup = RecipeBackup::new(&RealRuntime, dir.path()).unwrap();
        fs::write(&pkgbuild, "pkgver=2.0\n").unwrap();
        backup.commit();

        assert_eq!(fs::read_to_string(&pkgbuild).unwrap(), "pkgver=2.0\n");
    }
}
