use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::{RepoIndex, ToolError, check};

const REPO_ADD: &str = "repo-add";

/// `repo-add`-backed repository index.
pub struct RepoAdd<'a, R: Runtime> {
    runtime: &'a R,
    db: PathBuf,
}

impl<'a, R: Runtime> RepoAdd<'a, R> {
    pub fn new(runtime: &'a R, db: PathBuf) -> Self {
        Self { runtime, db }
    }

    /// The `.files` database kept next to the package database.
    fn files_db(&self) -> Option<PathBuf> {
        let name = self.db.file_name()?.to_str()?;
        let files = name.replacen(".db", ".files", 1);
        (files != name).then(|| self.db.with_file_name(files))
    }

    fn dir(&self) -> &Path {
        self.db.parent().unwrap_or(Path::new("."))
    }
}

impl<R: Runtime> RepoIndex for RepoAdd<'_, R> {
    #[tracing::instrument(skip(self, artifacts))]
    fn regenerate(&self, artifacts: &[PathBuf]) -> Result<(), ToolError> {
        // Start from scratch so removed artifacts disappear from the index
        for db in std::iter::once(self.db.clone()).chain(self.files_db()) {
            if self.runtime.exists(&db) {
                debug!("Removing old index {:?}", db);
                self.runtime
                    .remove_file(&db)
                    .map_err(|e| ToolError::spawn(REPO_ADD, e))?;
            }
        }

        if artifacts.is_empty() {
            warn!("No artifacts left; repository index {:?} not recreated", self.db);
            return Ok(());
        }

        let mut repo_args = vec![self.db.display().to_string()];
        repo_args.extend(artifacts.iter().map(|p| p.display().to_string()));

        info!("Regenerating {:?} from {} artifact(s)", self.db, artifacts.len());
        check(
            REPO_ADD,
            self.runtime.run_captured(REPO_ADD, &repo_args, self.dir()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::eq;

    #[test]
    fn test_regenerate_rebuilds_from_artifacts() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/repo/local.db.tar.gz")))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/repo/local.files.tar.gz")))
            .returning(|_| false);
        runtime
            .expect_remove_file()
            .with(eq(PathBuf::from("/repo/local.db.tar.gz")))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_run_captured()
            .withf(|program, args, dir| {
                program == "repo-add"
                    && args == ["/repo/local.db.tar.gz", "/repo/a-1-1-any.pkg.tar.zst"]
                    && dir == Path::new("/repo")
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::ok("")));

        let index = RepoAdd::new(&runtime, PathBuf::from("/repo/local.db.tar.gz"));
        index
            .regenerate(&[PathBuf::from("/repo/a-1-1-any.pkg.tar.zst")])
            .unwrap();
    }

    #[test]
    fn test_regenerate_with_nothing_left_only_clears() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime.expect_run_captured().never();

        let index = RepoAdd::new(&runtime, PathBuf::from("/repo/local.db.tar.gz"));
        index.regenerate(&[]).unwrap();
    }
}
