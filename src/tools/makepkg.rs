use log::debug;
use std::path::{Path, PathBuf};

use crate::recipe::{Recipe, SRCINFO};
use crate::runtime::Runtime;

use super::{BuildTool, ToolError, args, check};

const MAKEPKG: &str = "makepkg";
const UPDPKGSUMS: &str = "updpkgsums";

/// `makepkg`-backed build tool.
pub struct Makepkg<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> Makepkg<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    fn printsrcinfo(&self, dir: &Path) -> Result<String, ToolError> {
        let output = check(
            MAKEPKG,
            self.runtime
                .run_captured(MAKEPKG, &args(["--printsrcinfo"]), dir),
        )?;
        Ok(output.stdout)
    }
}

impl<R: Runtime> BuildTool for Makepkg<'_, R> {
    fn package_names(&self, dir: &Path) -> Result<Vec<String>, ToolError> {
        let srcinfo = self.printsrcinfo(dir)?;
        Recipe::parse_srcinfo(&srcinfo)
            .map(|r| r.names)
            .map_err(|e| ToolError::Output {
                program: MAKEPKG.to_string(),
                message: format!("{:#}", e),
            })
    }

    fn artifact_paths(&self, dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
        let output = check(
            MAKEPKG,
            self.runtime
                .run_captured(MAKEPKG, &args(["--packagelist"]), dir),
        )?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    #[tracing::instrument(skip(self))]
    fn build(&self, dir: &Path, clean: bool) -> Result<(), ToolError> {
        let mut build_args = args(["--syncdeps", "--noconfirm", "--force"]);
        if clean {
            build_args.push("--cleanbuild".to_string());
        }
        debug!("Building {:?}", dir);
        check(MAKEPKG, self.runtime.run_inherited(MAKEPKG, &build_args, dir))?;
        Ok(())
    }

    fn refresh_checksums(&self, dir: &Path) -> Result<(), ToolError> {
        check(UPDPKGSUMS, self.runtime.run_inherited(UPDPKGSUMS, &[], dir))?;
        Ok(())
    }

    fn write_srcinfo(&self, dir: &Path) -> Result<(), ToolError> {
        let srcinfo = self.printsrcinfo(dir)?;
        let path = dir.join(SRCINFO);
        self.runtime
            .write(&path, srcinfo.as_bytes())
            .map_err(|e| ToolError::Output {
                program: MAKEPKG.to_string(),
                message: format!("cannot write {:?}: {:#}", path, e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::eq;

    const PRINTED: &str = "pkgbase = tool\n\tpkgver = 1.0\n\tpkgrel = 1\n\npkgname = tool\n\npkgname = tool-docs\n";

    #[test]
    fn test_package_names_from_printsrcinfo() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_captured()
            .withf(|program, args, dir| {
                program == "makepkg" && args == ["--printsrcinfo"] && dir == Path::new("/pkgs/tool")
            })
            .returning(|_, _, _| Ok(CommandOutput::ok(PRINTED)));

        let names = Makepkg::new(&runtime)
            .package_names(Path::new("/pkgs/tool"))
            .unwrap();
        assert_eq!(names, vec!["tool", "tool-docs"]);
    }

    #[test]
    fn test_artifact_paths() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_captured()
            .withf(|_, args, _| args == ["--packagelist"])
            .returning(|_, _, _| {
                Ok(CommandOutput::ok(
                    "/pkgs/tool/tool-1.0-1-x86_64.pkg.tar.zst\n/pkgs/tool/tool-docs-1.0-1-any.pkg.tar.zst\n",
                ))
            });

        let paths = Makepkg::new(&runtime)
            .artifact_paths(Path::new("/pkgs/tool"))
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[1],
            PathBuf::from("/pkgs/tool/tool-docs-1.0-1-any.pkg.tar.zst")
        );
    }

    #[test]
    fn test_build_arguments() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_inherited()
            .withf(|program, args, _| {
                program == "makepkg"
                    && args == ["--syncdeps", "--noconfirm", "--force", "--cleanbuild"]
            })
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::ok("")));

        Makepkg::new(&runtime)
            .build(Path::new("/pkgs/tool"), true)
            .unwrap();
    }

    #[test]
    fn test_build_failure() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_inherited()
            .returning(|_, _, _| Ok(CommandOutput::failed(1, "")));

        let err = Makepkg::new(&runtime)
            .build(Path::new("/pkgs/tool"), false)
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }

    #[test]
    fn test_write_srcinfo() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_captured()
            .returning(|_, _, _| Ok(CommandOutput::ok(PRINTED)));
        runtime
            .expect_write()
            .with(eq(PathBuf::from("/pkgs/tool/.SRCINFO")), eq(PRINTED.as_bytes()))
            .times(1)
            .returning(|_, _| Ok(()));

        Makepkg::new(&runtime)
            .write_srcinfo(Path::new("/pkgs/tool"))
            .unwrap();
    }

    #[test]
    fn test_refresh_checksums_runs_updpkgsums() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run_inherited()
            .withf(|program, args, _| program == "updpkgsums" && args.is_empty())
            .times(1)
            .returning(|_, _, _| Ok(CommandOutput::ok("")));

        Makepkg::new(&runtime)
            .refresh_checksums(Path::new("/pkgs/tool"))
            .unwrap();
    }
}
