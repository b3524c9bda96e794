//! Local recipe directories (PKGBUILD + .SRCINFO).

mod backup;

use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::runtime::Runtime;
use crate::version::{CanonicalVersion, is_vcs_name};

pub use backup::RecipeBackup;

pub const PKGBUILD: &str = "PKGBUILD";
pub const SRCINFO: &str = ".SRCINFO";

/// Version and names declared by one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recipe {
    pub pkgbase: Option<String>,
    pub names: Vec<String>,
    pub epoch: u64,
    pub pkgver: String,
    pub pkgrel: String,
}

impl Recipe {
    /// Read a recipe directory, preferring `.SRCINFO` over the PKGBUILD.
    #[tracing::instrument(skip(runtime))]
    pub fn read<R: Runtime>(runtime: &R, dir: &Path) -> Result<Self> {
        let srcinfo = dir.join(SRCINFO);
        if runtime.exists(&srcinfo) {
            let content = runtime.read_to_string(&srcinfo)?;
            return Self::parse_srcinfo(&content)
                .with_context(|| format!("Invalid {:?}", srcinfo));
        }

        let pkgbuild = dir.join(PKGBUILD);
        let content = runtime.read_to_string(&pkgbuild)?;
        Self::parse_pkgbuild(&content).with_context(|| format!("Invalid {:?}", pkgbuild))
    }

    /// Parse `makepkg --printsrcinfo` output.
    pub fn parse_srcinfo(content: &str) -> Result<Self> {
        let mut recipe = Recipe::default();

        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once(" = ") else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "pkgbase" => recipe.pkgbase = Some(value),
                "pkgname" => recipe.names.push(value),
                "pkgver" => recipe.pkgver = value,
                "pkgrel" => recipe.pkgrel = value,
                "epoch" => recipe.epoch = parse_epoch(&value)?,
                _ => {}
            }
        }

        recipe.validate()
    }

    /// Read top-level assignments from a PKGBUILD without evaluating it.
    pub fn parse_pkgbuild(content: &str) -> Result<Self> {
        let mut recipe = Recipe::default();
        let mut lines = content.lines();

        while let Some(line) = lines.next() {
            // Only unindented assignments are top-level
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "pkgbase" => recipe.pkgbase = Some(unquote(value)),
                "pkgname" => {
                    let mut value = value.to_string();
                    if value.starts_with('(') {
                        while !value.contains(')') {
                            match lines.next() {
                                Some(more) => {
                                    value.push(' ');
                                    value.push_str(more);
                                }
                                None => break,
                            }
                        }
                        recipe.names = value
                            .trim_start_matches('(')
                            .split(')')
                            .next()
                            .unwrap_or_default()
                            .split_whitespace()
                            .map(unquote)
                            .collect();
                    } else {
                        recipe.names = vec![unquote(value.as_str())];
                    }
                }
                "pkgver" => recipe.pkgver = unquote(value),
                "pkgrel" => recipe.pkgrel = unquote(value),
                "epoch" => recipe.epoch = parse_epoch(&unquote(value))?,
                _ => {}
            }
        }

        recipe.validate()
    }

    fn validate(mut self) -> Result<Self> {
        if self.names.is_empty() {
            match &self.pkgbase {
                Some(base) => self.names.push(base.clone()),
                None => bail!("no pkgname declared"),
            }
        }
        if self.pkgver.is_empty() {
            bail!("no pkgver declared");
        }
        Ok(self)
    }

    /// The full `[epoch:]pkgver-pkgrel` version of the recipe.
    pub fn version(&self) -> CanonicalVersion {
        let pkgrel = (!self.pkgrel.is_empty()).then(|| self.pkgrel.clone());
        CanonicalVersion::new(self.epoch, self.pkgver.clone(), pkgrel)
    }

    /// Whether the recipe builds from a VCS checkout.
    pub fn is_vcs(&self) -> bool {
        self.names.iter().any(|n| is_vcs_name(n))
            || self.pkgbase.as_deref().is_some_and(is_vcs_name)
    }
}

fn parse_epoch(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("epoch '{}' is not a number", value))
}

fn unquote(value: &str) -> String {
    let value = value.split(" #").next().unwrap_or(value).trim();
    value
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

/// Set `pkgver` and reset `pkgrel=1` in PKGBUILD text.
pub fn set_version(pkgbuild: &str, pkgver: &str) -> Result<String> {
    let mut found = false;
    let mut out: Vec<String> = pkgbuild
        .lines()
        .map(|line| {
            if line.starts_with("pkgver=") {
                found = true;
                format!("pkgver={}", pkgver)
            } else if line.starts_with("pkgrel=") {
                "pkgrel=1".to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !found {
        bail!("PKGBUILD has no top-level pkgver assignment");
    }
    if pkgbuild.ends_with('\n') {
        out.push(String::new());
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use std::path::PathBuf;

    const SRCINFO_TEXT: &str = "pkgbase = python-foo\n\
\tpkgdesc = Foo\n\
\tpkgver = 2.4.1\n\
\tpkgrel = 3\n\
\tepoch = 1\n\
\n\
pkgname = python-foo\n\
\n\
pkgname = python-foo-docs\n";

    const PKGBUILD_TEXT: &str = r#"# Maintainer: someone
pkgname=('tool' "tool-docs")
pkgver=1.2.0 # bumped by hand
pkgrel=2
arch=('x86_64')

package_tool() {
  pkgver=9.9
}
"#;

    #[test]
    fn test_parse_srcinfo() {
        let recipe = Recipe::parse_srcinfo(SRCINFO_TEXT).unwrap();
        assert_eq!(recipe.pkgbase.as_deref(), Some("python-foo"));
        assert_eq!(recipe.names, vec!["python-foo", "python-foo-docs"]);
        assert_eq!(recipe.version().to_string(), "1:2.4.1-3");
        assert!(!recipe.is_vcs());
    }

    #[test]
    fn test_parse_pkgbuild_top_level_only() {
        let recipe = Recipe::parse_pkgbuild(PKGBUILD_TEXT).unwrap();
        assert_eq!(recipe.names, vec!["tool", "tool-docs"]);
        assert_eq!(recipe.pkgver, "1.2.0");
        assert_eq!(recipe.pkgrel, "2");
        assert_eq!(recipe.epoch, 0);
        assert_eq!(recipe.version().to_string(), "1.2.0-2");
    }

    #[test]
    fn test_parse_pkgbuild_multiline_names() {
        let text = "pkgname=(\n  foo-git\n  foo-git-extras\n)\npkgver=r120.abc\npkgrel=1\n";
        let recipe = Recipe::parse_pkgbuild(text).unwrap();
        assert_eq!(recipe.names, vec!["foo-git", "foo-git-extras"]);
        assert!(recipe.is_vcs());
    }

    #[test]
    fn test_missing_fields() {
        assert!(Recipe::parse_pkgbuild("pkgver=1.0\n").is_err());
        assert!(Recipe::parse_pkgbuild("pkgname=foo\n").is_err());
        assert!(Recipe::parse_pkgbuild("pkgname=foo\npkgver=1\nepoch=x\n").is_err());
    }

    #[test]
    fn test_read_prefers_srcinfo() {
        let mut runtime = MockRuntime::new();
        let dir = PathBuf::from("/pkgs/python-foo");

        runtime
            .expect_exists()
            .withf(|p| p.ends_with(".SRCINFO"))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .withf(|p| p.ends_with(".SRCINFO"))
            .returning(|_| Ok(SRCINFO_TEXT.to_string()));

        let recipe = Recipe::read(&runtime, &dir).unwrap();
        assert_eq!(recipe.pkgver, "2.4.1");
    }

    #[test]
    fn test_read_falls_back_to_pkgbuild() {
        let mut runtime = MockRuntime::new();
        let dir = PathBuf::from("/pkgs/tool");

        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_read_to_string()
            .withf(|p| p.ends_with("PKGBUILD"))
            .returning(|_| Ok(PKGBUILD_TEXT.to_string()));

        let recipe = Recipe::read(&runtime, &dir).unwrap();
        assert_eq!(recipe.names[0], "tool");
    }

    #[test]
    fn test_set_version() {
        let updated = set_version(PKGBUILD_TEXT, "1.3.0").unwrap();
        assert!(updated.contains("\npkgver=1.3.0\n"));
        assert!(updated.contains("\npkgrel=1\n"));
        // Function-local assignments are untouched
        assert!(updated.contains("  pkgver=9.9"));
        assert!(updated.ends_with("}\n"));

        assert!(set_version("pkgname=foo\n", "1.0").is_err());
    }
}
