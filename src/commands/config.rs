use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::DEFAULT_TIMEOUT;
use crate::http::DEFAULT_ATTEMPTS;
use crate::lock::LOCK_FILE_NAME;
use crate::provider::DEFAULT_API_URL;
use crate::runtime::Runtime;
use crate::version::{CompareMode, Comparator};

/// Registry file looked up in the root when `--registry` is not given.
pub const DEFAULT_REGISTRY_FILE: &str = "feeds.json";

/// Repository directory under the root when `--repo-dir` is not given.
pub const DEFAULT_REPO_DIR: &str = "repo";

/// Values taken from the command line (or their environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub registry: Option<PathBuf>,
    pub repo_dir: Option<PathBuf>,
    pub repo_db: Option<PathBuf>,
    pub api_url: Option<String>,
    pub timeout: Option<u64>,
    pub attempts: Option<usize>,
    pub lock_file: Option<PathBuf>,
    pub lexical_compare: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub registry: PathBuf,
    pub repo_dir: PathBuf,
    pub repo_db: PathBuf,
    pub api_url: String,
    pub timeout: Duration,
    /// Tries per upstream request; the lookup timeout bounds all of them.
    pub attempts: usize,
    pub lock_file: PathBuf,
    pub compare_mode: CompareMode,
    pub token: Option<String>,
}

impl Config {
    pub fn load<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let cwd = runtime.current_dir()?;
        let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };

        let root = absolute(overrides.root.unwrap_or_else(|| cwd.clone()));
        let registry = overrides
            .registry
            .map(absolute)
            .unwrap_or_else(|| root.join(DEFAULT_REGISTRY_FILE));
        let repo_dir = overrides
            .repo_dir
            .map(absolute)
            .unwrap_or_else(|| root.join(DEFAULT_REPO_DIR));
        let repo_db = match overrides.repo_db {
            Some(db) => absolute(db),
            None => default_repo_db(&repo_dir)?,
        };
        let lock_file = match overrides.lock_file {
            Some(path) => absolute(path),
            None => default_lock_file(runtime, &root),
        };

        let compare_mode = if overrides.lexical_compare
            || runtime
                .env_var("PKGFEED_COMPARE")
                .is_ok_and(|v| v.eq_ignore_ascii_case("lexical"))
        {
            CompareMode::Lexical
        } else {
            CompareMode::Package
        };

        let token = runtime
            .env_var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let config = Self {
            root,
            registry,
            repo_dir,
            repo_db,
            api_url: overrides
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: overrides
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            attempts: overrides.attempts.unwrap_or(DEFAULT_ATTEMPTS).max(1),
            lock_file,
            compare_mode,
            token,
        };
        debug!(
            "Resolved configuration: root={:?} registry={:?} repo_db={:?}",
            config.root, config.registry, config.repo_db
        );
        Ok(config)
    }

    pub fn comparator(&self) -> Comparator {
        Comparator::new(self.compare_mode)
    }
}

/// `<repo-dir>/<basename>.db.tar.gz`
fn default_repo_db(repo_dir: &Path) -> Result<PathBuf> {
    let name = repo_dir
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| {
            format!("Cannot derive a database name from {:?}; pass --repo-db", repo_dir)
        })?;
    Ok(repo_dir.join(format!("{}.db.tar.gz", name)))
}

fn default_lock_file<R: Runtime>(runtime: &R, root: &Path) -> PathBuf {
    match runtime.cache_dir() {
        Some(cache) => cache.join("pkgfeed").join(LOCK_FILE_NAME),
        None => {
            debug!("No cache directory; keeping the lock file in {:?}", root);
            root.join(format!(".{}", LOCK_FILE_NAME))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn runtime(token: Option<&'static str>, compare: Option<&'static str>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_current_dir()
            .returning(|| Ok(PathBuf::from("/work")));
        runtime
            .expect_cache_dir()
            .returning(|| Some(PathBuf::from("/home/user/.cache")));
        runtime
            .expect_env_var()
            .with(eq("GITHUB_TOKEN"))
            .returning(move |_| token.map(str::to_string).ok_or(std::env::VarError::NotPresent));
        runtime
            .expect_env_var()
            .with(eq("PKGFEED_COMPARE"))
            .returning(move |_| compare.map(str::to_string).ok_or(std::env::VarError::NotPresent));
        runtime
    }

    #[test]
    fn test_defaults_derive_from_the_working_directory() {
        let config = Config::load(&runtime(None, None), ConfigOverrides::default()).unwrap();

        assert_eq!(config.root, PathBuf::from("/work"));
        assert_eq!(config.registry, PathBuf::from("/work/feeds.json"));
        assert_eq!(config.repo_dir, PathBuf::from("/work/repo"));
        assert_eq!(config.repo_db, PathBuf::from("/work/repo/repo.db.tar.gz"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.attempts, 1);
        assert_eq!(
            config.lock_file,
            PathBuf::from("/home/user/.cache/pkgfeed/pkgfeed.lock")
        );
        assert_eq!(config.compare_mode, CompareMode::Package);
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_overrides_win_and_relative_paths_resolve() {
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("pkgs")),
            repo_dir: Some(PathBuf::from("/srv/custom")),
            timeout: Some(5),
            attempts: Some(3),
            api_url: Some("http://localhost:1234".to_string()),
            ..Default::default()
        };
        let config = Config::load(&runtime(Some("secret"), None), overrides).unwrap();

        assert_eq!(config.root, PathBuf::from("/work/pkgs"));
        assert_eq!(config.registry, PathBuf::from("/work/pkgs/feeds.json"));
        assert_eq!(config.repo_db, PathBuf::from("/srv/custom/custom.db.tar.gz"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.attempts, 3);
        assert_eq!(config.api_url, "http://localhost:1234");
        assert_eq!(config.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_lexical_compare_from_flag_or_env() {
        let config =
            Config::load(&runtime(None, Some("LEXICAL")), ConfigOverrides::default()).unwrap();
        assert_eq!(config.compare_mode, CompareMode::Lexical);

        let overrides = ConfigOverrides {
            lexical_compare: true,
            ..Default::default()
        };
        let config = Config::load(&runtime(None, None), overrides).unwrap();
        assert_eq!(config.compare_mode, CompareMode::Lexical);
    }
}
