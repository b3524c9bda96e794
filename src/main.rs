use anyhow::Result;
use clap::Parser;
use log::warn;
use pkgfeed::application::{BumpOptions, Cancellation, CheckOptions, ReconcileOptions};
use pkgfeed::commands::{self, CheckOutput, Config, ConfigOverrides, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;

/// pkgfeed - upstream version tracking for a tree of package recipes
///
/// Resolves the latest upstream version of every package declared in the
/// feed registry, compares it with the local recipe and keeps the recipes,
/// the installed packages and the local repository in step.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// This is useful for avoiding rate limits.
///
/// Examples:
///   pkgfeed check                 # Report every package's status
///   pkgfeed bump ripgrep --install
///   pkgfeed reconcile --dry-run
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGFEED_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Recipe tree root (defaults to the current directory; also via PKGFEED_ROOT)
    #[arg(long, short = 'r', env = "PKGFEED_ROOT", value_name = "PATH", global = true)]
    root: Option<PathBuf>,

    /// Feed registry file (defaults to <root>/feeds.json)
    #[arg(long, env = "PKGFEED_REGISTRY", value_name = "FILE", global = true)]
    registry: Option<PathBuf>,

    /// Local repository directory (defaults to <root>/repo)
    #[arg(long = "repo-dir", env = "PKGFEED_REPO_DIR", value_name = "PATH", global = true)]
    repo_dir: Option<PathBuf>,

    /// Repository database (defaults to <repo-dir>/<name>.db.tar.gz)
    #[arg(long = "repo-db", env = "PKGFEED_REPO_DB", value_name = "FILE", global = true)]
    repo_db: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Upstream lookup timeout in seconds (defaults to 30)
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u64>,

    /// Tries per upstream request before a lookup fails (defaults to 1)
    #[arg(long, value_name = "N", global = true)]
    attempts: Option<usize>,

    /// Run lock file (defaults to <cache-dir>/pkgfeed/pkgfeed.lock)
    #[arg(long = "lock-file", value_name = "FILE", global = true)]
    lock_file: Option<PathBuf>,

    /// Compare versions as plain strings (reduced accuracy)
    #[arg(long = "lexical-compare", global = true)]
    lexical_compare: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Report the upstream status of every package
    Check(CheckArgs),

    /// Update outdated recipes to their upstream version and rebuild them
    Bump(BumpArgs),

    /// Install or rebuild installed packages whose recipe is newer
    Reconcile(ReconcileArgs),

    /// Remove old artifacts from the local repository
    Prune(PruneArgs),

    /// List repository packages missing from the registry
    Orphans(OrphansArgs),

    /// Remove a stale run lock
    Unlock,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Packages to check (all when omitted)
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,

    /// Concurrent upstream lookups
    #[arg(long, short = 'j', default_value_t = 1)]
    jobs: usize,

    /// Only list registry entries and their feed types
    #[arg(long, conflicts_with = "json")]
    list: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Treat registered packages without a recipe as errors
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Args, Debug)]
struct BumpArgs {
    /// Packages to bump (all outdated when omitted)
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,

    /// Only report the planned bumps
    #[arg(long)]
    dry_run: bool,

    /// Reinstall the rebuilt packages that are installed
    #[arg(long)]
    install: bool,

    /// Clean the build directory before building
    #[arg(long)]
    clean: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,

    /// Concurrent upstream lookups
    #[arg(long, short = 'j', default_value_t = 1)]
    jobs: usize,
}

#[derive(clap::Args, Debug)]
struct ReconcileArgs {
    /// Recipe directories to reconcile (all when omitted)
    #[arg(value_name = "DIR")]
    dirs: Vec<String>,

    /// Only report the decisions
    #[arg(long)]
    dry_run: bool,

    /// Clean the build directory before building
    #[arg(long)]
    clean: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct PruneArgs {
    /// Artifacts to keep per package
    #[arg(long, short = 'k', default_value_t = 2)]
    keep: usize,

    /// Only list what would be removed
    #[arg(long)]
    dry_run: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct OrphansArgs {
    /// Delete the orphaned artifacts
    #[arg(long)]
    remove: bool,

    /// Only list what would be removed
    #[arg(long)]
    dry_run: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root.clone(),
            registry: self.registry.clone(),
            repo_dir: self.repo_dir.clone(),
            repo_db: self.repo_db.clone(),
            api_url: self.api_url.clone(),
            timeout: self.timeout,
            attempts: self.attempts,
            lock_file: self.lock_file.clone(),
            lexical_compare: self.lexical_compare,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(RunStatus::Clean) => ExitCode::SUCCESS,
        Ok(RunStatus::Failures) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatus> {
    let runtime = pkgfeed::runtime::RealRuntime;
    let config = Config::load(&runtime, cli.overrides())?;

    let cancel = Cancellation::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing the current package");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Check(args) => {
            let output = if args.list {
                CheckOutput::List
            } else if args.json {
                CheckOutput::Json
            } else {
                CheckOutput::Table
            };
            let options = CheckOptions {
                packages: args.packages,
                jobs: args.jobs,
                strict: args.strict,
            };
            commands::check(runtime, config, options, output, &cancel).await
        }
        Commands::Bump(args) => {
            let check_options = CheckOptions {
                packages: args.packages,
                jobs: args.jobs,
                strict: false,
            };
            let options = BumpOptions {
                dry_run: args.dry_run,
                install: args.install,
                clean: args.clean,
            };
            commands::bump(runtime, config, check_options, options, args.yes, &cancel).await
        }
        Commands::Reconcile(args) => {
            let options = ReconcileOptions {
                dirs: args.dirs,
                dry_run: args.dry_run,
                clean: args.clean,
            };
            commands::reconcile(runtime, config, options, args.yes, &cancel)
        }
        Commands::Prune(args) => {
            commands::prune(runtime, config, args.keep, args.dry_run, args.yes)
        }
        Commands::Orphans(args) => {
            commands::orphans(runtime, config, args.remove, args.dry_run, args.yes)
        }
        Commands::Unlock => commands::unlock(&config),
    }
}
