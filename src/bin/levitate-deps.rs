//! levitate-deps - third-party dependency synchronizer
//!
//! Usage:
//!   levitate-deps [sync] [--only NAME]...   Download, extract and patch what changed
//!   levitate-deps status                    Show what a sync would do
//!   levitate-deps hash <FILE>               Print a file's SHA-256

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use levitate_deps::core::config::DEFAULT_HTTP_TIMEOUT_SECS;
use levitate_deps::core::lock::acquire_package_lock;
use levitate_deps::helpers::internal::hash::sha256_file;
use levitate_deps::{DependencySpec, SyncConfig, Synchronizer, ToolPaths, manifest, output};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "levitate-deps")]
#[command(about = "Keep third-party source packages in sync with a manifest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project root (manifest, patches and package directory are relative to it)
    #[arg(long, global = true, env = "DEPS_ROOT")]
    root: Option<PathBuf>,

    /// Manifest file [default: <root>/dependencies.json]
    #[arg(long, global = true, env = "DEPS_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Package directory [default: <root>/package]
    #[arg(long, global = true, env = "DEPS_PACKAGE_DIR")]
    package_dir: Option<PathBuf>,

    /// Platform to match against `platform` filters [default: host OS]
    #[arg(long, global = true, env = "DEPS_PLATFORM")]
    platform: Option<String>,

    /// HTTP connect/read timeout in seconds (5-300)
    #[arg(long, global = true, env = "DEPS_HTTP_TIMEOUT", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout: u64,

    /// 7-Zip executable used for installer archives
    #[arg(long, global = true, env = "DEPS_SEVENZIP")]
    sevenzip: Option<PathBuf>,

    /// `patch` executable
    #[arg(long, global = true, env = "DEPS_PATCH_TOOL")]
    patch_tool: Option<PathBuf>,

    /// File name glob extracted with 7-Zip (repeatable; replaces the default)
    #[arg(long = "installer-pattern", global = true)]
    installer_patterns: Vec<String>,

    /// Extract archives whose SHA-256 differs from the manifest
    #[arg(long, global = true)]
    allow_hash_mismatch: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the package directory in line with the manifest (default)
    Sync {
        /// Only process these dependencies
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },

    /// Show the cache state of every dependency without touching anything
    Status,

    /// Print the SHA-256 of a file, for filling in manifest hashes
    Hash {
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(mut cli: Cli) -> Result<ExitCode> {
    let command = cli
        .command
        .take()
        .unwrap_or(Commands::Sync { only: Vec::new() });

    match command {
        Commands::Hash { file } => {
            let digest = sha256_file(&file)
                .with_context(|| format!("Failed to hash {}", file.display()))?;
            println!("{}  {}", digest, file.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let config = build_config(&cli)?;
            let deps = load(&config)?;
            let sync = Synchronizer::new(config)?;
            print_status(&sync, &deps)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync { only } => {
            let config = build_config(&cli)?;
            let deps = manifest::select(load(&config)?, &only)?;

            std::fs::create_dir_all(&config.package_dir).with_context(|| {
                format!(
                    "Failed to create package directory: {}",
                    config.package_dir.display()
                )
            })?;
            let _lock = acquire_package_lock(&config.package_dir)?;

            let sync = Synchronizer::new(config)?;
            let summary = sync.sync(&deps)?;
            summary.print();

            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn build_config(cli: &Cli) -> Result<SyncConfig> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let mut config = SyncConfig::new(root).with_http_timeout(cli.http_timeout);

    if let Some(manifest) = &cli.manifest {
        config = config.with_manifest(manifest);
    }
    if let Some(package_dir) = &cli.package_dir {
        config = config.with_package_dir(package_dir);
    }
    if let Some(platform) = &cli.platform {
        config = config.with_platform(platform);
    }

    let defaults = ToolPaths::default();
    config = config.with_tools(ToolPaths {
        sevenzip: cli.sevenzip.clone().unwrap_or(defaults.sevenzip),
        patch: cli.patch_tool.clone().unwrap_or(defaults.patch),
    });

    if !cli.installer_patterns.is_empty() {
        config = config.with_installer_patterns(cli.installer_patterns.clone());
    }

    Ok(config.allow_hash_mismatch(cli.allow_hash_mismatch))
}

fn load(config: &SyncConfig) -> Result<Vec<DependencySpec>> {
    manifest::load_manifest(&config.manifest_path)
        .with_context(|| format!("Invalid manifest {}", config.manifest_path.display()))
}

fn print_status(sync: &Synchronizer, deps: &[DependencySpec]) -> Result<()> {
    output::info(&format!(
        "{} dependencies in {} (platform {})",
        deps.len(),
        sync.config().manifest_path.display(),
        sync.config().platform
    ));

    for dep in deps {
        let plan = sync
            .plan(dep)
            .with_context(|| format!("Failed to inspect {}", dep.name))?;
        output::status_item(&dep.name, &plan.to_string(), plan.is_current());
    }
    Ok(())
}
