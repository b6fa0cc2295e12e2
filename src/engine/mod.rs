//! Dependency synchronization engine
//!
//! Processes the manifest strictly in order, one dependency at a time:
//!
//! 1. platform filter: mismatching dependencies are skipped before any I/O
//! 2. cache decision: a marker matching the manifest hash means nothing to do
//! 3. invalidate: remove the old output directory and marker
//! 4. download, verify, extract, patch
//! 5. write the marker and delete the downloaded archive
//!
//! A failure at any stage is recorded for that dependency and the run moves
//! on; only step 5 makes a dependency count as installed.

pub mod cache;
pub mod report;

use crate::core::config::SyncConfig;
use crate::core::output;
use crate::error::{SyncError, SyncResult};
use crate::helpers::acquire::{Fetch, HttpFetcher};
use crate::helpers::build::{Extraction, InstallerConfig, extract_archive};
use crate::helpers::internal::hash::{digests_match, sha256_file};
use crate::helpers::patch::apply_patches;
use crate::helpers::tool::{SystemRunner, ToolRunner};
use crate::manifest::DependencySpec;
use std::fmt;

use cache::{CacheDecision, PackageLayout};
use report::{AtStage, DependencyReport, Outcome, RunSummary, Stage, StageFailure};

/// What a sync run would do with a dependency, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    SkipPlatform { required: String },
    Cache(CacheDecision),
}

impl Plan {
    /// Installed and matching the manifest hash.
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Cache(CacheDecision::UpToDate))
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipPlatform { required } => write!(f, "skipped (requires {})", required),
            Self::Cache(decision) => write!(f, "{}", decision),
        }
    }
}

/// Drives dependencies through the download/extract/patch pipeline.
pub struct Synchronizer {
    config: SyncConfig,
    layout: PackageLayout,
    installer: InstallerConfig,
    fetcher: Box<dyn Fetch>,
    runner: Box<dyn ToolRunner>,
}

impl Synchronizer {
    /// Synchronizer with the real HTTP client and process runner.
    pub fn new(config: SyncConfig) -> Result<Self, glob::PatternError> {
        let fetcher = HttpFetcher::new(config.http_timeout);
        Self::with_backends(config, Box::new(fetcher), Box::new(SystemRunner))
    }

    /// Synchronizer with substitute network and tool backends.
    pub fn with_backends(
        config: SyncConfig,
        fetcher: Box<dyn Fetch>,
        runner: Box<dyn ToolRunner>,
    ) -> Result<Self, glob::PatternError> {
        let installer = InstallerConfig::new(&config.installer_patterns, &config.tools.sevenzip)?;
        Ok(Self {
            layout: PackageLayout::new(&config.package_dir),
            config,
            installer,
            fetcher,
            runner,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn layout(&self) -> &PackageLayout {
        &self.layout
    }

    /// Process every dependency in order and collect their outcomes.
    pub fn sync(&self, deps: &[DependencySpec]) -> SyncResult<RunSummary> {
        let package_dir = self.layout.package_dir();
        std::fs::create_dir_all(package_dir).map_err(SyncError::io("cannot create", package_dir))?;

        let total = deps.len();
        output::action(&format!(
            "Synchronizing {} dependencies into {}",
            total,
            package_dir.display()
        ));
        let reports = deps
            .iter()
            .enumerate()
            .map(|(i, dep)| {
                output::action_numbered(i + 1, total, &dep.name);
                DependencyReport {
                    name: dep.name.clone(),
                    outcome: self.sync_one(dep),
                }
            })
            .collect();

        Ok(RunSummary { reports })
    }

    /// Decide what `sync` would do with `dep`. Reads markers only.
    pub fn plan(&self, dep: &DependencySpec) -> SyncResult<Plan> {
        if !dep.applies_to(&self.config.platform) {
            return Ok(Plan::SkipPlatform {
                required: dep.platform_filter.clone().unwrap_or_default(),
            });
        }
        cache::decide(&self.layout, dep).map(Plan::Cache)
    }

    /// Process a single dependency.
    pub fn sync_one(&self, dep: &DependencySpec) -> Outcome {
        match self.run_pipeline(dep) {
            Ok(outcome) => outcome,
            Err(failure) => {
                output::error(&format!("{}: {}", dep.name, failure));
                Outcome::Failed(failure)
            }
        }
    }

    fn run_pipeline(&self, dep: &DependencySpec) -> Result<Outcome, StageFailure> {
        let decision = match self.plan(dep).at(Stage::Preparing)? {
            Plan::SkipPlatform { required } => {
                output::skip(&format!("{} skipped (requires {})", dep.name, required));
                return Ok(Outcome::SkippedPlatform { required });
            }
            Plan::Cache(decision) => decision,
        };

        match &decision {
            CacheDecision::UpToDate => {
                output::skip(&format!("{} up to date", dep.name));
                return Ok(Outcome::UpToDate);
            }
            CacheDecision::Stale { recorded, expected } => {
                output::warning(&format!(
                    "different hash for {}\n  current:  {}\n  expected: {}\n  redownloading",
                    dep.name, recorded, expected
                ));
            }
            CacheDecision::Missing | CacheDecision::Uncached => {}
        }

        cache::invalidate(&self.layout, &dep.name).at(Stage::Preparing)?;

        let archive = self.layout.download_path(dep);
        let output_dir = self.layout.output_dir(&dep.name);

        output::sub_action("downloading");
        output::detail(&dep.url);
        self.fetcher.fetch(&dep.url, &archive).at(Stage::Downloading)?;

        output::sub_action("verifying");
        let digest = sha256_file(&archive)
            .map_err(SyncError::io("cannot read", &archive))
            .at(Stage::Verifying)?;
        if let Some(expected) = &dep.expected_hash
            && !digests_match(&digest, expected)
        {
            let mismatch = SyncError::HashMismatch {
                path: archive.clone(),
                expected: expected.clone(),
                actual: digest.clone(),
            };
            if !self.config.allow_hash_mismatch {
                return Err(mismatch).at(Stage::Verifying);
            }
            output::warning(&format!("{}; extracting anyway", mismatch));
        }

        output::sub_action("extracting");
        let format = extract_archive(&Extraction {
            archive: &archive,
            dest: &output_dir,
            installer: &self.installer,
            runner: self.runner.as_ref(),
        })
        .at(Stage::Extracting)?;

        let patches = if dep.patches.is_empty() {
            0
        } else {
            output::sub_action("patching");
            apply_patches(
                &dep.patches,
                &output_dir,
                &self.config.root,
                &self.config.tools.patch,
                self.runner.as_ref(),
            )
            .at(Stage::Patching)?
        };

        cache::write_marker(&self.layout, &dep.name, &digest).at(Stage::Finalizing)?;
        std::fs::remove_file(&archive)
            .map_err(SyncError::io("cannot remove", &archive))
            .at(Stage::Finalizing)?;

        output::success(&format!("{} updated ({})", dep.name, format));
        Ok(Outcome::Updated {
            digest,
            format,
            patches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::tool::{ToolCommand, ToolOutput};
    use std::path::Path;

    struct NoNetwork;

    impl Fetch for NoNetwork {
        fn fetch(&self, url: &str, _dest: &Path) -> SyncResult<u64> {
            panic!("unexpected download of {url}");
        }
    }

    struct NoTools;

    impl ToolRunner for NoTools {
        fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
            panic!("unexpected tool run: {}", command.program.display());
        }
    }

    fn synchronizer(root: &Path) -> Synchronizer {
        let config = SyncConfig::new(root).with_platform("Linux");
        Synchronizer::with_backends(config, Box::new(NoNetwork), Box::new(NoTools)).unwrap()
    }

    fn dep(platform: Option<&str>, hash: Option<&str>) -> DependencySpec {
        DependencySpec {
            name: "zlib".to_string(),
            url: "https://zlib.net/zlib-1.3.1.tar.gz".to_string(),
            platform_filter: platform.map(str::to_string),
            expected_hash: hash.map(str::to_string),
            patches: Vec::new(),
        }
    }

    #[test]
    fn test_plan_skips_other_platform() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());

        let plan = sync.plan(&dep(Some("Windows"), Some("abcd"))).unwrap();
        assert_eq!(
            plan,
            Plan::SkipPlatform {
                required: "Windows".to_string()
            }
        );
        assert_eq!(plan.to_string(), "skipped (requires Windows)");
        assert!(!plan.is_current());
    }

    #[test]
    fn test_plan_reports_stale_marker() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());
        let layout = sync.layout();
        std::fs::create_dir_all(layout.output_dir("zlib")).unwrap();
        std::fs::write(layout.marker_path("zlib"), "0000\n").unwrap();

        let plan = sync.plan(&dep(Some("Linux"), Some("abcd"))).unwrap();
        assert_eq!(
            plan,
            Plan::Cache(CacheDecision::Stale {
                recorded: "0000".to_string(),
                expected: "abcd".to_string(),
            })
        );
        assert_eq!(plan.to_string(), "stale (installed 0000)");
        assert!(!plan.is_current());
    }

    #[test]
    fn test_plan_up_to_date_is_current() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());
        let layout = sync.layout();
        std::fs::create_dir_all(layout.output_dir("zlib")).unwrap();
        std::fs::write(layout.marker_path("zlib"), "ABCD").unwrap();

        let plan = sync.plan(&dep(None, Some("abcd"))).unwrap();
        assert_eq!(plan, Plan::Cache(CacheDecision::UpToDate));
        assert!(plan.is_current());
    }

    #[test]
    fn test_plan_without_marker_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path());

        assert_eq!(
            sync.plan(&dep(None, Some("abcd"))).unwrap(),
            Plan::Cache(CacheDecision::Missing)
        );
        assert_eq!(sync.plan(&dep(None, None)).unwrap(), Plan::Cache(CacheDecision::Uncached));
    }
}
