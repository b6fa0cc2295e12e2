//! Per-dependency outcomes and the run summary.

use crate::core::output;
use crate::error::SyncError;
use crate::helpers::build::ArchiveFormat;
use std::fmt;

/// Pipeline stage a dependency was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preparing,
    Downloading,
    Verifying,
    Extracting,
    Patching,
    Finalizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preparing => "preparing",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Patching => "patching",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// A failure attributed to the stage that produced it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: SyncError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// Tag a stage onto a `SyncResult`.
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T, SyncError> {
    fn at(self, stage: Stage) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

/// How processing one dependency ended.
#[derive(Debug)]
pub enum Outcome {
    /// Downloaded, extracted and patched; marker written
    Updated {
        digest: String,
        format: ArchiveFormat,
        patches: usize,
    },
    /// Marker matched the manifest hash
    UpToDate,
    /// Platform filter excluded this host
    SkippedPlatform { required: String },
    Failed(StageFailure),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one named dependency.
#[derive(Debug)]
pub struct DependencyReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Aggregated result of a synchronization run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<DependencyReport>,
}

impl RunSummary {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Updated { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, Outcome::UpToDate))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::SkippedPlatform { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &DependencyReport> {
        self.reports.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Look up the report for `name`.
    pub fn get(&self, name: &str) -> Option<&DependencyReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Print the closing summary: failures first, then the counts line.
    pub fn print(&self) {
        for report in self.failed() {
            if let Outcome::Failed(failure) = &report.outcome {
                output::error(&format!("{}: {}", report.name, failure));
            }
        }

        let line = format!(
            "{} updated, {} up to date, {} skipped, {} failed",
            self.updated(),
            self.up_to_date(),
            self.skipped(),
            self.failed().count()
        );
        if self.has_failures() {
            output::error(&line);
        } else {
            output::success(&line);
        }
    }
}
