//! Cache decisions and on-disk package layout
//!
//! A dependency's hash marker (`<package-dir>/<name>.sha256`) records the
//! digest of the last archive that went through the whole pipeline. It is the
//! only signal that an output directory is complete: a crash or failure at any
//! stage leaves no marker, so the next run rebuilds from scratch.

use crate::error::{SyncError, SyncResult};
use crate::helpers::internal::hash::digests_match;
use crate::helpers::internal::url_utils::resolve_archive_name;
use crate::manifest::DependencySpec;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extension of hash marker files
pub const MARKER_EXTENSION: &str = "sha256";

/// Paths owned by dependencies inside the package directory.
#[derive(Debug, Clone)]
pub struct PackageLayout {
    package_dir: PathBuf,
}

impl PackageLayout {
    pub fn new(package_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_dir: package_dir.into(),
        }
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Extracted tree: `<package-dir>/<name>/`
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.package_dir.join(name)
    }

    /// Hash marker: `<package-dir>/<name>.sha256`
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.package_dir.join(format!("{}.{}", name, MARKER_EXTENSION))
    }

    /// Transient download location: `<package-dir>/<file-name>`
    pub fn archive_path(&self, file_name: &str) -> PathBuf {
        self.package_dir.join(file_name)
    }

    /// Where `dep`'s archive is downloaded to.
    ///
    /// When the URL has no file-like segment the archive name falls back to
    /// the dependency name, which is also the output directory; those
    /// downloads get a `.download` suffix instead.
    pub fn download_path(&self, dep: &DependencySpec) -> PathBuf {
        let file_name = resolve_archive_name(dep);
        if file_name == dep.name {
            self.archive_path(&format!("{}.download", file_name))
        } else {
            self.archive_path(&file_name)
        }
    }
}

/// What the cache engine concluded about a dependency's local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// Marker matches the manifest hash; nothing to do
    UpToDate,
    /// Marker exists but records a different archive
    Stale { recorded: String, expected: String },
    /// No marker or no output directory: never installed, or interrupted
    Missing,
    /// Manifest has no hash, so local state can never be trusted
    Uncached,
}

impl CacheDecision {
    pub fn must_update(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for CacheDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::Stale { recorded, .. } => write!(f, "stale (installed {})", short(recorded)),
            Self::Missing => f.write_str("not installed"),
            Self::Uncached => f.write_str("no hash in manifest, always updated"),
        }
    }
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// Decide whether `dep` needs updating, based on its marker and output directory.
pub fn decide(layout: &PackageLayout, dep: &DependencySpec) -> SyncResult<CacheDecision> {
    let Some(expected) = &dep.expected_hash else {
        return Ok(CacheDecision::Uncached);
    };

    let marker = layout.marker_path(&dep.name);
    if !layout.output_dir(&dep.name).is_dir() || !marker.is_file() {
        return Ok(CacheDecision::Missing);
    }

    let recorded = std::fs::read_to_string(&marker).map_err(SyncError::io("cannot read", &marker))?;
    let recorded = recorded.trim();

    if digests_match(recorded, expected) {
        Ok(CacheDecision::UpToDate)
    } else {
        Ok(CacheDecision::Stale {
            recorded: recorded.to_string(),
            expected: expected.clone(),
        })
    }
}

/// Remove the output directory and marker so the dependency rebuilds from scratch.
pub fn invalidate(layout: &PackageLayout, name: &str) -> SyncResult<()> {
    let output_dir = layout.output_dir(name);
    if output_dir.exists() {
        std::fs::remove_dir_all(&output_dir).map_err(SyncError::io("cannot remove", &output_dir))?;
    }

    let marker = layout.marker_path(name);
    if marker.exists() {
        std::fs::remove_file(&marker).map_err(SyncError::io("cannot remove", &marker))?;
    }
    Ok(())
}

/// Record `digest` as the last fully processed archive for `name`.
pub fn write_marker(layout: &PackageLayout, name: &str, digest: &str) -> SyncResult<()> {
    let marker = layout.marker_path(name);
    std::fs::write(&marker, digest).map_err(SyncError::io("cannot write", &marker))
}
