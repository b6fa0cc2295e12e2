//! Dependency manifest
//!
//! The manifest is a JSON array of dependency records:
//!
//! ```json
//! [
//!   {
//!     "name": "zlib",
//!     "url": "https://zlib.net/zlib-1.3.1.tar.gz",
//!     "hash": "9a93b2b7dfdac77ceba5a558a580e74667dd6fede4585b91eefb60f03b72df23",
//!     "patches": [{ "file": "CMakeLists.txt", "patch": "patches/zlib-cmake.patch" }]
//!   },
//!   { "name": "llvm", "platform": "Windows", "url": "https://example.com/LLVM-13.0.0-win64.exe" }
//! ]
//! ```
//!
//! Order is preserved; dependencies are processed in the order they appear.

use crate::error::ManifestError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// One external package to keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DependencySpec {
    /// Unique identifier, used as the output directory name and marker key
    pub name: String,
    pub url: String,
    /// Only process this dependency when the host platform matches
    #[serde(default, rename = "platform")]
    pub platform_filter: Option<String>,
    /// Hex-encoded SHA-256 of the archive; without it nothing is cached
    #[serde(default, rename = "hash")]
    pub expected_hash: Option<String>,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
}

/// A unified diff applied to one file of the extracted tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatchSpec {
    /// File to patch, relative to the dependency's output directory
    #[serde(rename = "file")]
    pub target_file: PathBuf,
    /// Patch file, relative to the project root
    #[serde(rename = "patch")]
    pub patch_file: PathBuf,
}

impl DependencySpec {
    /// Whether this dependency should be processed on `platform`.
    pub fn applies_to(&self, platform: &str) -> bool {
        match &self.platform_filter {
            Some(required) => required == platform,
            None => true,
        }
    }
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<DependencySpec>, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let deps: Vec<DependencySpec> =
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate(&deps)?;
    Ok(deps)
}

/// Reject manifests whose names would collide or escape the package directory.
pub fn validate(deps: &[DependencySpec]) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for dep in deps {
        validate_name(&dep.name)?;
        if !seen.insert(dep.name.as_str()) {
            return Err(ManifestError::DuplicateName(dep.name.clone()));
        }
        for patch in &dep.patches {
            if !is_confined(&patch.target_file) {
                return Err(ManifestError::UnsafePatchTarget {
                    name: dep.name.clone(),
                    target: patch.target_file.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Pick the dependencies named in `only`, keeping manifest order.
///
/// An empty `only` selects everything.
pub fn select(
    deps: Vec<DependencySpec>,
    only: &[String],
) -> Result<Vec<DependencySpec>, ManifestError> {
    if only.is_empty() {
        return Ok(deps);
    }
    if let Some(unknown) = only.iter().find(|name| !deps.iter().any(|d| &d.name == *name)) {
        return Err(ManifestError::UnknownName(unknown.clone()));
    }
    Ok(deps
        .into_iter()
        .filter(|d| only.contains(&d.name))
        .collect())
}

/// Relative path that stays below the directory it is joined to.
fn is_confined(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_name(name: &str) -> Result<(), ManifestError> {
    let invalid = |reason: &str| ManifestError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name cannot be a relative path component"));
    }
    // Leading dots are reserved for the lock file and scratch directories
    if name.starts_with('.') {
        return Err(invalid("name cannot start with a dot"));
    }
    // Siblings of the output directory use these suffixes
    if let Some(suffix) = [".sha256", ".download"].iter().find(|s| name.ends_with(**s)) {
        return Err(invalid(&format!("name cannot end with '{}'", suffix)));
    }
    // Names become directory names under the package directory
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(invalid(
            "only alphanumeric characters, underscores, hyphens and dots are allowed",
        ));
    }
    Ok(())
}
