//! Error types for dependency synchronization.
//!
//! `ManifestError` is fatal to a run. `SyncError` is scoped to a single
//! dependency: the orchestrator records it and moves on to the next one.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for per-dependency operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while loading or validating the manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dependency '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("invalid dependency name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("dependency '{name}' patches a file outside its tree: {target}")]
    UnsafePatchTarget { name: String, target: PathBuf },

    #[error("unknown dependency '{0}'")]
    UnknownName(String),
}

/// Errors that abort processing of one dependency.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("download of {url} failed with HTTP status {code}")]
    HttpStatus { url: String, code: u16 },

    #[error("download of {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sha256 mismatch for {}: expected {expected}, got {actual}", .path.display())]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unrecognized archive format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("archive {} is corrupt: {message}", .path.display())]
    CorruptArchive { path: PathBuf, message: String },

    #[error("archive contains unsafe entry: {0}")]
    UnsafeEntry(String),

    #[error("required tool not found: {}", .tool.display())]
    ToolMissing { tool: PathBuf },

    #[error("command failed: {cmd} (exit code: {code:?})\n{stderr}")]
    ToolFailed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("installer payload not found in {}: expected one top-level directory, found {found}", .dir.display())]
    InstallerLayout { dir: PathBuf, found: usize },

    #[error("patch file not found: {}", .path.display())]
    PatchMissing { path: PathBuf },
}

impl SyncError {
    /// Wrap an I/O error with the action and path that produced it.
    pub fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SyncError::Io {
            action,
            path,
            source,
        }
    }
}
