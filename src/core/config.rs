//! Run configuration
//!
//! Every path the pipeline touches is derived from an explicit root directory
//! rather than from the location of the running binary.

use std::path::PathBuf;
use std::time::Duration;

/// Default manifest file name, relative to the root
pub const DEFAULT_MANIFEST_NAME: &str = "dependencies.json";

/// Default package directory name, relative to the root
pub const DEFAULT_PACKAGE_DIR_NAME: &str = "package";

/// Default HTTP timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Self-extracting installers that need 7-Zip to unpack
pub const DEFAULT_INSTALLER_PATTERNS: &[&str] = &["LLVM-*-win64.exe"];

/// Configuration for a synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Project root; manifest patch paths are relative to it
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub package_dir: PathBuf,
    /// Platform identifier compared against each dependency's `platform`
    pub platform: String,
    /// Connect and per-read timeout (not a whole-transfer deadline)
    pub http_timeout: Duration,
    pub tools: ToolPaths,
    /// File name globs routed to the installer extractor
    pub installer_patterns: Vec<String>,
    /// Extract archives whose digest differs from the manifest (warn only)
    pub allow_hash_mismatch: bool,
}

/// Locations of the external tools the pipeline may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub sevenzip: PathBuf,
    pub patch: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            sevenzip: default_sevenzip_path(),
            patch: PathBuf::from("patch"),
        }
    }
}

impl SyncConfig {
    /// Configuration with defaults derived from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(DEFAULT_MANIFEST_NAME),
            package_dir: root.join(DEFAULT_PACKAGE_DIR_NAME),
            root,
            platform: host_platform(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            tools: ToolPaths::default(),
            installer_patterns: DEFAULT_INSTALLER_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allow_hash_mismatch: false,
        }
    }

    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_package_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_dir = path.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the HTTP timeout, clamped to a reasonable range (5-300 seconds).
    pub fn with_http_timeout(mut self, secs: u64) -> Self {
        self.http_timeout = Duration::from_secs(secs.clamp(5, 300));
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_installer_patterns(mut self, patterns: Vec<String>) -> Self {
        self.installer_patterns = patterns;
        self
    }

    pub fn allow_hash_mismatch(mut self, allow: bool) -> Self {
        self.allow_hash_mismatch = allow;
        self
    }
}

/// Canonical name of the host operating system.
///
/// Matches the spelling manifests use for `platform` filters
/// ("Windows", "Linux", "Darwin").
pub fn host_platform() -> String {
    platform_name(std::env::consts::OS)
}

fn platform_name(os: &str) -> String {
    match os {
        "windows" => "Windows".to_string(),
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        "netbsd" => "NetBSD".to_string(),
        "openbsd" => "OpenBSD".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn default_sevenzip_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\7-Zip\7z.exe")
    } else {
        PathBuf::from("7z")
    }
}
