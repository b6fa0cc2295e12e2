//! Third-party dependency synchronization
//!
//! Reads a JSON manifest of external packages and makes a local package
//! directory match it: each dependency is downloaded, verified against its
//! SHA-256, extracted (zip, tar in any common compression, or a 7-Zip
//! self-extracting installer) and patched, then recorded with a hash marker
//! so the next run can skip it.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   dependencies.json        manifest
//!   patches/zlib.patch       patch files, relative to <root>
//!   package/
//!     zlib/                  extracted tree (output directory)
//!     zlib.sha256            marker: digest of the archive zlib/ came from
//!     .deps.lock             held while a sync runs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use levitate_deps::{SyncConfig, Synchronizer, manifest};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SyncConfig::new("/work/project");
//! let deps = manifest::load_manifest(&config.manifest_path)?;
//! let summary = Synchronizer::new(config)?.sync(&deps)?;
//! summary.print();
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod manifest;

pub use crate::core::config::{SyncConfig, ToolPaths};
pub use crate::core::output;
pub use engine::Synchronizer;
pub use engine::report::{Outcome, RunSummary, Stage};
pub use error::{ManifestError, SyncError, SyncResult};
pub use manifest::{DependencySpec, PatchSpec};
