//! Build helpers: turning a downloaded archive into an output tree.

pub mod extract;
pub mod installer;
pub mod sniff;

pub use extract::{ArchiveFormat, Extraction, extract_archive};
pub use installer::InstallerConfig;
