//! Pipeline helpers
//!
//! Each stage of a dependency update lives here as a plain function or a
//! small trait seam:
//!
//! - **acquire**: `Fetch` / `HttpFetcher` download an archive
//! - **build**: content sniffing and extraction (zip, tar, installers)
//! - **patch**: ordered unified-diff application
//! - **tool**: external command invocation (`ToolRunner`)
//! - **internal**: hashing, archive naming, progress bars

pub mod acquire;
pub mod build;
pub mod internal;
pub mod patch;
pub mod tool;
