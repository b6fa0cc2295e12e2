//! Acquire helpers: getting archives onto local disk.

pub mod download;

pub use download::{Fetch, HttpFetcher};
