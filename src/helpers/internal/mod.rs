//! Internal utility modules
//!
//! Shared functionality used by the acquire/build/patch helpers.

pub mod hash;
pub mod progress;
pub mod url_utils;
