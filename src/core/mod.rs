//! Core infrastructure: configuration, console output and locking.

pub mod config;
pub mod lock;
pub mod output;
