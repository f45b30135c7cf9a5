//! Shared utilities for walletkit.

pub mod fs;
pub mod logging;

pub use fs::{delete_recursively, ensure_path, wipe_all_except};
pub use logging::init_tracing;
