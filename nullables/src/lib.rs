//! Nullable collaborators for deterministic testing.
//!
//! A system talks to the outside world through three seams: the remote
//! query service, the native sync engine, and the executor listener calls
//! run on. This crate provides test-friendly implementations that:
//! - Reply with scripted data
//! - Record every call for assertions
//! - Never touch the network
//!
//! Usage: hand these to `System::create` in place of the real collaborators.

pub mod blockchaindb;
pub mod engine;
pub mod executor;

pub use blockchaindb::NullBlockchainDb;
pub use engine::{EngineCall, NullSyncEngine};
pub use executor::InlineExecutor;
