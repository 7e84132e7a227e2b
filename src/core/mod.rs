//! Core job orchestration.
//!
//! This module contains:
//! - Registry: job creation, lookup, cancellation and listing
//! - Runner: executes one fetch and isolates panics

pub mod registry;
pub mod runner;

// Re-export commonly used types
pub use registry::{JobError, JobOptions, JobRegistry};
pub use runner::run_fetch;
