//! titledl - Title catalog browser and download manager
//!
//! Queries a catalog of 64-bit title IDs and orchestrates long-running
//! fetch jobs through an external content fetcher.
//!
//! # Architecture
//!
//! - The catalog is a read-only index; platform, kind and format derive
//!   from the title ID's upper 32 bits
//! - Every accepted fetch becomes a job with a small state machine
//! - Fetchers report through a progress sink that either draws to the
//!   terminal or updates a pollable job record
//!
//! # Modules
//!
//! - `catalog`: Title IDs, filters and the catalog index
//! - `progress`: Progress sink trait and its implementations
//! - `domain`: Job state, record and snapshot
//! - `adapters`: Content fetcher trait and the subprocess fetcher
//! - `core`: Job registry and fetch runner
//! - `server`: HTTP API
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! titledl list --category game --region usa
//!
//! # Fetch one title in the foreground
//! titledl fetch --title 00050000101C9500 --output ./out --transform
//!
//! # Run the API server
//! titledl serve --port 8080
//! ```

pub mod adapters;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod progress;
pub mod server;

// Re-export main types at crate root for convenience
pub use adapters::{ContentFetcher, FetchError, FetchRequest, ProcessFetcher};
pub use catalog::{Catalog, CatalogError, TitleEntry, TitleFilter, TitleId};
pub use crate::core::{JobError, JobOptions, JobRegistry};
pub use domain::{JobSnapshot, JobState};
pub use progress::{ConsoleProgress, JobProgress, ProgressSink};
