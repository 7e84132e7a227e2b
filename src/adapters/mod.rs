//! Content fetcher interface.
//!
//! The fetcher downloads and transforms one title's payload. This crate
//! only orchestrates it: the fetcher reports through a [`ProgressSink`] and
//! checks for cancellation between units of work.

pub mod process;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::TitleId;
use crate::progress::ProgressSink;

pub use process::ProcessFetcher;

/// Errors returned by a content fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// Opaque failure reported by the fetcher
    #[error("{0}")]
    Failed(String),

    #[error("Failed to start fetcher '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Fetch task panicked: {0}")]
    Panicked(String),

    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

/// Parameters of one fetch call
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Title ID as 16 upper-case hex digits
    pub title_id: String,

    /// Directory the content is written to
    pub destination: PathBuf,

    /// Run the post-download transform stage
    pub transform: bool,

    /// Delete the untransformed payload once the transform succeeds
    pub delete_after: bool,

    /// Fired when cancellation is requested
    pub cancel: CancellationToken,
}

impl FetchRequest {
    pub fn new(
        title_id: TitleId,
        destination: impl Into<PathBuf>,
        transform: bool,
        delete_after: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            title_id: title_id.to_hex(),
            destination: destination.into(),
            transform,
            delete_after,
            cancel,
        }
    }
}

/// Trait for content fetchers
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Human-readable fetcher name
    fn name(&self) -> &str;

    /// Fetch (and optionally transform) one title into `request.destination`
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<(), FetchError>;
}
