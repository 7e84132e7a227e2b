//! Job state and snapshots.
//!
//! A job is one accepted fetch request. Its mutable part, [`JobRecord`],
//! lives behind the same lock the job's progress sink writes through, so a
//! snapshot never mixes fields from different moments.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TitleId;
use crate::progress::format::{format_eta, format_speed};
use crate::progress::ProgressState;

/// State of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Registered, not yet started
    Pending,

    /// Fetch in progress
    Running,

    /// Fetch returned successfully
    Completed,

    /// Fetch returned an error or aborted
    Failed,

    /// Cancellation was requested
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable fields of a job
#[derive(Debug, Clone, Default)]
pub struct JobRecord {
    /// Catalog name, replaced by the fetcher's display name once reported
    pub title_name: String,

    pub state: JobState,

    pub finished_at: Option<DateTime<Utc>>,

    /// Failure reason, only set when `state` is `Failed`
    pub error: Option<String>,

    pub progress: ProgressState,
}

impl JobRecord {
    pub fn new(title_name: impl Into<String>) -> Self {
        Self {
            title_name: title_name.into(),
            ..Default::default()
        }
    }

    /// `pending -> running`. Returns `false` for any other state.
    pub fn start(&mut self) -> bool {
        if self.state != JobState::Pending {
            return false;
        }
        self.state = JobState::Running;
        true
    }

    /// Mark the job cancelled now, without waiting for the fetch to notice.
    ///
    /// Returns the current state as the error when the job is terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), JobState> {
        if self.state.is_terminal() {
            return Err(self.state);
        }
        self.progress.cancel();
        self.state = JobState::Cancelled;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Apply the outcome of the fetch.
    ///
    /// A prior cancellation wins over any outcome; terminal states are never
    /// left.
    pub fn finish(&mut self, outcome: Result<(), String>, now: DateTime<Utc>) {
        if self.state.is_terminal() {
            self.finished_at.get_or_insert(now);
            return;
        }

        self.finished_at = Some(now);
        if self.progress.is_cancelled() {
            self.state = JobState::Cancelled;
            return;
        }

        match outcome {
            Ok(()) => self.state = JobState::Completed,
            Err(error) => {
                self.state = JobState::Failed;
                self.error = Some(error);
            }
        }
    }
}

/// Immutable fields captured at creation
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: String,
    pub title_id: TitleId,
    pub output_dir: PathBuf,
    pub transform: bool,
    pub delete_after: bool,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view of a job, as served to pollers
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub title_id: TitleId,
    pub title_name: String,
    pub status: JobState,
    /// Percent complete, forced to 100 once completed
    pub progress: f64,
    pub download_size: u64,
    pub downloaded: u64,
    pub speed: String,
    pub eta: String,
    pub files_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_progress: Option<f64>,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transform: bool,
    pub delete_after: bool,
}

impl JobSnapshot {
    pub fn capture(spec: &JobSpec, record: &JobRecord) -> Self {
        let metrics = record.progress.metrics();
        let progress = if record.state == JobState::Completed {
            100.0
        } else {
            metrics.percent
        };

        Self {
            id: spec.id.clone(),
            title_id: spec.title_id,
            title_name: record.title_name.clone(),
            status: record.state,
            progress,
            download_size: metrics.total.unwrap_or(0),
            downloaded: metrics.downloaded,
            speed: format_speed(metrics.speed_bps),
            eta: format_eta(metrics.eta),
            files_completed: record.progress.files_completed(),
            transform_progress: record.progress.transform_fraction(),
            output_dir: spec.output_dir.clone(),
            started_at: spec.started_at,
            finished_at: record.finished_at,
            error: record.error.clone(),
            transform: spec.transform,
            delete_after: spec.delete_after,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
