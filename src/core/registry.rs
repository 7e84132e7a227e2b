//! In-memory job registry.
//!
//! Each job owns a shared record that both the registry and the job's
//! progress sink lock. The registry map itself is only locked for insert
//! and lookup, never across filesystem work.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::runner::run_fetch;
use crate::adapters::{ContentFetcher, FetchError, FetchRequest};
use crate::catalog::{Catalog, TitleId};
use crate::domain::{JobRecord, JobSnapshot, JobSpec, JobState};
use crate::progress::{read_lock, write_lock, JobProgress, ProgressSink};

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Title not found: {0}")]
    TitleNotFound(TitleId),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} cannot be cancelled in state '{state}'")]
    InvalidState { id: String, state: JobState },

    #[error("Failed to create output directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Flags forwarded to the fetcher
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub transform: bool,
    pub delete_after: bool,
}

struct Job {
    spec: JobSpec,
    cancel: CancellationToken,
    record: Arc<RwLock<JobRecord>>,
}

impl Job {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::capture(&self.spec, &read_lock(&self.record))
    }
}

/// Registry of fetch jobs
#[derive(Clone)]
pub struct JobRegistry {
    catalog: Arc<Catalog>,
    fetcher: Arc<dyn ContentFetcher>,
    downloads_dir: PathBuf,
    jobs: Arc<tokio::sync::RwLock<HashMap<String, Arc<Job>>>>,
}

impl JobRegistry {
    pub fn new(
        catalog: Arc<Catalog>,
        fetcher: Arc<dyn ContentFetcher>,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            downloads_dir: downloads_dir.into(),
            jobs: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
        }
    }

    /// Register and start a job writing to `<downloads>/<job id>`
    pub async fn create_job(
        &self,
        title_id: TitleId,
        options: JobOptions,
    ) -> Result<JobSnapshot, JobError> {
        self.create(title_id, options, None).await
    }

    /// Register and start a job writing to an explicit directory
    pub async fn create_job_in(
        &self,
        title_id: TitleId,
        options: JobOptions,
        output_dir: impl Into<PathBuf>,
    ) -> Result<JobSnapshot, JobError> {
        self.create(title_id, options, Some(output_dir.into())).await
    }

    #[instrument(skip(self, options, output_dir), fields(title_id = %title_id))]
    async fn create(
        &self,
        title_id: TitleId,
        options: JobOptions,
        output_dir: Option<PathBuf>,
    ) -> Result<JobSnapshot, JobError> {
        let entry = self
            .catalog
            .lookup(title_id)
            .ok_or(JobError::TitleNotFound(title_id))?;

        let started_at = Utc::now();

        // The directory is created before the map is locked; a lost id race
        // removes the freshly made default directory and tries a new id.
        let (id, output_dir, mut jobs) = loop {
            let id = job_id(title_id, started_at.timestamp());
            let derived = output_dir.is_none();
            let dir = output_dir
                .clone()
                .unwrap_or_else(|| self.downloads_dir.join(&id));
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| JobError::Io {
                    path: dir.clone(),
                    source,
                })?;

            let jobs = self.jobs.write().await;
            if !jobs.contains_key(&id) {
                break (id, dir, jobs);
            }
            drop(jobs);

            debug!(job_id = %id, "Job id collision, retrying");
            if derived {
                let _ = tokio::fs::remove_dir(&dir).await;
            }
        };

        let mut record = JobRecord::new(entry.name.clone());
        record.start();

        let job = Arc::new(Job {
            spec: JobSpec {
                id: id.clone(),
                title_id,
                output_dir,
                transform: options.transform,
                delete_after: options.delete_after,
                started_at,
            },
            cancel: CancellationToken::new(),
            record: Arc::new(RwLock::new(record)),
        });
        let snapshot = job.snapshot();
        jobs.insert(id.clone(), job.clone());
        drop(jobs);

        info!(job_id = %id, title = %entry.name, "Job started");
        self.spawn(job);

        Ok(snapshot)
    }

    fn spawn(&self, job: Arc<Job>) {
        let fetcher = self.fetcher.clone();
        let progress: Arc<dyn ProgressSink> =
            Arc::new(JobProgress::new(job.record.clone(), job.cancel.clone()));
        let request = FetchRequest::new(
            job.spec.title_id,
            job.spec.output_dir.clone(),
            job.spec.transform,
            job.spec.delete_after,
            job.cancel.clone(),
        );

        tokio::spawn(async move {
            let outcome = run_fetch(fetcher, request, progress).await;
            match &outcome {
                Ok(()) => info!(job_id = %job.spec.id, "Job completed"),
                Err(FetchError::Cancelled) => info!(job_id = %job.spec.id, "Job stopped after cancellation"),
                Err(e) => warn!(job_id = %job.spec.id, error = %e, "Job failed"),
            }
            write_lock(&job.record).finish(outcome.map_err(|e| e.to_string()), Utc::now());
        });
    }

    /// Current snapshot of a job
    pub async fn get_job(&self, id: &str) -> Option<JobSnapshot> {
        let job = self.jobs.read().await.get(id).cloned()?;
        Some(job.snapshot())
    }

    /// Request cancellation and mark the job cancelled without waiting
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, id: &str) -> Result<JobSnapshot, JobError> {
        let job = self
            .jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        write_lock(&job.record)
            .cancel(Utc::now())
            .map_err(|state| JobError::InvalidState {
                id: id.to_string(),
                state,
            })?;
        job.cancel.cancel();

        info!(job_id = %id, "Job cancelled");
        Ok(job.snapshot())
    }

    /// All jobs, newest first
    pub async fn list_jobs(&self) -> Vec<JobSnapshot> {
        let jobs: Vec<Arc<Job>> = self.jobs.read().await.values().cloned().collect();
        let mut snapshots: Vec<JobSnapshot> = jobs.iter().map(|job| job.snapshot()).collect();
        snapshots.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// `<TITLEID>-<unix seconds>-<8 hex>`
fn job_id(title_id: TitleId, unix: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", title_id, unix, &suffix[..8])
}
