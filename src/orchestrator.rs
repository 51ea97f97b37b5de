//! Batch orchestrator: fans a job's formats out under a fixed concurrency
//! limit and derives the job's terminal status.
//!
//! ## Processing a job
//!
//! ```text
//! submit ──► pending ──► processing ──► ┌──────────── pool of K threads ────────────┐
//!                                       │ format 1   format 2   format 3            │
//!                                       │ format 4   ...        (queued until free) │
//!                                       └────────────────────┬──────────────────────┘
//!                                                            ▼
//!                                     completed iff every format completed, else failed
//! ```
//!
//! - **Bounded**: formats run on a dedicated rayon pool with exactly
//!   `max_concurrent` threads; extra formats wait for a free thread.
//! - **Fan-out/fan-in**: all dispatched formats run to completion. A failed
//!   format never cancels its siblings.
//! - **No job-level retry**: a failed job is terminal. Resubmit to retry.
//!
//! Input problems (empty or undecodable image, unknown or missing formats)
//! are rejected by [`BatchOrchestrator::submit`] before anything is dispatched.

use crate::executor::Executors;
use crate::imaging::{BackendError, ImageBackend, Quality};
use crate::job::{
    FormatResult, FormatStatus, JobStatus, JobSubmission, MasterImage, ResizeJob, TransitionError,
    aggregate_status, is_valid_job_id,
};
use crate::presets::{FormatPreset, FormatRegistry, PresetError};
use crate::selector::{Method, MethodSelector, SelectionError};
use crate::storage::ObjectStorage;
use crate::store::{StatusStore, StoreError};
use crate::task::FormatTaskRunner;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("master image is empty")]
    EmptyImage,
    #[error("master image could not be read: {0}")]
    InvalidImage(#[from] BackendError),
    #[error("no formats requested")]
    NoFormats,
    #[error(transparent)]
    UnknownFormat(#[from] PresetError),
    #[error("invalid job id {0:?} (use 1-64 of A-Z a-z 0-9 _ -)")]
    InvalidJobId(String),
    #[error("failed to persist job: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("job {job_id} is already {status}")]
    AlreadyTerminal { job_id: String, status: JobStatus },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error("job store error: {0}")]
    Store(#[from] StoreError),
}

/// Events emitted while a job runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    JobStarted {
        job_id: String,
        formats: usize,
        concurrency: usize,
    },
    FormatStarted {
        job_id: String,
        format_id: String,
    },
    FormatFinished {
        result: FormatResult,
    },
    JobFinished {
        job_id: String,
        status: JobStatus,
        completed: usize,
        failed: usize,
    },
}

/// Each format of a job paired with the method it would use.
pub type FormatPlan = Vec<(FormatPreset, Result<Method, SelectionError>)>;

/// Everything the orchestrator is assembled from.
pub struct OrchestratorParts {
    pub registry: Arc<FormatRegistry>,
    pub selector: MethodSelector,
    pub executors: Executors,
    pub backend: Arc<dyn ImageBackend>,
    pub storage: Arc<dyn ObjectStorage>,
    pub store: Arc<dyn StatusStore>,
    pub quality: Quality,
    pub max_concurrent: usize,
}

pub struct BatchOrchestrator {
    registry: Arc<FormatRegistry>,
    selector: MethodSelector,
    executors: Executors,
    backend: Arc<dyn ImageBackend>,
    storage: Arc<dyn ObjectStorage>,
    store: Arc<dyn StatusStore>,
    quality: Quality,
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(parts: OrchestratorParts) -> Result<Self, OrchestratorError> {
        let concurrency = parts.max_concurrent.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("format-worker-{i}"))
            .build()?;
        Ok(Self {
            registry: parts.registry,
            selector: parts.selector,
            executors: parts.executors,
            backend: parts.backend,
            storage: parts.storage,
            store: parts.store,
            quality: parts.quality,
            pool,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn store(&self) -> &dyn StatusStore {
        self.store.as_ref()
    }

    /// Validate a submission and persist it as a `pending` job.
    pub fn submit(&self, submission: JobSubmission) -> Result<ResizeJob, SubmitError> {
        let id = match submission.job_id {
            Some(id) if is_valid_job_id(&id) => id,
            Some(id) => return Err(SubmitError::InvalidJobId(id)),
            None => uuid::Uuid::new_v4().to_string(),
        };
        if submission.image.is_empty() {
            return Err(SubmitError::EmptyImage);
        }
        if submission.formats.is_empty() {
            return Err(SubmitError::NoFormats);
        }
        let presets = self.registry.resolve(&submission.formats)?;
        let master = MasterImage::decode(self.backend.as_ref(), submission.image)?;

        let formats = presets.into_iter().map(|p| p.id).collect();
        let job = ResizeJob::new(id, submission.owner, master, formats);
        self.store.save_job(&job.record())?;
        info!(
            job = %job.id,
            formats = job.formats.len(),
            width = job.master.width(),
            height = job.master.height(),
            "job submitted"
        );
        Ok(job)
    }

    /// Method each of the job's formats would use, without running anything.
    pub fn plan(&self, job: &ResizeJob) -> Result<FormatPlan, PresetError> {
        let (w, h) = job.master.dimensions();
        Ok(self
            .registry
            .resolve(&job.formats)?
            .into_iter()
            .map(|preset| {
                let method = self.selector.select(w, h, &preset);
                (preset, method)
            })
            .collect())
    }

    pub fn runner(&self) -> FormatTaskRunner<'_> {
        FormatTaskRunner {
            selector: &self.selector,
            executors: &self.executors,
            storage: self.storage.as_ref(),
            store: self.store.as_ref(),
            quality: self.quality,
        }
    }

    /// Run every requested format and finalize the job.
    ///
    /// Returns the terminal status. Per-format failures are recorded in the
    /// store and never surface here; errors are limited to the job itself
    /// (already terminal, job record not persistable).
    pub fn process_job(
        &self,
        job: &mut ResizeJob,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<JobStatus, OrchestratorError> {
        if job.status.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal {
                job_id: job.id.clone(),
                status: job.status,
            });
        }
        let presets = self.registry.resolve(&job.formats)?;

        job.transition(JobStatus::Processing)?;
        self.store.save_job(&job.record())?;
        info!(
            job = %job.id,
            formats = presets.len(),
            concurrency = self.concurrency,
            "job processing"
        );
        emit(
            &progress,
            ProgressEvent::JobStarted {
                job_id: job.id.clone(),
                formats: presets.len(),
                concurrency: self.concurrency,
            },
        );

        let results = self.fan_out(job, &presets, &progress);

        let status = aggregate_status(&results);
        let completed = count(&results, FormatStatus::Completed);
        let failed = count(&results, FormatStatus::Failed);
        job.transition(status)?;
        self.save_terminal(job)?;

        if status == JobStatus::Completed {
            info!(job = %job.id, completed, "job completed");
        } else {
            warn!(job = %job.id, completed, failed, "job failed");
        }
        emit(
            &progress,
            ProgressEvent::JobFinished {
                job_id: job.id.clone(),
                status,
                completed,
                failed,
            },
        );
        Ok(status)
    }

    /// Every result row is terminal by now; one retry before the job record
    /// is left behind at `processing`.
    fn save_terminal(&self, job: &ResizeJob) -> Result<(), StoreError> {
        let record = job.record();
        if let Err(err) = self.store.save_job(&record) {
            warn!(job = %job.id, status = %job.status, "saving job failed, retrying: {err}");
            self.store.save_job(&record)?;
        }
        Ok(())
    }

    fn fan_out(
        &self,
        job: &ResizeJob,
        presets: &[FormatPreset],
        progress: &Option<Sender<ProgressEvent>>,
    ) -> Vec<FormatResult> {
        let runner = self.runner();
        self.pool.install(|| {
            presets
                .par_iter()
                .map(|preset| {
                    emit(
                        progress,
                        ProgressEvent::FormatStarted {
                            job_id: job.id.clone(),
                            format_id: preset.id.clone(),
                        },
                    );
                    let result = runner.run(job, preset);
                    emit(
                        progress,
                        ProgressEvent::FormatFinished {
                            result: result.clone(),
                        },
                    );
                    result
                })
                .collect()
        })
    }
}

fn emit(progress: &Option<Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(event);
    }
}

fn count(results: &[FormatResult], status: FormatStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}
