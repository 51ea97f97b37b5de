//! Format task runner: one (job, format) pair end to end.
//!
//! ```text
//! processing row ──► select method ──► execute ──► store artifact ──► completed row
//!                         │                │              │
//!                         └────────────────┴──────────────┴──────────► failed row
//! ```
//!
//! [`FormatTaskRunner::run`] never returns an error and never panics past
//! its boundary. Every failure ends up as a `failed` [`FormatResult`] with a
//! readable message; sibling formats are unaffected.

use crate::executor::{Executors, TransformError};
use crate::imaging::Quality;
use crate::job::{FormatResult, ResizeJob};
use crate::presets::FormatPreset;
use crate::selector::{Method, MethodSelector, SelectionError};
use crate::storage::{Location, ObjectStorage, StorageError, artifact_path};
use crate::store::StatusStore;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Why a format failed. Only its message leaves the runner.
#[derive(Error, Debug)]
enum TaskError {
    #[error("method selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error("{0}")]
    Transform(#[from] TransformError),
    #[error("storing artifact failed: {0}")]
    Storage(#[from] StorageError),
    #[error("{method} executor panicked: {message}")]
    Panicked { method: Method, message: String },
}

pub struct FormatTaskRunner<'a> {
    pub selector: &'a MethodSelector,
    pub executors: &'a Executors,
    pub storage: &'a dyn ObjectStorage,
    pub store: &'a dyn StatusStore,
    pub quality: Quality,
}

impl FormatTaskRunner<'_> {
    /// Produce, store, and record one format. Always returns a terminal result.
    pub fn run(&self, job: &ResizeJob, preset: &FormatPreset) -> FormatResult {
        let started = Instant::now();
        let mut result = FormatResult::processing(&job.id, preset);
        self.record(&result);

        let mut method = None;
        let outcome = self.produce(job, preset, &mut method);
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((method, location)) => {
                info!(
                    job = %job.id,
                    format = %preset.id,
                    %method,
                    duration_ms,
                    path = %location.path,
                    "format completed"
                );
                result.complete(method, location, duration_ms);
            }
            Err(err) => {
                warn!(
                    job = %job.id,
                    format = %preset.id,
                    method = method.map(Method::as_str).unwrap_or("none"),
                    duration_ms,
                    "format failed: {err}"
                );
                result.fail(method, err.to_string(), duration_ms);
            }
        }

        self.record(&result);
        result
    }

    fn produce(
        &self,
        job: &ResizeJob,
        preset: &FormatPreset,
        method_out: &mut Option<Method>,
    ) -> Result<(Method, Location), TaskError> {
        let master = &job.master;
        let method = self
            .selector
            .select(master.width(), master.height(), preset)?;
        *method_out = Some(method);
        debug!(job = %job.id, format = %preset.id, %method, "method selected");

        let executor = self.executors.for_method(method);
        let bytes = catch_unwind(AssertUnwindSafe(|| executor.execute(master, preset)))
            .map_err(|payload| TaskError::Panicked {
                method,
                message: panic_message(payload.as_ref()),
            })??;

        let path = artifact_path(
            &job.id,
            &preset.id,
            master.encoding(self.quality).extension(),
        );
        let location = self.storage.put(&path, &bytes)?;
        Ok((method, location))
    }

    /// Store failures are logged; the returned result stays authoritative.
    fn record(&self, result: &FormatResult) {
        if let Err(e) = self.store.upsert_result(result) {
            error!(
                job = %result.job_id,
                format = %result.format_id,
                status = %result.status,
                "failed to record format result: {e}"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
