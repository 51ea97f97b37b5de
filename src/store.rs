//! Job status store.
//!
//! Persists each job record and its per-format results so an external poller
//! can follow progress. Results are keyed by `(job_id, format_id)`: writing a
//! result for a pair that already has one replaces it.
//!
//! Format workers write concurrently, but each owns exactly one result row.
//! Both implementations serialize writes behind a mutex, so distinct rows of
//! the same job never lose updates.
//!
//! ## On-disk layout ([`JsonFileStore`])
//!
//! ```text
//! <dir>/<job_id>.json      { "version": 1, "job": {...}, "results": { "<format_id>": {...} } }
//! ```

use crate::job::{FormatResult, JobRecord, JobSnapshot, is_valid_job_id};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt job document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("invalid job id {0:?}")]
    InvalidJobId(String),
}

pub trait StatusStore: Send + Sync {
    /// Insert or replace the job record.
    fn save_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    fn load_job(&self, job_id: &str) -> Result<JobRecord, StoreError>;

    /// Insert or replace the result for `(result.job_id, result.format_id)`.
    fn upsert_result(&self, result: &FormatResult) -> Result<(), StoreError>;

    /// All results of a job, sorted by format id.
    fn results(&self, job_id: &str) -> Result<Vec<FormatResult>, StoreError>;

    /// The polling view of a job.
    fn snapshot(&self, job_id: &str) -> Result<JobSnapshot, StoreError> {
        let record = self.load_job(job_id)?;
        let results = self.results(job_id)?;
        Ok(JobSnapshot::new(&record, &results))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct JobEntry {
    record: Option<JobRecord>,
    results: BTreeMap<String, FormatResult>,
}

/// Process-local store. Used by tests and one-shot CLI runs that don't persist.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: Mutex<HashMap<String, JobEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStore {
    fn save_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        lock(&self.jobs)?
            .entry(job.id.clone())
            .or_default()
            .record = Some(job.clone());
        Ok(())
    }

    fn load_job(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        lock(&self.jobs)?
            .get(job_id)
            .and_then(|entry| entry.record.clone())
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    fn upsert_result(&self, result: &FormatResult) -> Result<(), StoreError> {
        lock(&self.jobs)?
            .entry(result.job_id.clone())
            .or_default()
            .results
            .insert(result.format_id.clone(), result.clone());
        Ok(())
    }

    fn results(&self, job_id: &str) -> Result<Vec<FormatResult>, StoreError> {
        Ok(lock(&self.jobs)?
            .get(job_id)
            .map(|entry| entry.results.values().cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Bump to refuse documents written in an incompatible layout.
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JobDocument {
    version: u32,
    job: Option<JobRecord>,
    results: BTreeMap<String, FormatResult>,
}

impl JobDocument {
    fn empty() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            job: None,
            results: BTreeMap::new(),
        }
    }
}

/// One JSON document per job under a directory.
///
/// Every write is read-modify-write of the whole document under a single
/// mutex, followed by write-to-temp + rename.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Job ids name files directly under `dir`; anything else is refused.
    fn document_path(&self, job_id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_job_id(job_id) {
            return Err(StoreError::InvalidJobId(job_id.to_string()));
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    fn read_document(&self, job_id: &str) -> Result<Option<JobDocument>, StoreError> {
        let path = self.document_path(job_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc: JobDocument =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;
        if doc.version != DOCUMENT_VERSION {
            return Err(StoreError::Corrupt {
                path: path.display().to_string(),
                source: serde::de::Error::custom(format!(
                    "unsupported document version {}",
                    doc.version
                )),
            });
        }
        Ok(Some(doc))
    }

    fn write_document(&self, job_id: &str, doc: &JobDocument) -> Result<(), StoreError> {
        let path = self.document_path(job_id)?;
        let tmp = self.dir.join(format!(".{job_id}.json.tmp"));
        let json = serde_json::to_string_pretty(doc)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn modify(
        &self,
        job_id: &str,
        change: impl FnOnce(&mut JobDocument),
    ) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock)?;
        let mut doc = self
            .read_document(job_id)?
            .unwrap_or_else(JobDocument::empty);
        change(&mut doc);
        self.write_document(job_id, &doc)
    }
}

impl StatusStore for JsonFileStore {
    fn save_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.modify(&job.id, |doc| doc.job = Some(job.clone()))
    }

    fn load_job(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        self.read_document(job_id)?
            .and_then(|doc| doc.job)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    fn upsert_result(&self, result: &FormatResult) -> Result<(), StoreError> {
        self.modify(&result.job_id, |doc| {
            doc.results
                .insert(result.format_id.clone(), result.clone());
        })
    }

    fn results(&self, job_id: &str) -> Result<Vec<FormatResult>, StoreError> {
        Ok(self
            .read_document(job_id)?
            .map(|doc| doc.results.into_values().collect())
            .unwrap_or_default())
    }
}
