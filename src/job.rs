//! Job data model: master image, jobs, per-format results, and the polling view.
//!
//! ## Lifecycles
//!
//! ```text
//! ResizeJob:     pending ──► processing ──┬──► completed   (every format completed)
//!                                         └──► failed      (any format failed)
//!
//! FormatResult:  processing ──┬──► completed
//!                             └──► failed
//! ```
//!
//! Both terminal states are final. A failed job keeps its completed
//! formats; their artifacts stay retrievable.

use crate::imaging::{
    BackendError, ImageBackend, ImageInfo, OutputEncoding, Quality, SourceFormat, output_encoding,
    reduce_ratio,
};
use crate::presets::FormatPreset;
use crate::selector::Method;
use crate::storage::{Location, hash_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Master image
// ============================================================================

/// The uploaded source creative. Immutable and cheap to clone.
#[derive(Debug, Clone)]
pub struct MasterImage {
    bytes: Arc<[u8]>,
    info: ImageInfo,
    aspect: (u32, u32),
}

impl MasterImage {
    /// Fully decode `bytes` once and wrap them with their metadata.
    pub fn decode(
        backend: &(impl ImageBackend + ?Sized),
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, BackendError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(BackendError::Decode("image is empty".to_string()));
        }
        let info = backend.validate(&bytes)?;
        if info.width == 0 || info.height == 0 {
            return Err(BackendError::Decode(format!(
                "image has no pixels ({}x{})",
                info.width, info.height
            )));
        }
        Ok(Self {
            bytes,
            info,
            aspect: reduce_ratio(info.width, info.height),
        })
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    pub fn format(&self) -> SourceFormat {
        self.info.format
    }

    /// Aspect ratio in lowest terms, e.g. `(16, 9)`.
    pub fn aspect(&self) -> (u32, u32) {
        self.aspect
    }

    /// Container every rendition of this master is written in.
    pub fn encoding(&self, quality: Quality) -> OutputEncoding {
        output_encoding(self.info.format, quality)
    }

    pub fn meta(&self) -> MasterMeta {
        MasterMeta {
            width: self.info.width,
            height: self.info.height,
            format: self.info.format,
            aspect_ratio: format!("{}:{}", self.aspect.0, self.aspect.1),
            byte_len: self.bytes.len(),
            sha256: hash_bytes(&self.bytes),
        }
    }
}

/// Persisted master metadata (the bytes themselves are not stored with the job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterMeta {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub aspect_ratio: String,
    pub byte_len: usize,
    pub sha256: String,
}

// ============================================================================
// Status enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStatus {
    Processing,
    Completed,
    Failed,
}

impl FormatStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FormatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job {job_id}: illegal status change {from} -> {to}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Job status implied by a set of format results.
///
/// `Processing` while any result is non-terminal; otherwise `Completed` only
/// if every result completed.
pub fn aggregate_status<'a>(results: impl IntoIterator<Item = &'a FormatResult>) -> JobStatus {
    let mut all_completed = true;
    for result in results {
        match result.status {
            FormatStatus::Processing => return JobStatus::Processing,
            FormatStatus::Failed => all_completed = false,
            FormatStatus::Completed => {}
        }
    }
    if all_completed {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// A request to adapt one master into a set of formats.
#[derive(Debug, Clone, Default)]
pub struct JobSubmission {
    /// Caller-chosen id; a UUID is generated when absent.
    pub job_id: Option<String>,
    pub owner: Option<String>,
    pub image: Vec<u8>,
    pub formats: Vec<String>,
}

/// Job ids become storage path segments: keep them to `[A-Za-z0-9_-]{1,64}`.
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// One orchestration unit: a master image and the formats requested from it.
#[derive(Debug, Clone)]
pub struct ResizeJob {
    pub id: String,
    pub owner: Option<String>,
    pub master: MasterImage,
    /// Distinct format ids in first-requested order.
    pub formats: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResizeJob {
    pub fn new(
        id: String,
        owner: Option<String>,
        master: MasterImage,
        formats: Vec<String>,
    ) -> Self {
        Self {
            id,
            owner,
            master,
            formats,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `next`, stamping the completion time on terminal states.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn record(&self) -> JobRecord {
        JobRecord {
            id: self.id.clone(),
            owner: self.owner.clone(),
            master: self.master.meta(),
            formats: self.formats.clone(),
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Persisted form of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub owner: Option<String>,
    pub master: MasterMeta,
    pub formats: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Format results
// ============================================================================

/// Outcome of one (job, format) pair.
///
/// Platform and dimensions are copied from the preset when the result is
/// created so the record stays stable if the registry changes later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatResult {
    /// `"{job_id}/{format_id}"`
    pub id: String,
    pub job_id: String,
    pub format_id: String,
    pub platform: String,
    pub width: u32,
    pub height: u32,
    pub location: Option<Location>,
    pub method: Option<Method>,
    pub status: FormatStatus,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FormatResult {
    pub fn result_id(job_id: &str, format_id: &str) -> String {
        format!("{job_id}/{format_id}")
    }

    /// A fresh result in `processing`.
    pub fn processing(job_id: &str, preset: &FormatPreset) -> Self {
        Self {
            id: Self::result_id(job_id, &preset.id),
            job_id: job_id.to_string(),
            format_id: preset.id.clone(),
            platform: preset.platform.clone(),
            width: preset.width,
            height: preset.height,
            location: None,
            method: None,
            status: FormatStatus::Processing,
            error_message: None,
            duration_ms: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn complete(&mut self, method: Method, location: Location, duration_ms: u64) {
        self.method = Some(method);
        self.location = Some(location);
        self.status = FormatStatus::Completed;
        self.error_message = None;
        self.duration_ms = duration_ms;
        self.finished_at = Some(Utc::now());
    }

    /// `method` is `None` when selection itself failed.
    pub fn fail(&mut self, method: Option<Method>, message: String, duration_ms: u64) {
        self.method = method;
        self.location = None;
        self.status = FormatStatus::Failed;
        self.error_message = Some(message);
        self.duration_ms = duration_ms;
        self.finished_at = Some(Utc::now());
    }
}

// ============================================================================
// Polling view
// ============================================================================

/// What a poller sees. Serialized as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Sorted by format id; completion order is not meaningful.
    pub format_results: Vec<FormatResultView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatResultView {
    pub format_id: String,
    pub platform: String,
    pub width: u32,
    pub height: u32,
    pub status: FormatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl From<&FormatResult> for FormatResultView {
    fn from(result: &FormatResult) -> Self {
        Self {
            format_id: result.format_id.clone(),
            platform: result.platform.clone(),
            width: result.width,
            height: result.height,
            status: result.status,
            result_url: result.location.as_ref().map(|l| l.url.clone()),
            method: result.method,
            error_message: result.error_message.clone(),
            duration_ms: result.duration_ms,
        }
    }
}

impl JobSnapshot {
    pub fn new(record: &JobRecord, results: &[FormatResult]) -> Self {
        let mut format_results: Vec<FormatResultView> =
            results.iter().map(FormatResultView::from).collect();
        format_results.sort_by(|a, b| a.format_id.cmp(&b.format_id));
        Self {
            job_id: record.id.clone(),
            status: record.status,
            created_at: record.created_at,
            completed_at: record.completed_at,
            format_results,
        }
    }

    pub fn count(&self, status: FormatStatus) -> usize {
        self.format_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}
