//! # adcanvas
//!
//! Turns one master creative into many advertising formats. Each format is
//! produced by the cheapest transform that survives the aspect-ratio change:
//! a crop, a padded letterbox, or a generative recomposition from an
//! external image service.
//!
//! # Architecture: Fan-Out / Fan-In
//!
//! ```text
//! submit(image, formats) ──► ResizeJob (pending)
//!                                 │
//!                         process_job (processing)
//!                                 │
//!          ┌──────────────────────┼──────────────────────┐   at most K at once
//!          ▼                      ▼                      ▼
//!   FormatTaskRunner       FormatTaskRunner       FormatTaskRunner
//!   select → execute       select → execute       select → execute
//!   → store → record       → store → record       → store → record
//!          └──────────────────────┼──────────────────────┘
//!                                 ▼
//!                  aggregate: completed | failed
//! ```
//!
//! Every format is isolated: a failure or panic in one becomes a `failed`
//! [`job::FormatResult`] and never aborts its siblings. The job is
//! `completed` only when every format completed.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`selector`] | Aspect-ratio delta and the crop / padding / AI threshold bands |
//! | [`imaging`] | Pure-Rust decode, crop, pad and conform operations behind [`imaging::ImageBackend`] |
//! | [`generator`] | Generative image service client, failure taxonomy, retry with linear backoff |
//! | [`executor`] | One [`executor::TransformExecutor`] per method |
//! | [`task`] | Runs one (job, format) pair to a terminal result |
//! | [`orchestrator`] | Job submission, bounded fan-out, status aggregation |
//! | [`job`] | Job and result model, status lifecycle, polling snapshot |
//! | [`store`] | Job status persistence (in-memory and JSON files) |
//! | [`storage`] | Artifact storage with overwrite-safe writes |
//! | [`presets`] | Format preset catalogue and registry |
//! | [`config`] | `adcanvas.toml` loading, merging onto stock defaults, validation |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Threads, Not Async
//!
//! Image work is CPU-bound and the only network call is one blocking request
//! per AI format. Formats run on a dedicated rayon pool sized to
//! `processing.max_concurrent`; the pool size is the concurrency bound.
//!
//! ## Deterministic Artifact Paths
//!
//! Artifacts are stored at `jobs/<job-id>/<format-id>.<ext>` and result rows
//! are keyed by `(job, format)`. Re-running a job overwrites rather than
//! duplicates, and writes go through a temp file plus rename so a reader
//! never sees a partial image.
//!
//! ## Exact Output Dimensions
//!
//! Every artifact has exactly the preset's dimensions. Generative output is
//! conformed (fill-resize and centre crop) before it is stored.

pub mod config;
pub mod executor;
pub mod generator;
pub mod imaging;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod presets;
pub mod selector;
pub mod storage;
pub mod store;
pub mod task;

#[cfg(test)]
pub(crate) mod test_helpers;
