//! CLI output formatting for every command.
//!
//! # Format-First Display
//!
//! The primary display for every format is its id and target dimensions.
//! The chosen method, result URL, and error text are secondary context on
//! indented lines, so the output reads as a per-format inventory.
//!
//! # Output Format
//!
//! ## Formats
//!
//! ```text
//! Formats (2)
//! 001 instagram_square 1080x1080 (1:1) Instagram
//! 002 instagram_story 1080x1920 (9:16) Instagram
//!     Safe zone: keep content inside 250px from the top, 250px from the bottom, …
//! ```
//!
//! ## Plan
//!
//! ```text
//! Master 1920x1080 jpeg (16:9)
//! 001 instagram_square 1080x1080 → crop
//! 002 leaderboard 728x90 → ai_regenerate
//! ```
//!
//! ## Run
//!
//! ```text
//! Job 3f2a…: 2 formats, 3 workers
//!     instagram_square: processing
//!     instagram_square 1080x1080 → crop (41 ms)
//!         Result: file://output/jobs/3f2a…/instagram_square.jpg
//!     leaderboard 728x90 → failed
//!         Method: ai_regenerate
//!         Error: AI regeneration failed: …
//! Job 3f2a… failed: 1 completed, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::imaging::{describe_margins, reduce_ratio};
use crate::job::{FormatResult, FormatStatus, JobSnapshot, ResizeJob};
use crate::orchestrator::{FormatPlan, ProgressEvent};
use crate::presets::{FormatPreset, FormatRegistry, SafeZone};

// ============================================================================
// Helpers
// ============================================================================

/// Format a 1-based positional index as zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn ratio_label(width: u32, height: u32) -> String {
    let (w, h) = reduce_ratio(width, height);
    format!("{}:{}", w, h)
}

fn preset_line(preset: &FormatPreset) -> String {
    format!(
        "{} {}x{} ({})",
        preset.id,
        preset.width,
        preset.height,
        ratio_label(preset.width, preset.height)
    )
}

fn safe_zone_line(zone: &SafeZone) -> Option<String> {
    if *zone == SafeZone::NONE {
        return None;
    }
    Some(format!(
        "    Safe zone: keep content inside {}",
        describe_margins(zone.top, zone.bottom, zone.left, zone.right)
    ))
}

/// Header plus context lines for one finished format.
fn result_lines(result: &FormatResult, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    match result.status {
        FormatStatus::Completed => {
            let method = result.method.map(|m| m.as_str()).unwrap_or("unknown");
            lines.push(format!(
                "{}{} {}x{} \u{2192} {} ({} ms)",
                indent, result.format_id, result.width, result.height, method, result.duration_ms
            ));
            if let Some(location) = &result.location {
                lines.push(format!("{}    Result: {}", indent, location.url));
            }
        }
        FormatStatus::Failed => {
            lines.push(format!(
                "{}{} {}x{} \u{2192} failed",
                indent, result.format_id, result.width, result.height
            ));
            if let Some(method) = result.method {
                lines.push(format!("{}    Method: {}", indent, method));
            }
            if let Some(message) = &result.error_message {
                lines.push(format!("{}    Error: {}", indent, message));
            }
        }
        FormatStatus::Processing => {
            lines.push(format!("{}{}: processing", indent, result.format_id));
        }
    }
    lines
}

// ============================================================================
// Formats
// ============================================================================

/// Format the preset registry as display lines.
pub fn format_formats(registry: &FormatRegistry) -> Vec<String> {
    let mut lines = vec![format!("Formats ({})", registry.len())];
    for (i, preset) in registry.iter().enumerate() {
        lines.push(format!(
            "{} {} {}",
            format_index(i + 1),
            preset_line(preset),
            preset.platform
        ));
        lines.extend(safe_zone_line(&preset.safe_zone));
    }
    lines
}

pub fn print_formats(registry: &FormatRegistry) {
    for line in format_formats(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Format the per-format method plan for a submitted job.
pub fn format_plan(job: &ResizeJob, plan: &FormatPlan) -> Vec<String> {
    let master = &job.master;
    let mut lines = vec![format!(
        "Master {}x{} {} ({})",
        master.width(),
        master.height(),
        master.format(),
        ratio_label(master.width(), master.height())
    )];
    for (i, (preset, method)) in plan.iter().enumerate() {
        let decision = match method {
            Ok(method) => method.to_string(),
            Err(e) => format!("error: {}", e),
        };
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            preset_line(preset),
            decision
        ));
    }
    lines
}

pub fn print_plan(job: &ResizeJob, plan: &FormatPlan) {
    for line in format_plan(job, plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Run progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::JobStarted {
            job_id,
            formats,
            concurrency,
        } => vec![format!(
            "Job {}: {} formats, {} workers",
            job_id, formats, concurrency
        )],
        ProgressEvent::FormatStarted { format_id, .. } => {
            vec![format!("    {}: processing", format_id)]
        }
        ProgressEvent::FormatFinished { result } => result_lines(result, "    "),
        ProgressEvent::JobFinished {
            job_id,
            status,
            completed,
            failed,
        } => vec![format!(
            "Job {} {}: {} completed, {} failed",
            job_id, status, completed, failed
        )],
    }
}

// ============================================================================
// Status
// ============================================================================

/// Format a job snapshot as display lines.
pub fn format_snapshot(snapshot: &JobSnapshot) -> Vec<String> {
    let mut lines = vec![format!("Job {} {}", snapshot.job_id, snapshot.status)];
    lines.push(format!(
        "    Created: {}",
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(done) = snapshot.completed_at {
        lines.push(format!(
            "    Finished: {}",
            done.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    for (i, view) in snapshot.format_results.iter().enumerate() {
        let outcome = match (view.status, view.method) {
            (FormatStatus::Completed, Some(method)) => method.to_string(),
            (status, _) => status.to_string(),
        };
        lines.push(format!(
            "{} {} {}x{} \u{2192} {}",
            format_index(i + 1),
            view.format_id,
            view.width,
            view.height,
            outcome
        ));
        if let Some(url) = &view.result_url {
            lines.push(format!("    Result: {}", url));
        }
        if let Some(message) = &view.error_message {
            lines.push(format!("    Error: {}", message));
        }
    }
    lines.push(format!(
        "{} completed, {} failed, {} processing",
        snapshot.count(FormatStatus::Completed),
        snapshot.count(FormatStatus::Failed),
        snapshot.count(FormatStatus::Processing)
    ));
    lines
}

pub fn print_snapshot(snapshot: &JobSnapshot) {
    for line in format_snapshot(snapshot) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::job::{JobStatus, MasterImage};
    use crate::presets::PresetSpec;
    use crate::selector::{Method, SelectionError};
    use crate::storage::Location;
    use std::collections::BTreeMap;

    fn preset(id: &str, width: u32, height: u32) -> FormatPreset {
        FormatPreset {
            id: id.to_string(),
            platform: "Test".to_string(),
            width,
            height,
            safe_zone: SafeZone::NONE,
        }
    }

    fn location(path: &str) -> Location {
        Location {
            path: path.to_string(),
            url: format!("mem:///{}", path),
            sha256: "00".to_string(),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
    }

    #[test]
    fn ratio_label_reduces() {
        assert_eq!(ratio_label(1920, 1080), "16:9");
        assert_eq!(ratio_label(728, 90), "364:45");
    }

    #[test]
    fn safe_zone_line_skips_empty_zone() {
        assert!(safe_zone_line(&SafeZone::NONE).is_none());
    }

    // =========================================================================
    // Formats
    // =========================================================================

    #[test]
    fn formats_lists_presets_in_id_order() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "story".to_string(),
            PresetSpec {
                platform: "Instagram".to_string(),
                width: 1080,
                height: 1920,
                safe_zone: SafeZone {
                    top: 250,
                    bottom: 250,
                    left: 0,
                    right: 0,
                },
            },
        );
        specs.insert(
            "square".to_string(),
            PresetSpec {
                platform: "Instagram".to_string(),
                width: 1080,
                height: 1080,
                safe_zone: SafeZone::NONE,
            },
        );
        let registry = FormatRegistry::from_specs(specs).unwrap();
        let lines = format_formats(&registry);

        assert_eq!(lines[0], "Formats (2)");
        assert_eq!(lines[1], "001 square 1080x1080 (1:1) Instagram");
        assert_eq!(lines[2], "002 story 1080x1920 (9:16) Instagram");
        assert!(lines[3].starts_with("    Safe zone:"));
        assert_eq!(lines.len(), 4);
    }

    // =========================================================================
    // Plan
    // =========================================================================

    #[test]
    fn plan_shows_master_and_decisions() {
        let backend = MockBackend::with_dimensions(1920, 1080);
        let master = MasterImage::decode(&backend, b"img".to_vec()).unwrap();
        let job = ResizeJob::new("j".into(), None, master, vec![]);
        let plan: FormatPlan = vec![
            (preset("wide", 1280, 720), Ok(Method::Crop)),
            (preset("banner", 728, 90), Ok(Method::AiRegenerate)),
            (
                preset("broken", 0, 90),
                Err(SelectionError::DegenerateDimensions {
                    source_w: 1920,
                    source_h: 1080,
                    target_w: 0,
                    target_h: 90,
                }),
            ),
        ];

        let lines = format_plan(&job, &plan);
        assert_eq!(lines[0], "Master 1920x1080 jpeg (16:9)");
        assert_eq!(lines[1], "001 wide 1280x720 (16:9) \u{2192} crop");
        assert_eq!(
            lines[2],
            "002 banner 728x90 (364:45) \u{2192} ai_regenerate"
        );
        assert!(lines[3].contains("error:"));
    }

    // =========================================================================
    // Progress events
    // =========================================================================

    #[test]
    fn job_started_event() {
        let lines = format_progress_event(&ProgressEvent::JobStarted {
            job_id: "j1".into(),
            formats: 4,
            concurrency: 3,
        });
        assert_eq!(lines, vec!["Job j1: 4 formats, 3 workers"]);
    }

    #[test]
    fn completed_format_event_shows_method_and_url() {
        let mut result = FormatResult::processing("j1", &preset("square", 500, 500));
        result.complete(Method::Crop, location("jobs/j1/square.jpg"), 12);

        let lines = format_progress_event(&ProgressEvent::FormatFinished { result });
        assert_eq!(lines[0], "    square 500x500 \u{2192} crop (12 ms)");
        assert_eq!(lines[1], "        Result: mem:///jobs/j1/square.jpg");
    }

    #[test]
    fn failed_format_event_shows_method_and_error() {
        let mut result = FormatResult::processing("j1", &preset("banner", 728, 90));
        result.fail(Some(Method::AiRegenerate), "quota".to_string(), 5);

        let lines = format_progress_event(&ProgressEvent::FormatFinished { result });
        assert_eq!(
            lines,
            vec![
                "    banner 728x90 \u{2192} failed",
                "        Method: ai_regenerate",
                "        Error: quota",
            ]
        );
    }

    #[test]
    fn job_finished_event() {
        let lines = format_progress_event(&ProgressEvent::JobFinished {
            job_id: "j1".into(),
            status: JobStatus::Failed,
            completed: 2,
            failed: 1,
        });
        assert_eq!(lines, vec!["Job j1 failed: 2 completed, 1 failed"]);
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    #[test]
    fn snapshot_lists_results_and_totals() {
        let backend = MockBackend::with_dimensions(1000, 1000);
        let master = MasterImage::decode(&backend, b"img".to_vec()).unwrap();
        let job = ResizeJob::new("j1".into(), None, master, vec![]);

        let mut ok = FormatResult::processing("j1", &preset("a", 100, 100));
        ok.complete(Method::Crop, location("jobs/j1/a.jpg"), 3);
        let mut bad = FormatResult::processing("j1", &preset("b", 728, 90));
        bad.fail(Some(Method::AiRegenerate), "boom".to_string(), 3);

        let snapshot = JobSnapshot::new(&job.record(), &[bad, ok]);
        let lines = format_snapshot(&snapshot);

        assert_eq!(lines[0], "Job j1 pending");
        assert!(lines.contains(&"001 a 100x100 \u{2192} crop".to_string()));
        assert!(lines.contains(&"    Result: mem:///jobs/j1/a.jpg".to_string()));
        assert!(lines.contains(&"002 b 728x90 \u{2192} failed".to_string()));
        assert!(lines.contains(&"    Error: boom".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "1 completed, 1 failed, 0 processing"
        );
    }
}
